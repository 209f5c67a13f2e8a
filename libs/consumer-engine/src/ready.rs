use std::sync::Arc;

use tokio::sync::watch;

/// Одноразовый барьер готовности: координатор ждёт, пока worker
/// завершит setup первой session.
///
/// Открывается один раз и больше не закрывается. Клоны разделяют
/// одно состояние.
#[derive(Clone)]
pub struct ReadinessGate {
    tx: Arc<watch::Sender<bool>>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Открыть барьер. Повторные вызовы ничего не меняют.
    pub fn signal_ready(&self) {
        self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Дождаться открытия. Возвращается сразу, если барьер уже открыт.
    pub async fn wait_ready(&self) {
        let mut rx = self.tx.subscribe();
        // Sender живёт в self, поэтому wait_for не может вернуть ошибку.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}
