use std::sync::Arc;

use tokio::sync::mpsc;

use crate::coordinator::Coordinator;
use crate::error::EngineError;

// ═══════════════════════════════════════════════════════════════
//  Signal Controller
// ═══════════════════════════════════════════════════════════════

/// Внешний триггер, пришедший в процесс.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// SIGINT / SIGTERM.
    Terminate,
    /// SIGUSR1.
    TogglePause,
    /// Всё остальное игнорируется.
    Other,
}

/// Продолжать ли слушать сигналы после обработки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Отобразить сигнал на операцию координатора. Собственного состояния нет.
pub async fn dispatch(coordinator: &Coordinator, signal: ControlSignal) -> Result<Flow, EngineError> {
    match signal {
        ControlSignal::Terminate => {
            coordinator.shutdown().await?;
            Ok(Flow::Stop)
        }
        ControlSignal::TogglePause => {
            match coordinator.toggle_pause() {
                Ok(paused) => tracing::info!(paused, "consumption flow toggled"),
                Err(e) => tracing::error!(error = %e, "toggle pause failed"),
            }
            Ok(Flow::Continue)
        }
        ControlSignal::Other => Ok(Flow::Continue),
    }
}

/// Обрабатывать сигналы из канала, пока координатор не остановлен.
///
/// Отмена (worker завершился или shutdown вызван где-то ещё) тоже
/// приводит к `shutdown()`, так что по возврату координатор в `Stopped`.
pub async fn drive(
    coordinator: Arc<Coordinator>,
    mut signals: mpsc::Receiver<ControlSignal>,
) -> Result<(), EngineError> {
    let token = coordinator.cancellation_token();
    loop {
        let signal = tokio::select! {
            _ = token.cancelled() => {
                tracing::info!("terminating: context cancelled");
                ControlSignal::Terminate
            }
            signal = signals.recv() => match signal {
                Some(ControlSignal::Terminate) => {
                    tracing::info!("terminating: via signal");
                    ControlSignal::Terminate
                }
                Some(other) => other,
                None => {
                    tracing::info!("terminating: signal source closed");
                    ControlSignal::Terminate
                }
            },
        };

        if dispatch(&coordinator, signal).await? == Flow::Stop {
            return Ok(());
        }
    }
}

/// Слушать OS-сигналы: SIGINT/SIGTERM → shutdown, SIGUSR1 → toggle pause.
pub async fn listen(coordinator: Arc<Coordinator>) -> Result<(), EngineError> {
    let (tx, rx) = mpsc::channel(8);
    let forwarder = spawn_os_forwarder(tx)?;
    let result = drive(coordinator, rx).await;
    forwarder.abort();
    result
}

#[cfg(unix)]
fn spawn_os_forwarder(tx: mpsc::Sender<ControlSignal>) -> Result<tokio::task::JoinHandle<()>, EngineError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;

    Ok(tokio::spawn(async move {
        loop {
            let signal = tokio::select! {
                _ = sigint.recv() => ControlSignal::Terminate,
                _ = sigterm.recv() => ControlSignal::Terminate,
                _ = sigusr1.recv() => ControlSignal::TogglePause,
            };
            if tx.send(signal).await.is_err() {
                break;
            }
        }
    }))
}

#[cfg(not(unix))]
fn spawn_os_forwarder(tx: mpsc::Sender<ControlSignal>) -> Result<tokio::task::JoinHandle<()>, EngineError> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(ControlSignal::Terminate).await.is_err() {
                break;
            }
        }
    }))
}
