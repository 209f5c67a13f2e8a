use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ingest_api::{ConsumerGroup, GroupHandler};

use crate::backoff::Backoff;
use crate::claim::ClaimProcessor;
use crate::config::CoordinatorConfig;
use crate::error::EngineError;
use crate::hooks::{ConsumerHandler, SessionListener};
use crate::ready::ReadinessGate;
use crate::state::CoordinatorState;

// ═══════════════════════════════════════════════════════════════
//  Coordinator
// ═══════════════════════════════════════════════════════════════

/// Владелец worker loop'а consumer group, cancellation signal'а и
/// pause state.
///
/// Worker повторно входит в группу после каждого rebalance, пока не
/// отменён. Отмена кооперативная: она наблюдается между блокирующими
/// вызовами group protocol, обрабатываемая claim не прерывается
/// посреди записи.
pub struct Coordinator {
    group: Arc<dyn ConsumerGroup>,
    handler: Arc<ConsumerHandler>,
    topics: Vec<String>,
    config: CoordinatorConfig,
    gate: ReadinessGate,
    token: CancellationToken,
    /// Единственный писатель — `toggle_pause()`.
    paused: Mutex<bool>,
    state: Arc<watch::Sender<CoordinatorState>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl Coordinator {
    pub fn new(
        group: Arc<dyn ConsumerGroup>,
        processor: ClaimProcessor,
        topics: Vec<String>,
        config: CoordinatorConfig,
        listener: Option<Arc<dyn SessionListener>>,
    ) -> Arc<Self> {
        let gate = ReadinessGate::new();
        let (state_tx, _) = watch::channel(CoordinatorState::Idle);
        let state = Arc::new(state_tx);
        let handler = Arc::new(ConsumerHandler::new(processor, gate.clone(), state.clone(), listener));

        Arc::new(Self {
            group,
            handler,
            topics,
            config,
            gate,
            token: CancellationToken::new(),
            paused: Mutex::new(false),
            state,
            worker: Mutex::new(None),
            started: AtomicBool::new(false),
        })
    }

    /// Запустить worker loop в фоне.
    pub fn start(self: &Arc<Self>) -> Result<(), EngineError> {
        // `started` и handle меняются под одним lock'ом: shutdown видит
        // либо оба, либо ни одного.
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if self.started.load(Ordering::SeqCst) {
            return Err(EngineError::AlreadyStarted);
        }

        let this = Arc::clone(self);
        *worker = Some(tokio::spawn(async move { this.run_worker().await }));
        self.started.store(true, Ordering::SeqCst);
        drop(worker);

        tracing::info!(topics = ?self.topics, "coordinator started");
        Ok(())
    }

    async fn run_worker(&self) {
        // Отмена срабатывает при любом выходе, включая panic.
        let _cancel_on_exit = self.token.clone().drop_guard();
        let mut backoff = Backoff::new(&self.config.backoff);
        let handler: Arc<dyn GroupHandler> = self.handler.clone();

        loop {
            if self.token.is_cancelled() {
                break;
            }
            self.transition(CoordinatorState::Joining);

            let result = self
                .group
                .consume(self.topics.clone(), handler.clone(), self.token.clone())
                .await;

            if self.token.is_cancelled() {
                if let Err(e) = result {
                    tracing::debug!(error = %e, "consume returned after cancellation");
                }
                break;
            }

            match result {
                Ok(()) => {
                    backoff.reset();
                    self.transition(CoordinatorState::Rebalancing);
                    tracing::info!("session ended, rejoining group");
                }
                Err(e) if e.is_closed() => {
                    tracing::info!(error = %e, "consumer group closed");
                    break;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        kind = %e.kind(),
                        delay_ms = delay.as_millis() as u64,
                        "consume error, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.token.cancelled() => break,
                    }
                }
            }
        }

        tracing::info!("worker stopped");
    }

    /// Дождаться setup первой session.
    ///
    /// Ошибка, если до этого сработал cancellation signal: shutdown,
    /// выход worker'а или его panic.
    pub async fn await_ready(&self) -> Result<(), EngineError> {
        tokio::select! {
            biased;
            _ = self.gate.wait_ready() => Ok(()),
            _ = self.token.cancelled() => Err(EngineError::ShutdownBeforeReady),
        }
    }

    /// Переключить pause/resume всех назначенных партиций.
    ///
    /// Состояние меняется только если broker принял команду.
    /// Возвращает новое значение PauseState.
    pub fn toggle_pause(&self) -> Result<bool, EngineError> {
        let mut paused = self.paused.lock().unwrap_or_else(PoisonError::into_inner);
        if *paused {
            self.group.resume_all()?;
            tracing::info!("resuming consumption");
        } else {
            self.group.pause_all()?;
            tracing::info!("pausing consumption");
        }
        *paused = !*paused;
        Ok(*paused)
    }

    /// Graceful shutdown: выставить cancellation signal, дождаться
    /// worker'а, покинуть группу.
    ///
    /// Сигнализирует намерение и не прерывает claims посреди записи:
    /// они дочитываются, когда group protocol закрывает их. Если задан
    /// `shutdown_grace_ms`, worker, не успевший за это время, прерывается.
    /// Повторный вызов ждёт `Stopped`.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let (handle, started) = {
            let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
            (worker.take(), self.started.load(Ordering::SeqCst))
        };

        if handle.is_none() && started {
            self.token.cancel();
            let mut rx = self.state.subscribe();
            let _ = rx.wait_for(|s| *s == CoordinatorState::Stopped).await;
            return Ok(());
        }

        self.state.send_replace(CoordinatorState::ShuttingDown);
        tracing::info!("shutting down consumer");
        self.token.cancel();

        let mut worker_result = Ok(());
        if let Some(mut handle) = handle {
            let joined = match self.config.shutdown_grace_ms.map(Duration::from_millis) {
                Some(grace) => match tokio::time::timeout(grace, &mut handle).await {
                    Ok(res) => res,
                    Err(_) => {
                        tracing::warn!(grace_ms = grace.as_millis() as u64, "worker did not stop in time, aborting");
                        handle.abort();
                        handle.await
                    }
                },
                None => handle.await,
            };
            if let Err(e) = joined {
                if e.is_panic() {
                    tracing::error!(error = %e, "worker panicked");
                    worker_result = Err(EngineError::Worker(e.to_string()));
                }
            }
        }

        let close_result = self.group.close().await;
        self.state.send_replace(CoordinatorState::Stopped);

        if let Err(e) = close_result {
            tracing::error!(error = %e, "error closing consumer group");
            return Err(EngineError::Group(e));
        }
        tracing::info!("consumer stopped");
        worker_result
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    fn transition(&self, next: CoordinatorState) {
        self.state.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
