use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;

use ingest_api::{Claim, GroupHandler, GroupSession, IngestError};

use crate::claim::ClaimProcessor;
use crate::ready::ReadinessGate;
use crate::state::CoordinatorState;

// ═══════════════════════════════════════════════════════════════
//  SessionListener — точка расширения lifecycle hooks
// ═══════════════════════════════════════════════════════════════

/// Callbacks на начало и конец session (метрики, flush и т.п.).
/// По умолчанию ничего не делают.
pub trait SessionListener: Send + Sync {
    fn on_setup(&self, _session: &dyn GroupSession) {}

    fn on_cleanup(&self, _session: &dyn GroupSession) {}
}

// ═══════════════════════════════════════════════════════════════
//  ConsumerHandler
// ═══════════════════════════════════════════════════════════════

/// GroupHandler, который group protocol вызывает на каждую session:
/// setup → consume_claim (по одной на партицию) → cleanup.
pub struct ConsumerHandler {
    processor: ClaimProcessor,
    gate: ReadinessGate,
    state: Arc<watch::Sender<CoordinatorState>>,
    listener: Option<Arc<dyn SessionListener>>,
}

impl ConsumerHandler {
    pub(crate) fn new(
        processor: ClaimProcessor,
        gate: ReadinessGate,
        state: Arc<watch::Sender<CoordinatorState>>,
        listener: Option<Arc<dyn SessionListener>>,
    ) -> Self {
        Self {
            processor,
            gate,
            state,
            listener,
        }
    }

    /// Обновить состояние, не затирая ShuttingDown/Stopped.
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

impl GroupHandler for ConsumerHandler {
    fn setup(&self, session: &dyn GroupSession) -> Result<(), IngestError> {
        tracing::info!(
            member_id = %session.member_id(),
            generation_id = session.generation_id(),
            "session setup"
        );
        self.transition(CoordinatorState::Consuming);
        // Первый setup открывает барьер; на последующих rebalance — no-op.
        self.gate.signal_ready();
        if let Some(listener) = &self.listener {
            listener.on_setup(session);
        }
        Ok(())
    }

    fn cleanup(&self, session: &dyn GroupSession) -> Result<(), IngestError> {
        tracing::info!(
            member_id = %session.member_id(),
            generation_id = session.generation_id(),
            "session cleanup"
        );
        self.transition(CoordinatorState::Rebalancing);
        if let Some(listener) = &self.listener {
            listener.on_cleanup(session);
        }
        Ok(())
    }

    fn consume_claim<'a>(
        &'a self,
        session: &'a dyn GroupSession,
        claim: Box<dyn Claim>,
    ) -> Pin<Box<dyn Future<Output = Result<(), IngestError>> + Send + 'a>> {
        Box::pin(async move {
            self.processor.process_claim(session, claim).await;
            Ok(())
        })
    }
}
