//! Consumer-group coordinator и обработка partition claims.
//!
//! Coordinator крутит worker loop поверх `ConsumerGroup`, ConsumerHandler
//! (session hooks) открывает ReadinessGate и отдаёт claims в
//! ClaimProcessor, signal controller переводит OS-сигналы в
//! shutdown / toggle pause.

pub mod config;
pub mod error;
pub mod signal;
mod backoff;
mod claim;
mod coordinator;
mod hooks;
mod ready;
mod state;
mod topic;

pub use backoff::Backoff;
pub use claim::{ClaimProcessor, ClaimSummary, RecordOutcome};
pub use config::{BackoffConfig, CoordinatorConfig, RoutingConfig};
pub use coordinator::Coordinator;
pub use error::EngineError;
pub use hooks::{ConsumerHandler, SessionListener};
pub use ready::ReadinessGate;
pub use signal::{ControlSignal, Flow};
pub use state::CoordinatorState;
pub use topic::{CatalogTopic, PRODUCT_LANGUAGES_TOPIC, PRODUCTS_TOPIC, Routing};
