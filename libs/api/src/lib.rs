//! Общие типы и plugin-трейты catalog ingest сервиса.
//!
//! Engine, broker- и storage-плагины зависят только от этого crate'а.

pub mod catalog;
mod error;
mod group;
mod storage;
mod types;
mod util;

pub use catalog::{
    Attachment, Category, Display, PopRelationship, Price, Product, SupportingLanguage, Tax,
    UnitOfMeasure,
};
pub use error::{ErrorKind, IngestError};
pub use group::{Claim, ConsumerGroup, GroupHandler, GroupSession};
pub use storage::{DocumentQuery, DocumentStore, InsertOutcome};
pub use types::{BrokerRecord, RecordEnvelope, RecordHeader, extract_headers};
pub use util::{now_ms, session_id, split_list};
