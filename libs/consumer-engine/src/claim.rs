use std::sync::Arc;

use ingest_api::{BrokerRecord, Claim, DocumentStore, GroupSession, RecordEnvelope, session_id};

use crate::topic::{CatalogTopic, Routing};

// ═══════════════════════════════════════════════════════════════
//  RecordOutcome / ClaimSummary
// ═══════════════════════════════════════════════════════════════

/// Итог обработки одной записи. Запись коммитится при любом исходе.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Документ вставлен в store.
    Persisted { collection: String, inserted_id: String },
    /// Payload не декодировался — вставки не было.
    DecodeFailed { error: String },
    /// Store вернул ошибку — повтора не будет.
    PersistFailed { collection: String, error: String },
    /// Topic не распознан — вставки не было.
    Unrouted,
}

impl RecordOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RecordOutcome::Persisted { .. } => "persisted",
            RecordOutcome::DecodeFailed { .. } => "decode_failed",
            RecordOutcome::PersistFailed { .. } => "persist_failed",
            RecordOutcome::Unrouted => "unrouted",
        }
    }
}

/// Счётчики одной claim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSummary {
    pub records: u64,
    pub persisted: u64,
    pub decode_failures: u64,
    pub persist_failures: u64,
    pub unrouted: u64,
    pub last_offset: Option<i64>,
}

impl ClaimSummary {
    fn observe(&mut self, record: &BrokerRecord, outcome: &RecordOutcome) {
        self.records += 1;
        self.last_offset = Some(record.offset);
        match outcome {
            RecordOutcome::Persisted { .. } => self.persisted += 1,
            RecordOutcome::DecodeFailed { .. } => self.decode_failures += 1,
            RecordOutcome::PersistFailed { .. } => self.persist_failures += 1,
            RecordOutcome::Unrouted => self.unrouted += 1,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  ClaimProcessor
// ═══════════════════════════════════════════════════════════════

/// Обработчик одной claim: decode → insert → commit для каждой записи
/// строго в порядке offset'ов.
///
/// Ошибки отдельных записей не выходят наружу: они логируются и
/// запись всё равно коммитится (at-least-once, без dead-letter).
pub struct ClaimProcessor {
    store: Arc<dyn DocumentStore>,
    routing: Routing,
    client_id: String,
}

impl ClaimProcessor {
    pub fn new(store: Arc<dyn DocumentStore>, routing: Routing) -> Self {
        Self {
            store,
            routing,
            client_id: String::new(),
        }
    }

    /// Client id, чей префикс срезается с member id в логах.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Обработать claim до конца последовательности записей.
    ///
    /// Конец последовательности (revoke / закрытие канала) — штатное
    /// завершение, не ошибка.
    pub async fn process_claim(&self, session: &dyn GroupSession, mut claim: Box<dyn Claim>) -> ClaimSummary {
        let topic = claim.topic().to_string();
        let partition = claim.partition();
        let session_id = session_id(session.member_id(), &self.client_id);

        tracing::debug!(%topic, partition, session_id = %session_id, "claim started");

        let mut summary = ClaimSummary::default();
        while let Some(record) = claim.next_record().await {
            let outcome = self.process_record(session, &session_id, &record).await;
            summary.observe(&record, &outcome);
        }

        tracing::info!(
            %topic,
            partition,
            session_id = %session_id,
            generation_id = session.generation_id(),
            records = summary.records,
            persisted = summary.persisted,
            decode_failures = summary.decode_failures,
            persist_failures = summary.persist_failures,
            unrouted = summary.unrouted,
            last_offset = ?summary.last_offset,
            "claim finished"
        );
        summary
    }

    /// Обработать одну запись и закоммитить её offset.
    pub async fn process_record(
        &self,
        session: &dyn GroupSession,
        session_id: &str,
        record: &BrokerRecord,
    ) -> RecordOutcome {
        let envelope = RecordEnvelope::new(record, session_id, session.generation_id());

        let outcome = match CatalogTopic::from_name(&record.topic) {
            None => RecordOutcome::Unrouted,
            Some(topic) => match topic.decode(&record.value) {
                Err(e) => RecordOutcome::DecodeFailed { error: e.to_string() },
                Ok(document) => {
                    let collection = self.routing.collection(topic).to_string();
                    match self.store.insert(&collection, document).await {
                        Ok(res) => RecordOutcome::Persisted {
                            collection,
                            inserted_id: res.inserted_id,
                        },
                        Err(e) => RecordOutcome::PersistFailed {
                            collection,
                            error: e.to_string(),
                        },
                    }
                }
            },
        };

        log_record(&envelope, &outcome);

        session.mark_record(record);
        outcome
    }
}

/// Одна структурированная запись лога на каждую обработанную запись.
fn log_record(env: &RecordEnvelope, outcome: &RecordOutcome) {
    let result = outcome.label();
    match outcome {
        RecordOutcome::Persisted { collection, inserted_id } => {
            tracing::info!(
                partition = env.partition,
                offset = env.offset,
                key = %env.key,
                value = %env.value,
                ts_ms = ?env.ts_ms,
                headers = ?env.headers,
                topic = %env.topic,
                session_id = %env.session_id,
                generation_id = env.generation_id,
                %collection,
                %inserted_id,
                result,
                "record persisted"
            );
        }
        RecordOutcome::Unrouted => {
            tracing::info!(
                partition = env.partition,
                offset = env.offset,
                key = %env.key,
                value = %env.value,
                ts_ms = ?env.ts_ms,
                headers = ?env.headers,
                topic = %env.topic,
                session_id = %env.session_id,
                generation_id = env.generation_id,
                result,
                "topic not found"
            );
        }
        RecordOutcome::DecodeFailed { error } => {
            tracing::error!(
                partition = env.partition,
                offset = env.offset,
                key = %env.key,
                value = %env.value,
                ts_ms = ?env.ts_ms,
                headers = ?env.headers,
                topic = %env.topic,
                session_id = %env.session_id,
                generation_id = env.generation_id,
                result,
                %error,
                "payload decode failed, skipping"
            );
        }
        RecordOutcome::PersistFailed { collection, error } => {
            tracing::error!(
                partition = env.partition,
                offset = env.offset,
                key = %env.key,
                value = %env.value,
                ts_ms = ?env.ts_ms,
                headers = ?env.headers,
                topic = %env.topic,
                session_id = %env.session_id,
                generation_id = env.generation_id,
                %collection,
                result,
                %error,
                "insert failed"
            );
        }
    }
}
