#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use ingest_api::{
    BrokerRecord, Claim, ConsumerGroup, DocumentQuery, DocumentStore, GroupHandler, GroupSession,
    IngestError, InsertOutcome,
};

// ═══════════════════════════════════════════════════════════════
//  Scripted consumer group
// ═══════════════════════════════════════════════════════════════

/// Что вернёт очередной вызов `consume`.
pub enum Step {
    /// Session с claims; `hold` = держать session до отмены.
    Session { claims: Vec<(String, i32, Vec<BrokerRecord>)>, hold: bool },
    /// Ошибка join/consume.
    Fail(IngestError),
}

impl Step {
    pub fn session(topic: &str, partition: i32, records: Vec<BrokerRecord>, hold: bool) -> Self {
        Step::Session {
            claims: vec![(topic.to_string(), partition, records)],
            hold,
        }
    }
}

pub struct MockSession {
    member_id: String,
    generation_id: i32,
    marked: Arc<Mutex<Vec<(String, i32, i64)>>>,
}

impl GroupSession for MockSession {
    fn member_id(&self) -> &str {
        &self.member_id
    }
    fn generation_id(&self) -> i32 {
        self.generation_id
    }
    fn mark_record(&self, record: &BrokerRecord) {
        self.marked
            .lock()
            .unwrap()
            .push((record.topic.clone(), record.partition, record.offset));
    }
}

pub struct VecClaim {
    topic: String,
    partition: i32,
    records: VecDeque<BrokerRecord>,
}

impl Claim for VecClaim {
    fn topic(&self) -> &str {
        &self.topic
    }
    fn partition(&self) -> i32 {
        self.partition
    }
    fn next_record(&mut self) -> Pin<Box<dyn Future<Output = Option<BrokerRecord>> + Send + '_>> {
        Box::pin(async move { self.records.pop_front() })
    }
}

/// ConsumerGroup по сценарию. Когда шаги кончились, `consume`
/// блокируется до отмены (группа без работы).
#[derive(Default)]
pub struct ScriptedGroup {
    steps: Mutex<VecDeque<Step>>,
    generation: AtomicI32,
    pub marked: Arc<Mutex<Vec<(String, i32, i64)>>>,
    pub consume_calls: AtomicUsize,
    pub pause_calls: AtomicUsize,
    pub resume_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub fail_pause: AtomicBool,
    closed: AtomicBool,
}

impl ScriptedGroup {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        })
    }

    pub fn marked_offsets(&self) -> Vec<i64> {
        self.marked.lock().unwrap().iter().map(|m| m.2).collect()
    }
}

impl ConsumerGroup for ScriptedGroup {
    fn consume(
        &self,
        _topics: Vec<String>,
        handler: Arc<dyn GroupHandler>,
        token: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<(), IngestError>> + Send + '_>> {
        Box::pin(async move {
            self.consume_calls.fetch_add(1, Ordering::SeqCst);
            if self.closed.load(Ordering::SeqCst) {
                return Err(IngestError::closed("consumer group closed"));
            }

            let step = self.steps.lock().unwrap().pop_front();
            let (claims, hold) = match step {
                None => {
                    token.cancelled().await;
                    return Ok(());
                }
                Some(Step::Fail(e)) => return Err(e),
                Some(Step::Session { claims, hold }) => (claims, hold),
            };

            let generation_id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let session = Arc::new(MockSession {
                member_id: format!("catalog-ingest-member-{generation_id}"),
                generation_id,
                marked: self.marked.clone(),
            });

            handler.setup(session.as_ref())?;

            let mut tasks = Vec::new();
            for (topic, partition, records) in claims {
                let handler = handler.clone();
                let session = session.clone();
                tasks.push(tokio::spawn(async move {
                    let claim = Box::new(VecClaim {
                        topic,
                        partition,
                        records: records.into(),
                    });
                    handler.consume_claim(session.as_ref(), claim).await
                }));
            }
            for task in tasks {
                task.await
                    .map_err(|e| IngestError::new(e.to_string()))??;
            }

            if hold {
                token.cancelled().await;
            }

            handler.cleanup(session.as_ref())?;
            Ok(())
        })
    }

    fn pause_all(&self) -> Result<(), IngestError> {
        if self.fail_pause.load(Ordering::SeqCst) {
            return Err(IngestError::io("broker unavailable"));
        }
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resume_all(&self) -> Result<(), IngestError> {
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = Result<(), IngestError>> + Send + '_>> {
        Box::pin(async move {
            self.closed.store(true, Ordering::SeqCst);
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Recording store
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct RecordingStore {
    pub inserts: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingStore {
    pub fn count(&self) -> usize {
        self.inserts.lock().unwrap().len()
    }

    pub fn ids(&self) -> Vec<String> {
        self.inserts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, doc)| doc["id"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

impl DocumentStore for RecordingStore {
    fn insert(
        &self,
        collection: &str,
        document: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<InsertOutcome, IngestError>> + Send + '_>> {
        let collection = collection.to_string();
        Box::pin(async move {
            let mut inserts = self.inserts.lock().unwrap();
            inserts.push((collection, document));
            Ok(InsertOutcome { inserted_id: inserts.len().to_string() })
        })
    }

    fn find(
        &self,
        _collection: &str,
        _query: &DocumentQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<serde_json::Value>, IngestError>> + Send + '_>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn count(
        &self,
        _collection: &str,
        _query: &DocumentQuery,
    ) -> Pin<Box<dyn Future<Output = Result<u64, IngestError>> + Send + '_>> {
        Box::pin(async move { Ok(self.inserts.lock().unwrap().len() as u64) })
    }

    fn find_one(
        &self,
        _collection: &str,
        _id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<serde_json::Value>, IngestError>> + Send + '_>> {
        Box::pin(async { Ok(None) })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════

pub fn product(partition: i32, offset: i64) -> BrokerRecord {
    BrokerRecord::new(
        "create.products",
        partition,
        offset,
        format!(r#"{{"id":"p{offset}","name":"item {offset}"}}"#).into_bytes(),
    )
}

/// Ждать выполнения условия, не дольше 2 секунд.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
