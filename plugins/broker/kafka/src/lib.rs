//! Kafka consumer group на `rdkafka::StreamConsumer`.
//!
//! Один consumer на процесс, подписка один раз. Каждый вызов
//! `consume()` = одна session: ждём непустой assignment, поднимаем
//! по claim task'у на партицию, раздаём им сообщения по
//! `(topic, partition)` и завершаем session при смене assignment
//! или отмене.

mod config;
mod convert;
mod dispatch;
mod session;

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use ingest_api::{BrokerRecord, ConsumerGroup, GroupHandler, IngestError};

pub use config::{ASSIGNOR, BrokerVersion, KafkaGroupConfig, OFFSET_RESET};
pub use convert::to_record;

use dispatch::{Drained, Senders, drain_backlog};
use session::{KafkaClaim, KafkaSession};

type Assignment = BTreeSet<(String, i32)>;

fn kafka_err(e: KafkaError) -> IngestError {
    IngestError::io(format!("kafka: {e}"))
}

// ═══════════════════════════════════════════════════════════════
//  KafkaConsumerGroup
// ═══════════════════════════════════════════════════════════════

pub struct KafkaConsumerGroup {
    consumer: Arc<StreamConsumer>,
    member_id: String,
    channel_buffer: usize,
    assignment_poll: Duration,
    generation: AtomicI32,
    subscribed: Mutex<Vec<String>>,
    /// Сообщения, прочитанные до начала session, которой они принадлежат.
    pending: Mutex<VecDeque<BrokerRecord>>,
    paused: AtomicBool,
    closed: AtomicBool,
}

impl KafkaConsumerGroup {
    /// Валидировать конфиг и создать consumer. Подключение к broker'ам
    /// ленивое: ошибки сети проявятся в `consume()`.
    pub fn new(config: &KafkaGroupConfig) -> Result<Self, IngestError> {
        let version = config.validate()?;
        let consumer: StreamConsumer = config
            .client_config(&version)
            .create()
            .map_err(|e| IngestError::config(format!("kafka consumer: {e}")))?;

        // rdkafka не отдаёт member id группы, поэтому он синтезируется
        // с тем же префиксом client id.
        let member_id = format!(
            "{}-{:x}{:x}",
            config.client_id,
            std::process::id(),
            ingest_api::now_ms()
        );

        Ok(Self {
            consumer: Arc::new(consumer),
            member_id,
            channel_buffer: config.channel_buffer.max(1),
            assignment_poll: Duration::from_millis(config.assignment_poll_ms.max(10)),
            generation: AtomicI32::new(0),
            subscribed: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            paused: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    fn ensure_open(&self) -> Result<(), IngestError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IngestError::closed("kafka consumer group is closed"));
        }
        Ok(())
    }

    fn ensure_subscribed(&self, topics: &[String]) -> Result<(), IngestError> {
        let mut subscribed = self.subscribed.lock().unwrap_or_else(PoisonError::into_inner);
        if subscribed.as_slice() == topics {
            return Ok(());
        }
        let names: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.consumer.subscribe(&names).map_err(kafka_err)?;
        tracing::info!(topics = ?topics, "subscribed");
        *subscribed = topics.to_vec();
        Ok(())
    }

    fn assignment(&self) -> Result<Assignment, IngestError> {
        let tpl = self.consumer.assignment().map_err(kafka_err)?;
        Ok(tpl
            .elements()
            .iter()
            .map(|e| (e.topic().to_string(), e.partition()))
            .collect())
    }

    fn push_pending(&self, record: BrokerRecord) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(record);
    }

    fn take_pending(&self) -> VecDeque<BrokerRecord> {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Ждать непустой assignment. `None` = отмена до начала session.
    ///
    /// Rebalance в librdkafka продвигается только при poll'е, поэтому
    /// ожидание тоже читает сообщения и откладывает их в `pending`.
    async fn await_assignment(&self, token: &CancellationToken) -> Result<Option<Assignment>, IngestError> {
        let mut tick = tokio::time::interval(self.assignment_poll);
        loop {
            self.ensure_open()?;
            let assignment = self.assignment()?;
            if !assignment.is_empty() {
                return Ok(Some(assignment));
            }

            tokio::select! {
                _ = token.cancelled() => return Ok(None),
                _ = tick.tick() => {}
                msg = self.consumer.recv() => {
                    let msg = msg.map_err(kafka_err)?;
                    self.push_pending(to_record(&msg));
                }
            }
        }
    }

    async fn run_session(
        &self,
        assignment: Assignment,
        handler: Arc<dyn GroupHandler>,
        token: CancellationToken,
    ) -> Result<(), IngestError> {
        let generation_id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Arc::new(KafkaSession {
            consumer: self.consumer.clone(),
            member_id: self.member_id.clone(),
            generation_id,
        });

        // После rebalance librdkafka снимает pause, восстанавливаем.
        if self.paused.load(Ordering::SeqCst) {
            if let Err(e) = self.pause_assignment() {
                tracing::warn!(error = %e, "failed to re-apply pause to new assignment");
            }
        }

        handler.setup(session.as_ref())?;

        let mut senders: Senders = HashMap::with_capacity(assignment.len());
        let mut claims = JoinSet::new();
        for (topic, partition) in &assignment {
            let (tx, rx) = mpsc::channel(self.channel_buffer);
            senders.insert((topic.clone(), *partition), tx);

            let claim = KafkaClaim { topic: topic.clone(), partition: *partition, rx };
            let handler = handler.clone();
            let session = session.clone();
            claims.spawn(async move { handler.consume_claim(session.as_ref(), Box::new(claim)).await });
        }

        tracing::info!(
            member_id = %self.member_id,
            generation_id,
            partitions = assignment.len(),
            "kafka session started"
        );

        let mut outcome = Ok(());
        let mut backlog = self.take_pending();
        let mut stale = backlog.len();
        let mut tick = tokio::time::interval_at(
            tokio::time::Instant::now() + self.assignment_poll,
            self.assignment_poll,
        );

        loop {
            match drain_backlog(&senders, &mut backlog, &mut stale, &token).await {
                Drained::Empty => {}
                Drained::Cancelled => break,
                Drained::Requeue(records) => {
                    self.pending
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend(records);
                    break;
                }
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tick.tick() => match self.assignment() {
                    Ok(current) if current != assignment => {
                        tracing::info!(generation_id, "assignment changed, ending session");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        outcome = Err(e);
                        break;
                    }
                },
                msg = self.consumer.recv() => match msg {
                    Ok(msg) => backlog.push_back(to_record(&msg)),
                    Err(e) => {
                        outcome = Err(kafka_err(e));
                        break;
                    }
                },
            }
        }

        drop(senders);
        while let Some(joined) = claims.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "claim ended with error"),
                Err(e) => tracing::error!(error = %e, "claim task failed"),
            }
        }

        if let Err(e) = handler.cleanup(session.as_ref()) {
            tracing::warn!(error = %e, "session cleanup failed");
        }
        if let Err(e) = self.consumer.commit_consumer_state(CommitMode::Async) {
            tracing::debug!(error = %e, "commit after session skipped");
        }

        tracing::info!(generation_id, "kafka session ended");
        outcome
    }

    fn pause_assignment(&self) -> Result<(), IngestError> {
        let tpl = self.consumer.assignment().map_err(kafka_err)?;
        self.consumer.pause(&tpl).map_err(kafka_err)
    }
}

impl ConsumerGroup for KafkaConsumerGroup {
    fn consume(
        &self,
        topics: Vec<String>,
        handler: Arc<dyn GroupHandler>,
        token: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<(), IngestError>> + Send + '_>> {
        Box::pin(async move {
            self.ensure_open()?;
            self.ensure_subscribed(&topics)?;
            match self.await_assignment(&token).await? {
                Some(assignment) => self.run_session(assignment, handler, token).await,
                None => Ok(()),
            }
        })
    }

    fn pause_all(&self) -> Result<(), IngestError> {
        self.pause_assignment()?;
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume_all(&self) -> Result<(), IngestError> {
        let tpl = self.consumer.assignment().map_err(kafka_err)?;
        self.consumer.resume(&tpl).map_err(kafka_err)?;
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = Result<(), IngestError>> + Send + '_>> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::SeqCst) {
                return Ok(());
            }

            let consumer = self.consumer.clone();
            let committed = tokio::task::spawn_blocking(move || {
                let result = consumer.commit_consumer_state(CommitMode::Sync);
                consumer.unsubscribe();
                result
            })
            .await
            .map_err(|e| IngestError::io(format!("kafka close: {e}")))?;

            if let Err(e) = committed {
                tracing::debug!(error = %e, "final commit skipped");
            }
            tracing::info!(member_id = %self.member_id, "left consumer group");
            Ok(())
        })
    }
}
