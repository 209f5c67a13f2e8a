use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rdkafka::consumer::{Consumer, StreamConsumer};
use tokio::sync::mpsc;

use ingest_api::{BrokerRecord, Claim, GroupSession};

// ═══════════════════════════════════════════════════════════════
//  KafkaSession
// ═══════════════════════════════════════════════════════════════

/// Одна эпоха членства. Commit = `store_offset(offset + 1)`;
/// auto-commit librdkafka периодически отправляет сохранённые offset'ы.
pub(crate) struct KafkaSession {
    pub(crate) consumer: Arc<StreamConsumer>,
    pub(crate) member_id: String,
    pub(crate) generation_id: i32,
}

impl GroupSession for KafkaSession {
    fn member_id(&self) -> &str {
        &self.member_id
    }

    fn generation_id(&self) -> i32 {
        self.generation_id
    }

    fn mark_record(&self, record: &BrokerRecord) {
        if let Err(e) = self
            .consumer
            .store_offset(&record.topic, record.partition, record.offset + 1)
        {
            tracing::warn!(
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                error = %e,
                "failed to store offset"
            );
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  KafkaClaim
// ═══════════════════════════════════════════════════════════════

/// Записи одной партиции, которые dispatcher session'а кладёт в канал.
/// Канал закрывается, когда session завершается.
pub(crate) struct KafkaClaim {
    pub(crate) topic: String,
    pub(crate) partition: i32,
    pub(crate) rx: mpsc::Receiver<BrokerRecord>,
}

impl Claim for KafkaClaim {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn partition(&self) -> i32 {
        self.partition
    }

    fn next_record(&mut self) -> Pin<Box<dyn Future<Output = Option<BrokerRecord>> + Send + '_>> {
        Box::pin(self.rx.recv())
    }
}
