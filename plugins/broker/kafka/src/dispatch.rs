use std::collections::{HashMap, VecDeque};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use ingest_api::BrokerRecord;

/// Каналы claim'ов текущей session по `(topic, partition)`.
pub(crate) type Senders = HashMap<(String, i32), mpsc::Sender<BrokerRecord>>;

pub(crate) enum Delivery {
    Sent,
    /// Партиция не входит в assignment текущей session.
    Foreign(BrokerRecord),
    Cancelled,
}

/// Итог разбора backlog'а session.
#[derive(Debug)]
pub(crate) enum Drained {
    /// Backlog пуст, session продолжается.
    Empty,
    Cancelled,
    /// Пришла запись чужой партиции: session заканчивается, эти записи
    /// (чужая первой) переходят в следующую session.
    Requeue(VecDeque<BrokerRecord>),
}

/// Отдать запись claim'у её партиции.
pub(crate) async fn deliver(senders: &Senders, record: BrokerRecord, token: &CancellationToken) -> Delivery {
    let Some(tx) = senders.get(&(record.topic.clone(), record.partition)) else {
        return Delivery::Foreign(record);
    };
    let (topic, partition, offset) = (record.topic.clone(), record.partition, record.offset);
    tokio::select! {
        _ = token.cancelled() => Delivery::Cancelled,
        sent = tx.send(record) => {
            if sent.is_err() {
                tracing::warn!(topic = %topic, partition, offset, "claim already finished, record dropped");
            }
            Delivery::Sent
        }
    }
}

/// Разобрать backlog по claim'ам.
///
/// Первые `stale` записей прочитаны до начала session: чужие среди них
/// относятся к отозванным партициям и отбрасываются. Чужая запись,
/// прочитанная уже в session, означает смену assignment.
pub(crate) async fn drain_backlog(
    senders: &Senders,
    backlog: &mut VecDeque<BrokerRecord>,
    stale: &mut usize,
    token: &CancellationToken,
) -> Drained {
    while let Some(record) = backlog.pop_front() {
        let from_before = *stale > 0;
        *stale = stale.saturating_sub(1);
        match deliver(senders, record, token).await {
            Delivery::Sent => {}
            Delivery::Cancelled => return Drained::Cancelled,
            Delivery::Foreign(record) if from_before => {
                tracing::debug!(topic = %record.topic, partition = record.partition, "dropping record of revoked partition");
            }
            Delivery::Foreign(record) => {
                tracing::info!(topic = %record.topic, partition = record.partition, "record of unassigned partition, ending session");
                let mut requeue = VecDeque::with_capacity(backlog.len() + 1);
                requeue.push_back(record);
                requeue.extend(backlog.drain(..));
                return Drained::Requeue(requeue);
            }
        }
    }
    Drained::Empty
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(topic: &str, partition: i32, offset: i64) -> BrokerRecord {
        BrokerRecord::new(topic, partition, offset, b"{}".to_vec())
    }

    fn claims(partitions: &[(&str, i32)]) -> (Senders, HashMap<(String, i32), mpsc::Receiver<BrokerRecord>>) {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for (topic, partition) in partitions {
            let (tx, rx) = mpsc::channel(16);
            senders.insert((topic.to_string(), *partition), tx);
            receivers.insert((topic.to_string(), *partition), rx);
        }
        (senders, receivers)
    }

    fn offsets(rx: &mut mpsc::Receiver<BrokerRecord>) -> Vec<i64> {
        let mut out = Vec::new();
        while let Ok(r) = rx.try_recv() {
            out.push(r.offset);
        }
        out
    }

    #[tokio::test]
    async fn test_records_routed_to_their_partition() {
        let (senders, mut rx) = claims(&[("create.products", 0), ("create.products", 1)]);
        let mut backlog: VecDeque<_> = vec![
            record("create.products", 0, 5),
            record("create.products", 1, 7),
            record("create.products", 0, 6),
        ]
        .into();
        let mut stale = 0;

        let drained = drain_backlog(&senders, &mut backlog, &mut stale, &CancellationToken::new()).await;

        assert!(matches!(drained, Drained::Empty));
        assert!(backlog.is_empty());
        assert_eq!(offsets(rx.get_mut(&("create.products".into(), 0)).unwrap()), vec![5, 6]);
        assert_eq!(offsets(rx.get_mut(&("create.products".into(), 1)).unwrap()), vec![7]);
    }

    #[tokio::test]
    async fn test_stale_foreign_record_is_dropped() {
        let (senders, mut rx) = claims(&[("create.products", 0)]);
        let mut backlog: VecDeque<_> = vec![
            record("create.products", 3, 1),
            record("create.products", 0, 2),
        ]
        .into();
        let mut stale = 1;

        let drained = drain_backlog(&senders, &mut backlog, &mut stale, &CancellationToken::new()).await;

        assert!(matches!(drained, Drained::Empty));
        assert_eq!(stale, 0);
        assert_eq!(offsets(rx.get_mut(&("create.products".into(), 0)).unwrap()), vec![2]);
    }

    #[tokio::test]
    async fn test_live_foreign_record_ends_session_and_requeues_rest() {
        let (senders, mut rx) = claims(&[("create.products", 0)]);
        let mut backlog: VecDeque<_> = vec![
            record("create.products", 0, 1),
            record("create.productsLanguage", 0, 9),
            record("create.products", 0, 2),
        ]
        .into();
        let mut stale = 0;

        let drained = drain_backlog(&senders, &mut backlog, &mut stale, &CancellationToken::new()).await;

        let Drained::Requeue(requeue) = drained else {
            panic!("expected requeue, got {drained:?}");
        };
        let order: Vec<(String, i64)> = requeue.iter().map(|r| (r.topic.clone(), r.offset)).collect();
        assert_eq!(
            order,
            vec![("create.productsLanguage".to_string(), 9), ("create.products".to_string(), 2)]
        );
        assert!(backlog.is_empty());
        assert_eq!(offsets(rx.get_mut(&("create.products".into(), 0)).unwrap()), vec![1]);
    }

    #[tokio::test]
    async fn test_cancel_while_claim_is_full() {
        let (tx, _rx) = mpsc::channel(1);
        let senders: Senders = HashMap::from([(("create.products".to_string(), 0), tx)]);
        let mut backlog: VecDeque<_> = vec![
            record("create.products", 0, 1),
            record("create.products", 0, 2),
        ]
        .into();
        let mut stale = 0;
        let token = CancellationToken::new();
        token.cancel();

        let drained = drain_backlog(&senders, &mut backlog, &mut stale, &token).await;

        assert!(matches!(drained, Drained::Cancelled));
    }

    #[tokio::test]
    async fn test_finished_claim_does_not_block() {
        let (senders, rx) = claims(&[("create.products", 0)]);
        drop(rx);
        let mut backlog: VecDeque<_> = vec![record("create.products", 0, 1)].into();
        let mut stale = 0;

        let drained = drain_backlog(&senders, &mut backlog, &mut stale, &CancellationToken::new()).await;

        assert!(matches!(drained, Drained::Empty));
    }
}
