use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{BrokerRecord, IngestError};

// ════════════════════════════════════════════════════════════════
//  Consumer group protocol traits
// ════════════════════════════════════════════════════════════════

/// Одна эпоха членства в группе (между двумя rebalance'ами).
///
/// Реализуется broker-адаптером. Через session claim processor
/// подтверждает прогресс (commit offset'а).
pub trait GroupSession: Send + Sync {
    /// Идентификатор участника, выданный group protocol.
    fn member_id(&self) -> &str;

    /// Поколение группы; растёт с каждым rebalance.
    fn generation_id(&self) -> i32;

    /// Отметить запись обработанной. Следующая claim для этой
    /// партиции начнёт с `record.offset + 1`.
    fn mark_record(&self, record: &BrokerRecord);
}

/// Упорядоченная последовательность записей одной партиции
/// в пределах одной session.
pub trait Claim: Send {
    fn topic(&self) -> &str;

    fn partition(&self) -> i32;

    /// Получить следующую запись. None = claim отозвана / канал закрыт.
    fn next_record(&mut self) -> Pin<Box<dyn Future<Output = Option<BrokerRecord>> + Send + '_>>;
}

/// Обработчик, которому group protocol отдаёт sessions и claims.
///
/// `setup` вызывается до первой claim, `cleanup` — после того как все
/// `consume_claim` данной session вернулись.
pub trait GroupHandler: Send + Sync {
    fn setup(&self, session: &dyn GroupSession) -> Result<(), IngestError>;

    fn cleanup(&self, session: &dyn GroupSession) -> Result<(), IngestError>;

    /// Обработать claim до её исчерпания. Вызывается конкурентно,
    /// по одному вызову на назначенную партицию.
    fn consume_claim<'a>(
        &'a self,
        session: &'a dyn GroupSession,
        claim: Box<dyn Claim>,
    ) -> Pin<Box<dyn Future<Output = Result<(), IngestError>> + Send + 'a>>;
}

/// Клиент consumer group (join → sessions → claims).
pub trait ConsumerGroup: Send + Sync {
    /// Войти в группу и потреблять до конца текущей session.
    ///
    /// Возвращает `Ok(())` при rebalance (партиции отозваны) или при
    /// отмене `token`. Ошибка kind `Closed` = группа закрыта через `close()`.
    fn consume(
        &self,
        topics: Vec<String>,
        handler: Arc<dyn GroupHandler>,
        token: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<(), IngestError>> + Send + '_>>;

    /// Приостановить выборку по всем назначенным партициям.
    fn pause_all(&self) -> Result<(), IngestError>;

    /// Возобновить выборку по всем назначенным партициям.
    fn resume_all(&self) -> Result<(), IngestError>;

    /// Явно покинуть группу. После вызова `consume` возвращает `Closed`.
    fn close(&self) -> Pin<Box<dyn Future<Output = Result<(), IngestError>> + Send + '_>>;
}
