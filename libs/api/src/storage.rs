use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::IngestError;

// ════════════════════════════════════════════════════════════════
//  Document store
// ════════════════════════════════════════════════════════════════

/// Результат успешной вставки документа.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOutcome {
    /// Идентификатор, присвоенный store (Mongo `_id` в hex).
    pub inserted_id: String,
}

/// Параметры выборки документов из коллекции.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    /// Проекция: только эти поля (пусто = все поля). `_id` не отдаётся.
    pub fields: Vec<String>,
    /// Пропускать документы с непустым `deleteDate`.
    pub exclude_deleted: bool,
    /// Максимальное количество документов.
    pub limit: Option<usize>,
}

/// Persistence gateway: вставка и чтение документов по имени коллекции.
///
/// Плагины: memory (built-in), mongo.
/// Разделяется всеми claim processor'ами — реализация обязана быть
/// потокобезопасной; каждая вставка независима.
pub trait DocumentStore: Send + Sync {
    /// Вставить документ в коллекцию.
    fn insert(
        &self,
        collection: &str,
        document: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<InsertOutcome, IngestError>> + Send + '_>>;

    /// Выбрать документы коллекции.
    fn find(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<serde_json::Value>, IngestError>> + Send + '_>>;

    /// Количество документов, подходящих под фильтр `query`.
    /// `fields` и `limit` не учитываются.
    fn count(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Pin<Box<dyn Future<Output = Result<u64, IngestError>> + Send + '_>>;

    /// Найти документ по полю `id` (не по `_id`), исключая удалённые.
    fn find_one(
        &self,
        collection: &str,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<serde_json::Value>, IngestError>> + Send + '_>>;
}
