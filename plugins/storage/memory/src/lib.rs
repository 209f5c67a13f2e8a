use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use ingest_api::{DocumentQuery, DocumentStore, IngestError, InsertOutcome};

// ═══════════════════════════════════════════════════════════════
//  MemoryStoreConfig
// ═══════════════════════════════════════════════════════════════

fn default_max_documents() -> usize {
    100_000
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MemoryStoreConfig {
    /// Лимит документов на коллекцию; старые вытесняются.
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_documents: default_max_documents(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryDocumentStore
// ═══════════════════════════════════════════════════════════════

/// In-memory document store: ring-buffer на коллекцию. Для локального
/// запуска без Mongo и для тестов read API.
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, VecDeque<serde_json::Value>>>,
    max_documents: usize,
    next_id: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new(config: &MemoryStoreConfig) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            max_documents: config.max_documents.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    /// Количество документов в коллекции.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, VecDeque::len)
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new(&MemoryStoreConfig::default())
    }
}

fn is_deleted(doc: &serde_json::Value) -> bool {
    doc.get("deleteDate").is_some_and(|v| !v.is_null())
}

/// Проекция документа: только запрошенные поля, без `_id`.
fn project(doc: &serde_json::Value, fields: &[String]) -> serde_json::Value {
    let Some(obj) = doc.as_object() else {
        return doc.clone();
    };
    let projected = obj
        .iter()
        .filter(|(k, _)| k.as_str() != "_id")
        .filter(|(k, _)| fields.is_empty() || fields.iter().any(|f| f == *k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    serde_json::Value::Object(projected)
}

impl DocumentStore for MemoryDocumentStore {
    fn insert(
        &self,
        collection: &str,
        document: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<InsertOutcome, IngestError>> + Send + '_>> {
        let collection = collection.to_string();
        Box::pin(async move {
            let serde_json::Value::Object(mut obj) = document else {
                return Err(IngestError::storage("document must be a JSON object"));
            };
            let inserted_id = format!("{:024x}", self.next_id.fetch_add(1, Ordering::Relaxed));
            obj.insert("_id".into(), serde_json::Value::String(inserted_id.clone()));

            let mut collections = self.collections.write().await;
            let docs = collections.entry(collection).or_default();
            if docs.len() >= self.max_documents {
                docs.pop_front();
            }
            docs.push_back(serde_json::Value::Object(obj));
            Ok(InsertOutcome { inserted_id })
        })
    }

    fn find(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<serde_json::Value>, IngestError>> + Send + '_>> {
        let collection = collection.to_string();
        let query = query.clone();
        Box::pin(async move {
            let collections = self.collections.read().await;
            let Some(docs) = collections.get(&collection) else {
                return Ok(Vec::new());
            };
            let limit = query.limit.unwrap_or(usize::MAX);
            Ok(docs
                .iter()
                .filter(|d| !(query.exclude_deleted && is_deleted(d)))
                .take(limit)
                .map(|d| project(d, &query.fields))
                .collect())
        })
    }

    fn count(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Pin<Box<dyn Future<Output = Result<u64, IngestError>> + Send + '_>> {
        let collection = collection.to_string();
        let exclude_deleted = query.exclude_deleted;
        Box::pin(async move {
            let collections = self.collections.read().await;
            let matched = collections
                .get(&collection)
                .map(|docs| docs.iter().filter(|d| !(exclude_deleted && is_deleted(d))).count())
                .unwrap_or(0);
            Ok(matched as u64)
        })
    }

    fn find_one(
        &self,
        collection: &str,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<serde_json::Value>, IngestError>> + Send + '_>> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            let collections = self.collections.read().await;
            Ok(collections.get(&collection).and_then(|docs| {
                docs.iter()
                    .find(|d| !is_deleted(d) && d.get("id").and_then(|v| v.as_str()) == Some(id.as_str()))
                    .map(|d| project(d, &[]))
            }))
        })
    }
}
