//! MongoDB document store.
//!
//! Вставки идут в `<database>.<collection>`, чтение для read API
//! исключает `_id` и документы с непустым `deleteDate`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::{Client, Collection, Database};

use ingest_api::{DocumentQuery, DocumentStore, IngestError, InsertOutcome};

// ═══════════════════════════════════════════════════════════════
//  MongoStoreConfig
// ═══════════════════════════════════════════════════════════════

fn default_database() -> String {
    "products".into()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MongoStoreConfig {
    /// Connection string, например `mongodb://localhost:27017`.
    pub url: String,
    #[serde(default = "default_database")]
    pub database: String,
    /// Таймаут на ping при подключении.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl MongoStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: default_database(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  MongoDocumentStore
// ═══════════════════════════════════════════════════════════════

pub struct MongoDocumentStore {
    db: Database,
}

impl MongoDocumentStore {
    /// Подключиться и проверить доступность сервера (`ping`).
    pub async fn connect(config: &MongoStoreConfig) -> Result<Self, IngestError> {
        if config.url.trim().is_empty() {
            return Err(IngestError::config("mongo url is empty"));
        }

        let client = Client::with_uri_str(&config.url)
            .await
            .map_err(|e| IngestError::config(format!("mongo url: {e}")))?;
        let db = client.database(&config.database);

        let timeout = Duration::from_millis(config.connect_timeout_ms);
        match tokio::time::timeout(timeout, db.run_command(doc! { "ping": 1 })).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(IngestError::io(format!("mongo ping: {e}"))),
            Err(_) => {
                return Err(IngestError::io(format!(
                    "mongo ping: no answer within {}ms",
                    config.connect_timeout_ms
                )));
            }
        }

        tracing::info!(database = %config.database, "connected to mongo");
        Ok(Self { db })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

fn storage_err(op: &str, collection: &str, e: impl std::fmt::Display) -> IngestError {
    IngestError::storage(format!("mongo {op} {collection}: {e}"))
}

/// JSON-объект → BSON document. Всё, что не объект, отвергается.
pub fn to_document(value: &serde_json::Value) -> Result<Document, IngestError> {
    if !value.is_object() {
        return Err(IngestError::storage("document must be a JSON object"));
    }
    bson::to_document(value).map_err(|e| IngestError::storage(format!("bson: {e}")))
}

/// BSON document → JSON в relaxed extended JSON (ObjectId как `{"$oid": ..}`).
pub fn to_json(document: Document) -> serde_json::Value {
    Bson::Document(document).into_relaxed_extjson()
}

/// Hex ObjectId, либо строковое представление для прочих `_id`.
pub fn inserted_id_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Фильтр "не удалён": `deleteDate` равно null или отсутствует.
pub fn query_filter(query: &DocumentQuery) -> Document {
    if query.exclude_deleted {
        doc! { "deleteDate": Bson::Null }
    } else {
        Document::new()
    }
}

/// Проекция: `_id` всегда исключён, плюс запрошенные поля.
pub fn query_projection(fields: &[String]) -> Document {
    let mut projection = doc! { "_id": 0 };
    for field in fields {
        if field != "_id" {
            projection.insert(field.clone(), 1);
        }
    }
    projection
}

impl DocumentStore for MongoDocumentStore {
    fn insert(
        &self,
        collection: &str,
        document: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<InsertOutcome, IngestError>> + Send + '_>> {
        let name = collection.to_string();
        Box::pin(async move {
            let doc = to_document(&document)?;
            let result = self
                .collection(&name)
                .insert_one(doc)
                .await
                .map_err(|e| storage_err("insert", &name, e))?;
            Ok(InsertOutcome {
                inserted_id: inserted_id_string(&result.inserted_id),
            })
        })
    }

    fn find(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<serde_json::Value>, IngestError>> + Send + '_>> {
        let name = collection.to_string();
        let query = query.clone();
        Box::pin(async move {
            let coll = self.collection(&name);
            let mut find = coll
                .find(query_filter(&query))
                .projection(query_projection(&query.fields));
            if let Some(limit) = query.limit {
                find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
            }

            let cursor = find.await.map_err(|e| storage_err("find", &name, e))?;
            let docs: Vec<Document> = cursor
                .try_collect()
                .await
                .map_err(|e| storage_err("find", &name, e))?;
            Ok(docs.into_iter().map(to_json).collect())
        })
    }

    fn count(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Pin<Box<dyn Future<Output = Result<u64, IngestError>> + Send + '_>> {
        let name = collection.to_string();
        let filter = query_filter(query);
        Box::pin(async move {
            self.collection(&name)
                .count_documents(filter)
                .await
                .map_err(|e| storage_err("count", &name, e))
        })
    }

    fn find_one(
        &self,
        collection: &str,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<serde_json::Value>, IngestError>> + Send + '_>> {
        let name = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            let found = self
                .collection(&name)
                .find_one(doc! { "id": id, "deleteDate": Bson::Null })
                .projection(doc! { "_id": 0 })
                .await
                .map_err(|e| storage_err("find_one", &name, e))?;
            Ok(found.map(to_json))
        })
    }
}
