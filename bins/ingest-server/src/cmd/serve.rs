use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use broker_kafka::{ASSIGNOR, KafkaConsumerGroup};
use consumer_engine::{ClaimProcessor, Coordinator, EngineError, Routing, signal};
use ingest_api::{ConsumerGroup, DocumentStore};
use storage_memory::{MemoryDocumentStore, MemoryStoreConfig};
use storage_mongo::{MongoDocumentStore, MongoStoreConfig};

use crate::config::{Effective, ServeArgs, StoreBackend, StoreConfig};
use crate::error::ServerError;

async fn build_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, ServerError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!(max_documents = config.max_documents, "using in-memory store");
            Ok(Arc::new(MemoryDocumentStore::new(&MemoryStoreConfig {
                max_documents: config.max_documents,
            })))
        }
        StoreBackend::Mongo => {
            let url = config.url.clone().ok_or(ServerError::Config {
                context: "store",
                detail: "mongo backend requires url".into(),
            })?;
            let mongo = MongoStoreConfig {
                database: config.database.clone(),
                ..MongoStoreConfig::new(url)
            };
            Ok(Arc::new(MongoDocumentStore::connect(&mongo).await?))
        }
    }
}

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    let eff = Effective::new(&args)?;

    tracing::info!(
        brokers = ?eff.kafka.brokers,
        topics = ?eff.kafka.topics,
        group = %eff.kafka.group,
        assignor = ASSIGNOR,
        oldest = true,
        version = %eff.version,
        host = %std::env::var("HOSTNAME").unwrap_or_default(),
        pid = std::process::id(),
        "starting catalog ingest"
    );

    let store = build_store(&eff.store).await?;
    let group: Arc<dyn ConsumerGroup> = Arc::new(KafkaConsumerGroup::new(&eff.kafka)?);
    let processor = ClaimProcessor::new(store.clone(), Routing::new(&eff.store.routing))
        .with_client_id(eff.kafka.client_id.clone());

    let coordinator = Coordinator::new(
        group,
        processor,
        eff.kafka.topics.clone(),
        eff.coordinator.clone(),
        None,
    );
    coordinator.start()?;

    let mut signals = tokio::spawn(signal::listen(coordinator.clone()));

    match coordinator.await_ready().await {
        Ok(()) => tracing::info!("consumer up and running"),
        Err(EngineError::ShutdownBeforeReady) => {
            tracing::warn!("shutdown requested before the first session");
        }
        Err(e) => return Err(e.into()),
    }

    // --- Read API ---
    let api_token = CancellationToken::new();
    let mut api = if eff.api.enabled && !coordinator.cancellation_token().is_cancelled() {
        let api_config = eff.api.clone();
        let collection = eff.store.routing.products_collection.clone();
        let token = api_token.clone();
        let store = store.clone();
        Some(tokio::spawn(async move {
            catalog_api_server::run(&api_config, store, &collection, token).await
        }))
    } else {
        None
    };

    let joined = match api.as_mut() {
        Some(server) => tokio::select! {
            joined = &mut signals => joined,
            served = server => {
                let detail = match served {
                    Ok(Ok(())) => "read api stopped unexpectedly".to_string(),
                    Ok(Err(e)) => e,
                    Err(e) => e.to_string(),
                };
                tracing::error!(error = %detail, "read api failed, shutting down consumer");
                coordinator.shutdown().await?;
                signals.abort();
                return Err(ServerError::Api(detail));
            }
        },
        None => signals.await,
    };
    let outcome = joined.map_err(|e| ServerError::Signal(e.to_string()))?;

    api_token.cancel();
    if let Some(server) = api {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ServerError::Api(e)),
            Err(e) => return Err(ServerError::Api(e.to_string())),
        }
    }

    outcome?;
    tracing::info!("catalog ingest stopped");
    Ok(())
}
