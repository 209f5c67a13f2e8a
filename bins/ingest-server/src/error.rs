#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Ingest(#[from] ingest_api::IngestError),

    #[error("{0}")]
    Engine(#[from] consumer_engine::EngineError),

    #[error("api: {0}")]
    Api(String),

    #[error("signal: {0}")]
    Signal(String),
}
