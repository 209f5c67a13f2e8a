use ingest_api::IngestError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("coordinator already started")]
    AlreadyStarted,

    #[error("shutdown requested before the consumer became ready")]
    ShutdownBeforeReady,

    #[error("worker: {0}")]
    Worker(String),

    #[error("group: {0}")]
    Group(#[from] IngestError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_errors() {
        let messages: Vec<String> = [
            EngineError::AlreadyStarted,
            EngineError::ShutdownBeforeReady,
            EngineError::Worker("task panicked".into()),
        ]
        .iter()
        .map(|e| match e {
            EngineError::AlreadyStarted | EngineError::ShutdownBeforeReady | EngineError::Worker(_) => e.to_string(),
            EngineError::Group(_) | EngineError::Signal(_) => unreachable!(),
        })
        .collect();
        assert_eq!(
            messages,
            vec![
                "coordinator already started",
                "shutdown requested before the consumer became ready",
                "worker: task panicked",
            ]
        );
    }
}
