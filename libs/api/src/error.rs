/// Category of an ingest error. Lets the engine decide what to do with
/// it (skip the record, retry the group join, stop, fail fast).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration — permanent, fail at startup.
    Config,
    /// Broker / network error — transient, rejoin after backoff.
    Io,
    /// Payload does not match the expected shape — skip record.
    Format,
    /// Document store rejected or failed the operation.
    Storage,
    /// Consumer group was closed, graceful termination.
    Closed,
    /// Logical error (not found, invalid state, generic).
    Logic,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::Storage => f.write_str("storage"),
            ErrorKind::Closed => f.write_str("closed"),
            ErrorKind::Logic => f.write_str("logic"),
        }
    }
}

/// Unified error type for the plugin traits (broker, store).
///
/// Carries an `ErrorKind` for categorization and a human-readable message.
/// `From` impls assign the appropriate kind automatically and allow
/// ergonomic `?` in plugin implementations.
#[derive(Clone, PartialEq, Eq)]
pub struct IngestError {
    kind: ErrorKind,
    message: String,
}

impl IngestError {
    /// Generic logic error (default kind).
    pub fn new(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Logic, message: msg.into() }
    }

    /// Configuration error — permanent, fail at startup.
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    /// Broker / network error — transient.
    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    /// Decode error — bad payload.
    pub fn format_err(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, message: msg.into() }
    }

    /// Document store error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Storage, message: msg.into() }
    }

    /// Consumer group closed.
    pub fn closed(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Closed, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Группа закрыта — не повод для retry.
    pub fn is_closed(&self) -> bool {
        self.kind == ErrorKind::Closed
    }
}

impl std::fmt::Debug for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for IngestError {}

impl From<String> for IngestError {
    fn from(s: String) -> Self { Self { kind: ErrorKind::Logic, message: s } }
}

impl From<&str> for IngestError {
    fn from(s: &str) -> Self { Self { kind: ErrorKind::Logic, message: s.to_string() } }
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self { Self { kind: ErrorKind::Io, message: e.to_string() } }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self { Self { kind: ErrorKind::Format, message: e.to_string() } }
}
