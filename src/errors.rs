use thiserror::Error;

/// Errors surfaced while assembling or querying a traversal context.
#[derive(Debug, Error)]
pub enum ContextError {
    // Context initialization failed; carries the message attached by the builder
    #[error("initialization failed: {0}")]
    Init(String),

    // The calling thread's bounding-box caches are already borrowed
    #[error("bounding box caches are already in use on this thread")]
    CacheBusy,

    #[error("invalid layer pattern: {0}")]
    Pattern(#[from] regex::Error),

    // Attribute path could not be parsed
    #[error("path error: {0}")]
    Path(String),

    // Scene document or config JSON was malformed
    #[error("document error: {0}")]
    Document(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ContextError {
    fn from(err: serde_json::Error) -> Self {
        ContextError::Document(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ContextError>;
