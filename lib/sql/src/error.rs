use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// Transient lock contention (SQLITE_BUSY / SQLITE_LOCKED).
    /// Callers may retry; all other variants are terminal.
    #[error("storage busy: {0}")]
    Busy(String),
}

impl SQLError {
    /// Whether this error is worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, SQLError::Busy(_))
    }
}
