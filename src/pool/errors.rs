use thiserror::Error;

/// Errors raised by the connection pool
///
/// The pool raises rather than degrades so callers can tell "no connection
/// available" apart from "connected, found nothing".
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timed out after {waited_ms}ms waiting for a connection: {reason}")]
    Timeout { waited_ms: u64, reason: String },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Database query error: {0}")]
    Query(String),

    #[error("Connection pool is shut down")]
    Closed,
}

impl PoolError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PoolError::Timeout { .. })
    }
}
