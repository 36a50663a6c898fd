use thiserror::Error;

use crate::pool::PoolError;

/// Errors raised by the store access layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Diesel error: {0}")]
    Diesel(#[from] diesel::result::Error),

    #[error("Database query error: {0}")]
    Query(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// True when the store could not be reached at all
    pub fn is_connectivity_error(&self) -> bool {
        matches!(self, StoreError::Pool(_) | StoreError::Unavailable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::UnknownTable("ticks_x".to_string());
        assert_eq!(err.to_string(), "Unknown table: ticks_x");
    }

    #[test]
    fn test_connectivity_classification() {
        assert!(StoreError::Unavailable("down".into()).is_connectivity_error());
        assert!(StoreError::Pool(PoolError::Closed).is_connectivity_error());
        assert!(!StoreError::Query("syntax".into()).is_connectivity_error());
    }
}
