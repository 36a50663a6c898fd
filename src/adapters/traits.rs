use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::DataCategory;
use crate::storage::Frame;

/// Errors raised by market-data adapters
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Category {0} not supported by adapter {1}")]
    UnsupportedCategory(DataCategory, String),

    #[error("Adapter not found: {0}")]
    NotFound(String),
}

/// What to pull from an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub category: DataCategory,
    pub symbol: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl FetchRequest {
    pub fn new(category: DataCategory) -> Self {
        Self {
            category,
            symbol: None,
            start: None,
            end: None,
        }
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }
}

/// A pluggable market-data source
pub trait DataAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn supported_categories(&self) -> Vec<DataCategory>;

    fn supports(&self, category: DataCategory) -> bool {
        self.supported_categories().contains(&category)
    }

    /// Fetch rows shaped for the category's destination table
    fn fetch(&self, request: &FetchRequest) -> Result<Frame, AdapterError>;
}
