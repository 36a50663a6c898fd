use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::value::{Row, Value};
use crate::routing::DataCategory;

/// Column stamped with the saga attempt that wrote the row
pub const TXN_ID_COLUMN: &str = "txn_id";

/// Validity flag; compensation flips it to false
pub const VALID_COLUMN: &str = "is_valid";

/// Plain SQL identifier: ASCII letter or underscore, then letters, digits or underscores
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Effective primary key of a time-series row: timestamp plus tag values
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey {
    pub timestamp: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// Shape of a time-series table
///
/// `(timestamp_column, tag_columns...)` addresses a row uniquely; writing the
/// same key again overwrites the earlier row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub timestamp_column: String,
    pub tag_columns: Vec<String>,
    pub value_columns: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, timestamp_column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp_column: timestamp_column.into(),
            tag_columns: Vec::new(),
            value_columns: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tag_columns = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_values(mut self, values: &[&str]) -> Self {
        self.value_columns = values.iter().map(|v| v.to_string()).collect();
        self
    }

    /// Timestamp column followed by tag columns
    pub fn key_columns(&self) -> Vec<&str> {
        std::iter::once(self.timestamp_column.as_str())
            .chain(self.tag_columns.iter().map(String::as_str))
            .collect()
    }

    /// Every column a caller-supplied row must carry
    pub fn required_columns(&self) -> Vec<&str> {
        let mut columns = self.key_columns();
        columns.extend(self.value_columns.iter().map(String::as_str));
        columns
    }

    /// Required columns absent from `row` (a NULL key column counts as absent)
    pub fn missing_columns(&self, row: &Row) -> Vec<String> {
        let keys = self.key_columns();
        self.required_columns()
            .into_iter()
            .filter(|column| match row.get(column) {
                None => true,
                Some(value) => value.is_null() && keys.contains(column),
            })
            .map(str::to_string)
            .collect()
    }

    /// Key of `row`, or `None` when the timestamp or a tag is missing
    pub fn row_key(&self, row: &Row) -> Option<RowKey> {
        let timestamp = row.timestamp(&self.timestamp_column)?;
        let tags = self
            .tag_columns
            .iter()
            .map(|tag| match row.get(tag) {
                None | Some(Value::Null) => None,
                Some(value) => Some(value.to_string()),
            })
            .collect::<Option<Vec<_>>>()?;

        Some(RowKey { timestamp, tags })
    }
}

/// Known time-series table shapes, keyed by table name
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: HashMap<String, TableSchema>,
}

impl SchemaCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the built-in market-data tables
    pub fn market_data() -> Self {
        let mut catalog = Self::new();

        catalog.register(
            TableSchema::new(DataCategory::TickData.default_table(), "ts")
                .with_tags(&["symbol"])
                .with_values(&["price", "volume", "amount"]),
        );
        catalog.register(
            TableSchema::new(DataCategory::MinuteKline.default_table(), "ts")
                .with_tags(&["symbol", "frequency"])
                .with_values(&["open", "high", "low", "close", "volume", "amount"]),
        );
        catalog.register(
            TableSchema::new(DataCategory::OrderBookDepth.default_table(), "ts")
                .with_tags(&["symbol", "level"])
                .with_values(&["bid_price", "bid_volume", "ask_price", "ask_volume"]),
        );
        catalog.register(
            TableSchema::new(DataCategory::Level2Snapshot.default_table(), "ts")
                .with_tags(&["symbol"])
                .with_values(&["last_price", "total_volume", "total_amount"]),
        );
        catalog.register(
            TableSchema::new(DataCategory::IndexQuotes.default_table(), "ts")
                .with_tags(&["index_code"])
                .with_values(&["price", "change_pct", "volume"]),
        );

        catalog
    }

    /// Insert or replace a schema
    pub fn register(&mut self, schema: TableSchema) {
        self.schemas.insert(schema.name.clone(), schema);
    }

    pub fn get(&self, table: &str) -> Option<&TableSchema> {
        self.schemas.get(table)
    }

    /// Schema for `table`, falling back to the category's default table
    pub fn resolve(&self, table: &str, category: DataCategory) -> Option<&TableSchema> {
        self.get(table).or_else(|| self.get(category.default_table()))
    }

    pub fn tables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
