use super::errors::StoreError;
use super::value::{Filters, Frame, Row, Value};
use crate::database::models::NewAuditRecord;
use crate::routing::DataCategory;

/// Time-series store access (append-only, last-write-wins on `(timestamp, tags)`)
pub trait TimeSeriesAccess: Send + Sync {
    /// Append rows; a row whose key already exists replaces the earlier one
    fn save(&self, rows: &[Row], category: DataCategory, table: &str) -> Result<usize, StoreError>;

    /// Load rows matching every filter
    fn load(&self, table: &str, filters: &Filters) -> Result<Frame, StoreError>;
}

/// Relational store access for bookkeeping data
pub trait RelationalAccess: Send + Sync {
    fn save(&self, rows: &[Row], category: DataCategory, table: &str) -> Result<usize, StoreError>;

    fn load(&self, table: &str, filters: &Filters) -> Result<Frame, StoreError>;

    /// Cheap round-trip against the store
    fn health_check(&self) -> bool;
}

/// Scoped relational transaction handed to a saga pivot step
///
/// Owned by a single thread for its whole lifetime. Dropping an unfinished unit
/// of work rolls it back.
pub trait UnitOfWork: Send {
    /// Run a parameterised statement (`$1`, `$2`, ...)
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, StoreError>;

    fn insert(&mut self, table: &str, rows: &[Row]) -> Result<usize, StoreError>;

    /// Insert `row`, or update the existing row with the same `key_columns`
    fn upsert(&mut self, table: &str, key_columns: &[&str], row: &Row) -> Result<usize, StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Hands out relational units of work
pub trait UnitOfWorkSource: Send + Sync {
    fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}

/// Append-only audit trail of saga attempts
pub trait AuditTrail: Send + Sync {
    fn record(&self, record: &NewAuditRecord) -> Result<(), StoreError>;
}
