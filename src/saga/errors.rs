use thiserror::Error;

use crate::routing::DataCategory;
use crate::storage::StoreError;

/// Saga input rejected before either store is touched
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Business id must not be empty")]
    EmptyBusinessId,

    #[error("Invalid table name: {0:?}")]
    InvalidTable(String),

    #[error("No time-series schema for table {table} ({category})")]
    UnknownSchema { table: String, category: DataCategory },

    #[error("Row {index} is missing columns: {}", missing.join(", "))]
    MissingColumns { index: usize, missing: Vec<String> },

    #[error("Row {index}: column {column} is not a timestamp")]
    InvalidTimestamp { index: usize, column: String },
}

/// Compensation itself failed: time-series rows of `txn_id` may still be
/// marked valid while the relational side rolled back
#[derive(Debug, Error)]
#[error("Double fault in {txn_id}: compensation failed: {cause}")]
pub struct DoubleFault {
    pub txn_id: String,
    #[source]
    pub cause: StoreError,
}

/// Why a saga attempt did not reach a terminal state normally
#[derive(Debug, Error)]
pub enum SagaError {
    #[error("Saga input rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("Time-series append failed for {txn_id}: {cause}")]
    Append {
        txn_id: String,
        #[source]
        cause: StoreError,
    },

    #[error(transparent)]
    DoubleFault(#[from] DoubleFault),
}
