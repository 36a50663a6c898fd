/// Cross-store consistency for a time-series append plus relational bookkeeping
///
/// Forward append, pivot in a relational unit of work, compensating re-write
/// on failure, and an audit row per attempt.

pub mod coordinator;
pub mod errors;
pub mod state;

pub use coordinator::{new_txn_id, PivotError, SagaCoordinator};
pub use errors::{DoubleFault, SagaError, ValidationError};
pub use state::{SagaOutcome, SagaState};
