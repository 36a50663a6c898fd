use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::errors::{DoubleFault, SagaError, ValidationError};
use super::state::{SagaOutcome, SagaState};
use crate::database::models::{FinalStatus, NewAuditRecord, StepStatus};
use crate::events::bus::panic_message;
use crate::routing::DataCategory;
use crate::storage::{
    is_valid_identifier, AuditTrail, Filters, Row, SchemaCatalog, StoreError, TimeSeriesAccess, UnitOfWork,
    UnitOfWorkSource, TXN_ID_COLUMN, VALID_COLUMN,
};

/// Error a pivot step may return
pub type PivotError = Box<dyn std::error::Error + Send + Sync>;

/// Fresh attempt id, e.g. `txn_5f0c…`
pub fn new_txn_id() -> String {
    format!("txn_{}", Uuid::new_v4().simple())
}

/// Makes a time-series append plus a relational bookkeeping write look atomic
///
/// The append runs first with every row stamped `txn_id` and `is_valid = true`.
/// The caller's pivot then runs inside a relational unit of work. If the pivot
/// or its commit fails, the appended rows are re-written with `is_valid = false`;
/// the time-series store's last-write-wins on `(timestamp, tags)` makes that
/// re-write replace them in place.
pub struct SagaCoordinator {
    timeseries: Arc<dyn TimeSeriesAccess>,
    units: Arc<dyn UnitOfWorkSource>,
    audit: Arc<dyn AuditTrail>,
    catalog: Arc<SchemaCatalog>,
}

impl SagaCoordinator {
    pub fn new(
        timeseries: Arc<dyn TimeSeriesAccess>,
        units: Arc<dyn UnitOfWorkSource>,
        audit: Arc<dyn AuditTrail>,
        catalog: Arc<SchemaCatalog>,
    ) -> Self {
        Self {
            timeseries,
            units,
            audit,
            catalog,
        }
    }

    /// Run one attempt and report success as a boolean
    ///
    /// Ordinary failures (bad input, failed append, rolled-back pivot) return
    /// `Ok(false)` and are logged. Only a failed compensation surfaces as an error.
    pub fn execute_sync<F>(
        &self,
        business_id: &str,
        rows: &[Row],
        category: DataCategory,
        table: &str,
        pivot: F,
    ) -> Result<bool, DoubleFault>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<(), PivotError>,
    {
        match self.execute(business_id, rows, category, table, pivot) {
            Ok(outcome) => Ok(outcome.is_committed()),
            Err(SagaError::DoubleFault(fault)) => Err(fault),
            Err(e) => {
                error!("Saga {} failed: {}", business_id, e);
                Ok(false)
            }
        }
    }

    /// Run one attempt and return its tagged outcome
    pub fn execute<F>(
        &self,
        business_id: &str,
        rows: &[Row],
        category: DataCategory,
        table: &str,
        pivot: F,
    ) -> Result<SagaOutcome, SagaError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<(), PivotError>,
    {
        let txn_id = new_txn_id();
        let span = info_span!("saga", txn_id = %txn_id, business_id = %business_id);
        let _enter = span.enter();

        self.validate(business_id, rows, category, table)?;

        if rows.is_empty() {
            debug!("No rows to write, nothing to do");
            return Ok(SagaOutcome::Committed { txn_id, rows: 0 });
        }

        let state = SagaState::Started;
        let stamped: Vec<Row> = rows
            .iter()
            .map(|row| {
                row.clone()
                    .with(TXN_ID_COLUMN, txn_id.as_str())
                    .with(VALID_COLUMN, true)
            })
            .collect();

        // Nothing durable exists if the append fails, so there is nothing to compensate
        if let Err(cause) = self.timeseries.save(&stamped, category, table) {
            error!("Time-series append to {} failed: {}", table, cause);
            self.write_audit(NewAuditRecord::new(
                &txn_id,
                category,
                business_id,
                StepStatus::Failed,
                StepStatus::Skipped,
                FinalStatus::RolledBack,
                Some(cause.to_string()),
            ));
            return Err(SagaError::Append { txn_id, cause });
        }
        let state = state.advance(SagaState::AppendedToTimeSeries);

        let cause = match self.run_pivot(pivot) {
            Ok(()) => {
                state.advance(SagaState::Committed);
                info!("✅ Saga committed ({} rows -> {})", stamped.len(), table);
                self.write_audit(NewAuditRecord::new(
                    &txn_id,
                    category,
                    business_id,
                    StepStatus::Success,
                    StepStatus::Success,
                    FinalStatus::Committed,
                    None,
                ));
                return Ok(SagaOutcome::Committed {
                    txn_id,
                    rows: stamped.len(),
                });
            }
            Err(cause) => cause,
        };

        let state = state.advance(SagaState::Compensating);
        warn!("Pivot failed, compensating {} rows: {}", stamped.len(), cause);

        match self.compensate(&txn_id, category, table) {
            Ok(_) => {
                state.advance(SagaState::RolledBack);
                self.write_audit(NewAuditRecord::new(
                    &txn_id,
                    category,
                    business_id,
                    StepStatus::Compensated,
                    StepStatus::Failed,
                    FinalStatus::RolledBack,
                    Some(cause.clone()),
                ));
                Ok(SagaOutcome::RolledBack { txn_id, cause })
            }
            Err(compensation_error) => {
                error!(
                    "❌ Double fault: compensation of {} failed after pivot error ({}): {}",
                    txn_id, cause, compensation_error
                );
                self.write_audit(NewAuditRecord::new(
                    &txn_id,
                    category,
                    business_id,
                    StepStatus::Success,
                    StepStatus::Failed,
                    FinalStatus::Failed,
                    Some(format!("pivot: {}; compensation: {}", cause, compensation_error)),
                ));
                Err(DoubleFault {
                    txn_id,
                    cause: compensation_error,
                }
                .into())
            }
        }
    }

    /// Re-write every row tagged `txn_id` with `is_valid = false`
    ///
    /// Idempotent; rows of other attempts are never read or written.
    pub fn compensate(&self, txn_id: &str, category: DataCategory, table: &str) -> Result<usize, StoreError> {
        let filters = Filters::new().eq(TXN_ID_COLUMN, txn_id);
        let mut rows = self.timeseries.load(table, &filters)?;

        if rows.is_empty() {
            warn!("No rows tagged {} in {}, nothing to compensate", txn_id, table);
            return Ok(0);
        }

        for row in rows.iter_mut() {
            row.set(VALID_COLUMN, false);
        }
        self.timeseries.save(&rows, category, table)?;

        info!("↩️  Compensated {} rows of {} in {}", rows.len(), txn_id, table);
        Ok(rows.len())
    }

    fn validate(
        &self,
        business_id: &str,
        rows: &[Row],
        category: DataCategory,
        table: &str,
    ) -> Result<(), ValidationError> {
        if business_id.trim().is_empty() {
            return Err(ValidationError::EmptyBusinessId);
        }
        if !is_valid_identifier(table) {
            return Err(ValidationError::InvalidTable(table.to_string()));
        }

        let schema = self
            .catalog
            .resolve(table, category)
            .ok_or_else(|| ValidationError::UnknownSchema {
                table: table.to_string(),
                category,
            })?;

        for (index, row) in rows.iter().enumerate() {
            let missing = schema.missing_columns(row);
            if !missing.is_empty() {
                return Err(ValidationError::MissingColumns { index, missing });
            }
            if row.timestamp(&schema.timestamp_column).is_none() {
                return Err(ValidationError::InvalidTimestamp {
                    index,
                    column: schema.timestamp_column.clone(),
                });
            }
        }

        Ok(())
    }

    /// Open a unit of work, run the pivot in it and commit. Any failure,
    /// including a panic in the pivot, comes back as its message.
    fn run_pivot<F>(&self, pivot: F) -> Result<(), String>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<(), PivotError>,
    {
        let mut unit = self
            .units
            .begin()
            .map_err(|e| format!("could not open relational unit of work: {}", e))?;

        match catch_unwind(AssertUnwindSafe(|| pivot(&mut *unit))) {
            Ok(Ok(())) => unit.commit().map_err(|e| format!("commit failed: {}", e)),
            Ok(Err(e)) => {
                rollback_quietly(unit.as_mut());
                Err(e.to_string())
            }
            Err(panic) => {
                rollback_quietly(unit.as_mut());
                Err(format!("pivot panicked: {}", panic_message(panic.as_ref())))
            }
        }
    }

    fn write_audit(&self, record: NewAuditRecord) {
        if let Err(e) = self.audit.record(&record) {
            warn!("Failed to write audit record for {}: {}", record.transaction_id, e);
        }
    }
}

fn rollback_quietly(unit: &mut dyn UnitOfWork) {
    if let Err(e) = unit.rollback() {
        warn!("Relational rollback failed: {}", e);
    }
}
