use diesel::prelude::*;
use std::sync::Arc;

use crate::database::connection::PgPooledConnection;
use crate::database::models::{AuditRecord, FinalStatus, NewAuditRecord};
use crate::database::schema::transaction_log;
use crate::pool::PoolError;
use crate::storage::{AuditTrail, StoreError};

/// Append-only saga audit trail on `transaction_log`
pub struct AuditRepositoryImpl {
    get_conn: Arc<dyn Fn() -> Result<PgPooledConnection, PoolError> + Send + Sync>,
}

impl AuditRepositoryImpl {
    /// Create new audit repository with connection provider
    pub fn new<F>(get_conn: F) -> Self
    where
        F: Fn() -> Result<PgPooledConnection, PoolError> + Send + Sync + 'static,
    {
        Self {
            get_conn: Arc::new(get_conn),
        }
    }

    /// The audit row of one attempt
    pub fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<AuditRecord>, StoreError> {
        let mut conn = (self.get_conn)()?;

        Ok(transaction_log::table
            .filter(transaction_log::transaction_id.eq(transaction_id))
            .select(AuditRecord::as_select())
            .first(&mut *conn)
            .optional()?)
    }

    /// Every attempt for a business key, newest first
    pub fn find_by_business_id(&self, business_id: &str) -> Result<Vec<AuditRecord>, StoreError> {
        let mut conn = (self.get_conn)()?;

        Ok(transaction_log::table
            .filter(transaction_log::business_id.eq(business_id))
            .order((transaction_log::created_at.desc(), transaction_log::id.desc()))
            .select(AuditRecord::as_select())
            .load(&mut *conn)?)
    }

    /// Attempts that ended with the given final status, newest first
    pub fn find_by_final_status(&self, final_status: FinalStatus, limit: i64) -> Result<Vec<AuditRecord>, StoreError> {
        let mut conn = (self.get_conn)()?;

        Ok(transaction_log::table
            .filter(transaction_log::final_status.eq(final_status.as_str()))
            .order(transaction_log::id.desc())
            .limit(limit)
            .select(AuditRecord::as_select())
            .load(&mut *conn)?)
    }
}

impl AuditTrail for AuditRepositoryImpl {
    fn record(&self, record: &NewAuditRecord) -> Result<(), StoreError> {
        let mut conn = (self.get_conn)()?;

        diesel::insert_into(transaction_log::table)
            .values(record)
            .execute(&mut *conn)?;

        Ok(())
    }
}
