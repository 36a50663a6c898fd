use diesel::RunQueryDsl;
use tracing::warn;

use super::connection::PgPooledConnection;
use super::sql::{bind_all, insert_statement, upsert_statement};
use crate::pool::TransactionalConnection;
use crate::storage::{Row, StoreError, UnitOfWork, Value};

/// Relational transaction pinned to one pooled connection
///
/// The connection goes back to the pool when the unit of work is dropped. An
/// unfinished unit of work is rolled back first; if that rollback fails the
/// connection is discarded instead of reused.
pub struct PgUnitOfWork {
    conn: PgPooledConnection,
    finished: bool,
}

impl PgUnitOfWork {
    /// Open a transaction on `conn`
    pub fn begin(mut conn: PgPooledConnection) -> Result<Self, StoreError> {
        if let Err(e) = conn.begin() {
            conn.invalidate();
            return Err(StoreError::Diesel(e));
        }
        Ok(Self { conn, finished: false })
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.finished {
            return Err(StoreError::Query("unit of work already finished".to_string()));
        }
        Ok(())
    }

    fn rollback_quietly(&mut self) {
        if let Err(e) = self.conn.rollback() {
            warn!("Rollback failed on connection {}: {}", self.conn.id(), e);
            self.conn.invalidate();
        }
    }
}

impl UnitOfWork for PgUnitOfWork {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, StoreError> {
        self.ensure_open()?;
        Ok(bind_all(sql, params).execute(&mut *self.conn)?)
    }

    fn insert(&mut self, table: &str, rows: &[Row]) -> Result<usize, StoreError> {
        self.ensure_open()?;
        if rows.is_empty() {
            return Ok(0);
        }
        let statement = insert_statement(table, rows)?;
        Ok(statement.into_query().execute(&mut *self.conn)?)
    }

    fn upsert(&mut self, table: &str, key_columns: &[&str], row: &Row) -> Result<usize, StoreError> {
        self.ensure_open()?;
        let statement = upsert_statement(table, key_columns, std::slice::from_ref(row))?;
        Ok(statement.into_query().execute(&mut *self.conn)?)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.finished = true;
        if let Err(e) = self.conn.commit() {
            self.rollback_quietly();
            return Err(StoreError::Diesel(e));
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if let Err(e) = self.conn.rollback() {
            self.conn.invalidate();
            return Err(StoreError::Diesel(e));
        }
        Ok(())
    }
}

impl Drop for PgUnitOfWork {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Unit of work abandoned on connection {}, rolling back", self.conn.id());
            self.rollback_quietly();
        }
    }
}
