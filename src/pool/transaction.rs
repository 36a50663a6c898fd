use diesel::r2d2::ManageConnection;
use std::fmt::Display;
use tracing::warn;

use super::connection_pool::{ConnectionPool, PooledConnection};
use super::errors::PoolError;

/// A connection that can open, commit and roll back a transaction
pub trait TransactionalConnection {
    type Error: Display;

    fn begin(&mut self) -> Result<(), Self::Error>;
    fn commit(&mut self) -> Result<(), Self::Error>;
    fn rollback(&mut self) -> Result<(), Self::Error>;
}

/// Rolls back on drop unless the transaction was finished explicitly
struct TransactionGuard<'a, M>
where
    M: ManageConnection,
    M::Connection: TransactionalConnection,
{
    conn: &'a mut PooledConnection<M>,
    finished: bool,
}

impl<'a, M> TransactionGuard<'a, M>
where
    M: ManageConnection,
    M::Connection: TransactionalConnection,
{
    fn connection(&mut self) -> &mut M::Connection {
        &mut **self.conn
    }

    fn commit(&mut self) -> Result<(), PoolError> {
        self.finished = true;
        if let Err(e) = self.conn.commit() {
            let message = format!("commit failed: {}", e);
            self.rollback_quietly();
            return Err(PoolError::Query(message));
        }
        Ok(())
    }

    fn rollback(&mut self) {
        self.finished = true;
        self.rollback_quietly();
    }

    /// A connection whose rollback fails is in an unknown state and must not be reused
    fn rollback_quietly(&mut self) {
        if let Err(e) = self.conn.rollback() {
            warn!("Rollback failed on connection {}: {}", self.conn.id(), e);
            self.conn.invalidate();
        }
    }
}

impl<'a, M> Drop for TransactionGuard<'a, M>
where
    M: ManageConnection,
    M::Connection: TransactionalConnection,
{
    fn drop(&mut self) {
        if !self.finished {
            warn!("Transaction abandoned on connection {}, rolling back", self.conn.id());
            self.rollback_quietly();
        }
    }
}

impl<M: ManageConnection> ConnectionPool<M> {
    /// Borrow a connection for one operation; the operation's error becomes `PoolError::Query`
    pub fn execute_query<T, E, F>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(&mut M::Connection) -> Result<T, E>,
        E: Display,
    {
        let mut conn = self.acquire()?;
        f(&mut conn).map_err(|e| PoolError::Query(e.to_string()))
    }

    /// Run `f` inside a transaction on a borrowed connection
    ///
    /// Commits on `Ok`, rolls back on `Err` or panic. The connection goes
    /// back to the pool either way.
    pub fn execute_transaction<T, E, F>(&self, f: F) -> Result<T, PoolError>
    where
        M::Connection: TransactionalConnection,
        F: FnOnce(&mut M::Connection) -> Result<T, E>,
        E: Display,
    {
        let mut conn = self.acquire()?;
        if let Err(e) = conn.begin() {
            conn.invalidate();
            return Err(PoolError::Query(format!("begin failed: {}", e)));
        }

        let mut guard = TransactionGuard {
            conn: &mut conn,
            finished: false,
        };

        match f(guard.connection()) {
            Ok(value) => {
                guard.commit()?;
                Ok(value)
            }
            Err(e) => {
                guard.rollback();
                Err(PoolError::Query(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::mock::{test_config, MockManager};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn test_execute_query_maps_errors() {
        let pool = ConnectionPool::new(MockManager::default(), test_config()).unwrap();

        let ok: Result<u64, PoolError> = pool.execute_query(|conn| Ok::<_, String>(conn.id));
        assert!(ok.is_ok());

        let err = pool.execute_query(|_| Err::<(), _>("relation does not exist"));
        assert!(matches!(err, Err(PoolError::Query(msg)) if msg == "relation does not exist"));
        assert_eq!(pool.metrics().current_active, 0);
    }

    #[test]
    fn test_transaction_commits_on_success() {
        let pool = ConnectionPool::new(MockManager::default(), test_config()).unwrap();

        let value = pool
            .execute_transaction(|conn| {
                conn.record("insert");
                Ok::<_, String>(42)
            })
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(pool.manager().journal(), vec!["begin", "insert", "commit"]);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let pool = ConnectionPool::new(MockManager::default(), test_config()).unwrap();

        let result = pool.execute_transaction(|conn| {
            conn.record("insert");
            Err::<(), _>("constraint violation")
        });

        assert!(matches!(result, Err(PoolError::Query(_))));
        assert_eq!(pool.manager().journal(), vec!["begin", "insert", "rollback"]);
        assert_eq!(pool.metrics().idle_size, 2);
    }

    #[test]
    fn test_transaction_rolls_back_on_panic() {
        let pool = ConnectionPool::new(MockManager::default(), test_config()).unwrap();

        let result = catch_unwind(AssertUnwindSafe(|| {
            pool.execute_transaction(|conn| -> Result<(), String> {
                conn.record("insert");
                panic!("handler bug");
            })
        }));

        assert!(result.is_err());
        assert_eq!(pool.manager().journal(), vec!["begin", "insert", "rollback"]);

        let metrics = pool.metrics();
        assert_eq!(metrics.current_active, 0);
        assert_eq!(metrics.idle_size, 2);
    }

    #[test]
    fn test_failed_rollback_invalidates_connection() {
        let pool = ConnectionPool::new(MockManager::default(), test_config()).unwrap();
        pool.manager().fail_rollbacks(true);

        let result = pool.execute_transaction(|_| Err::<(), _>("boom"));
        assert!(result.is_err());

        let metrics = pool.metrics();
        assert_eq!(metrics.idle_size, 1);
        assert_eq!(metrics.total_closed, 1);
    }
}
