//! In-process connection manager for pool tests

use diesel::r2d2::ManageConnection;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::config::PoolConfig;
use super::transaction::TransactionalConnection;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MockError(pub String);

pub struct MockConnection {
    pub id: u64,
    healthy: Arc<AtomicBool>,
    journal: Arc<Mutex<Vec<String>>>,
    fail_rollbacks: Arc<AtomicBool>,
}

impl MockConnection {
    pub fn record(&mut self, entry: &str) {
        self.journal.lock().push(entry.to_string());
    }
}

impl TransactionalConnection for MockConnection {
    type Error = MockError;

    fn begin(&mut self) -> Result<(), MockError> {
        self.record("begin");
        Ok(())
    }

    fn commit(&mut self) -> Result<(), MockError> {
        self.record("commit");
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), MockError> {
        if self.fail_rollbacks.load(Ordering::SeqCst) {
            return Err(MockError("rollback failed".to_string()));
        }
        self.record("rollback");
        Ok(())
    }
}

#[derive(Default)]
pub struct MockManager {
    connect_calls: AtomicUsize,
    created: AtomicUsize,
    fail_next: AtomicUsize,
    fail_all: AtomicBool,
    fail_rollbacks: Arc<AtomicBool>,
    health_flags: Mutex<Vec<Arc<AtomicBool>>>,
    journal: Arc<Mutex<Vec<String>>>,
}

impl MockManager {
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn fail_rollbacks(&self, fail: bool) {
        self.fail_rollbacks.store(fail, Ordering::SeqCst);
    }

    /// Make every connection opened so far fail its liveness probe
    pub fn break_existing(&self) {
        for flag in self.health_flags.lock().iter() {
            flag.store(false, Ordering::SeqCst);
        }
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }
}

impl ManageConnection for MockManager {
    type Connection = MockConnection;
    type Error = MockError;

    fn connect(&self) -> Result<MockConnection, MockError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_all.load(Ordering::SeqCst) {
            return Err(MockError("connection refused".to_string()));
        }
        let pending_failure = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if pending_failure {
            return Err(MockError("connection refused".to_string()));
        }

        let healthy = Arc::new(AtomicBool::new(true));
        self.health_flags.lock().push(Arc::clone(&healthy));

        Ok(MockConnection {
            id: self.created.fetch_add(1, Ordering::SeqCst) as u64 + 1,
            healthy,
            journal: Arc::clone(&self.journal),
            fail_rollbacks: Arc::clone(&self.fail_rollbacks),
        })
    }

    fn is_valid(&self, conn: &mut MockConnection) -> Result<(), MockError> {
        if conn.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MockError("server closed the connection".to_string()))
        }
    }

    fn has_broken(&self, _conn: &mut MockConnection) -> bool {
        false
    }
}

/// Small pool with fast retries and no background loops
pub fn test_config() -> PoolConfig {
    PoolConfig {
        min_connections: 2,
        max_connections: 5,
        retry_attempts: 3,
        retry_delay: Duration::from_millis(10),
        connection_timeout: Duration::from_secs(2),
        enable_health_check: false,
        shutdown_join_timeout: Duration::from_secs(1),
        ..PoolConfig::default()
    }
}
