use diesel::r2d2::ManageConnection;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::config::PoolConfig;
use super::errors::PoolError;
use super::maintenance::{MaintenanceWorker, StopSignal};
use super::metrics::{PoolMetrics, PoolStatus};

/// Bookkeeping carried by every pooled connection
#[derive(Debug, Clone)]
pub(crate) struct ConnectionMeta {
    pub(crate) id: u64,
    pub(crate) created_at: Instant,
    pub(crate) last_used_at: Instant,
    pub(crate) use_count: u64,
    /// Cleared by `invalidate`, the health check and shutdown
    pub(crate) valid: Arc<AtomicBool>,
}

impl ConnectionMeta {
    pub(crate) fn is_expired(&self, max_lifetime: Duration) -> bool {
        self.created_at.elapsed() >= max_lifetime
    }
}

pub(crate) struct IdleConnection<C> {
    pub(crate) conn: C,
    pub(crate) meta: ConnectionMeta,
}

/// The pool only tracks borrowed connections; the connection itself lives in the guard
pub(crate) struct ActiveConnection {
    pub(crate) created_at: Instant,
    pub(crate) valid: Arc<AtomicBool>,
}

pub(crate) struct PoolState<C> {
    pub(crate) idle: VecDeque<IdleConnection<C>>,
    pub(crate) active: HashMap<u64, ActiveConnection>,
    /// Connections being created or probed outside the lock. Counted against
    /// `max_connections` so concurrent acquirers never overshoot it.
    pub(crate) pending: usize,
    pub(crate) metrics: PoolMetrics,
}

impl<C> PoolState<C> {
    pub(crate) fn total(&self) -> usize {
        self.idle.len() + self.active.len() + self.pending
    }
}

/// State shared between the pool handle, its guards and the maintenance threads
pub(crate) struct SharedPool<M: ManageConnection> {
    pub(crate) manager: M,
    pub(crate) config: PoolConfig,
    pub(crate) state: Mutex<PoolState<M::Connection>>,
    /// Signalled whenever a connection is returned or capacity frees up
    pub(crate) available: Condvar,
    pub(crate) shutdown: AtomicBool,
    pub(crate) stop: StopSignal,
    next_id: AtomicU64,
}

impl<M: ManageConnection> SharedPool<M> {
    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub(crate) fn new_meta(&self) -> ConnectionMeta {
        let now = Instant::now();
        ConnectionMeta {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            created_at: now,
            last_used_at: now,
            use_count: 0,
            valid: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Liveness probe (`SELECT 1` for Postgres)
    pub(crate) fn probe(&self, conn: &mut M::Connection) -> bool {
        self.manager.is_valid(conn).is_ok() && !self.manager.has_broken(conn)
    }

    /// Open a connection, retrying with exponential backoff until `deadline`
    pub(crate) fn create_with_retry(&self, deadline: Instant) -> Result<M::Connection, PoolError> {
        let started = Instant::now();
        let attempts = self.config.retry_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match self.manager.connect() {
                Ok(conn) => {
                    if attempt > 0 {
                        info!("Connection established after {} retries", attempt);
                    }
                    return Ok(conn);
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!("Connection attempt {}/{} failed: {}", attempt + 1, attempts, e);
                }
            }

            if attempt + 1 == attempts {
                break;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(self.config.backoff_delay(attempt).min(remaining));
        }

        Err(PoolError::Timeout {
            waited_ms: started.elapsed().as_millis() as u64,
            reason: format!("could not create a connection: {}", last_error),
        })
    }

    /// Return a borrowed connection. Broken, invalidated or expired
    /// connections are closed instead of re-queued.
    fn release(&self, mut conn: M::Connection, mut meta: ConnectionMeta) {
        let broken = self.manager.has_broken(&mut conn);
        let expired = meta.is_expired(self.config.max_lifetime);
        let invalidated = !meta.valid.load(Ordering::SeqCst);

        let discarded = {
            let mut state = self.state.lock();
            state.active.remove(&meta.id);
            let active = state.active.len();
            state.metrics.set_active(active);

            let keep = !broken
                && !expired
                && !invalidated
                && !self.is_shutdown()
                && state.idle.len() < self.config.max_connections as usize;

            if keep {
                meta.last_used_at = Instant::now();
                state.idle.push_back(IdleConnection { conn, meta });
                None
            } else {
                state.metrics.total_closed += 1;
                Some((conn, meta.id))
            }
        };

        if let Some((conn, id)) = discarded {
            debug!(
                "Closing connection {} (broken={}, expired={}, invalidated={})",
                id, broken, expired, invalidated
            );
            drop(conn);
        }

        self.available.notify_one();
    }
}

/// A bounded, self-healing connection pool
///
/// Generic over diesel's `ManageConnection`; production uses
/// `ConnectionManager<PgConnection>`. Connections are handed out as RAII guards
/// that return themselves on drop.
pub struct ConnectionPool<M: ManageConnection> {
    pub(crate) shared: Arc<SharedPool<M>>,
    workers: Mutex<Vec<MaintenanceWorker>>,
}

impl<M: ManageConnection> ConnectionPool<M> {
    /// Build the pool, open `min_connections` connections and start the
    /// maintenance loops. Fails fast if the initial connections cannot be made.
    pub fn new(manager: M, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let shared = Arc::new(SharedPool {
            manager,
            config,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                active: HashMap::new(),
                pending: 0,
                metrics: PoolMetrics::default(),
            }),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
            stop: StopSignal::new(),
            next_id: AtomicU64::new(1),
        });

        for _ in 0..shared.config.min_connections {
            let deadline = Instant::now() + shared.config.connection_timeout;
            let conn = shared.create_with_retry(deadline).map_err(|e| {
                PoolError::Connection(format!("failed to open initial connections: {}", e))
            })?;
            let meta = shared.new_meta();

            let mut state = shared.state.lock();
            state.metrics.total_created += 1;
            state.idle.push_back(IdleConnection { conn, meta });
        }

        let mut workers = Vec::new();
        if shared.config.enable_health_check {
            workers.push(MaintenanceWorker::spawn(
                "pool-health-check",
                Arc::clone(&shared),
                shared.config.health_check_interval,
                |pool| {
                    pool.run_health_check();
                },
            )?);
            workers.push(MaintenanceWorker::spawn(
                "pool-cleanup",
                Arc::clone(&shared),
                shared.config.cleanup_interval,
                |pool| {
                    pool.run_cleanup();
                },
            )?);
        }

        info!(
            "✅ Connection pool ready (min={}, max={}, maintenance={})",
            shared.config.min_connections, shared.config.max_connections, shared.config.enable_health_check
        );

        Ok(Self {
            shared,
            workers: Mutex::new(workers),
        })
    }

    /// Borrow a connection, waiting up to `connection_timeout`
    pub fn acquire(&self) -> Result<PooledConnection<M>, PoolError> {
        self.acquire_timeout(self.shared.config.connection_timeout)
    }

    /// Borrow a connection, waiting up to `timeout`
    ///
    /// Reuses the most recently returned idle connection after a liveness
    /// probe, opens a new one while below `max_connections`, otherwise waits
    /// for a release.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<PooledConnection<M>, PoolError> {
        let shared = &self.shared;
        let started = Instant::now();
        let deadline = started + timeout;
        let max = shared.config.max_connections as usize;

        let mut state = shared.state.lock();
        state.metrics.total_requests += 1;

        loop {
            if shared.is_shutdown() {
                state.metrics.failed_requests += 1;
                return Err(PoolError::Closed);
            }

            if let Some(IdleConnection { mut conn, meta }) = state.idle.pop_back() {
                state.pending += 1;
                let alive = MutexGuard::unlocked(&mut state, || shared.probe(&mut conn));
                state.pending -= 1;

                if alive && !meta.is_expired(shared.config.max_lifetime) {
                    return Ok(Self::activate(shared, &mut state, conn, meta, started));
                }

                state.metrics.total_closed += 1;
                warn!("Discarding unhealthy idle connection {}", meta.id);
                MutexGuard::unlocked(&mut state, || drop(conn));
                continue;
            }

            if state.total() < max {
                state.pending += 1;
                let created = MutexGuard::unlocked(&mut state, || shared.create_with_retry(deadline));
                state.pending -= 1;

                return match created {
                    Ok(conn) => {
                        state.metrics.total_created += 1;
                        let meta = shared.new_meta();
                        debug!("Opened connection {}", meta.id);
                        Ok(Self::activate(shared, &mut state, conn, meta, started))
                    }
                    Err(e) => {
                        state.metrics.failed_requests += 1;
                        shared.available.notify_one();
                        Err(e)
                    }
                };
            }

            let timed_out = shared.available.wait_until(&mut state, deadline).timed_out();
            if timed_out && state.idle.is_empty() && state.total() >= max {
                state.metrics.failed_requests += 1;
                return Err(PoolError::Timeout {
                    waited_ms: started.elapsed().as_millis() as u64,
                    reason: format!("all {} connections are in use", max),
                });
            }
        }
    }

    fn activate(
        shared: &Arc<SharedPool<M>>,
        state: &mut PoolState<M::Connection>,
        conn: M::Connection,
        mut meta: ConnectionMeta,
        started: Instant,
    ) -> PooledConnection<M> {
        meta.last_used_at = Instant::now();
        meta.use_count += 1;

        state.active.insert(
            meta.id,
            ActiveConnection {
                created_at: meta.created_at,
                valid: Arc::clone(&meta.valid),
            },
        );
        let active = state.active.len();
        state.metrics.set_active(active);
        state.metrics.record_wait(started.elapsed());

        PooledConnection {
            pool: Arc::clone(shared),
            conn: Some(conn),
            meta,
        }
    }

    /// Stop the maintenance loops and close every connection. Idempotent;
    /// later acquires fail with `PoolError::Closed`.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Shutting down connection pool");
        self.shared.stop.stop();

        let workers: Vec<MaintenanceWorker> = self.workers.lock().drain(..).collect();
        for worker in workers {
            worker.join(self.shared.config.shutdown_join_timeout);
        }

        let (idle, active) = {
            let mut state = self.shared.state.lock();
            let idle: Vec<_> = state.idle.drain(..).collect();
            state.metrics.total_closed += idle.len() as u64;
            for entry in state.active.values() {
                entry.valid.store(false, Ordering::SeqCst);
            }
            (idle, state.active.len())
        };

        let closed = idle.len();
        drop(idle);
        self.shared.available.notify_all();

        info!(
            "Connection pool shut down ({} idle closed, {} active will close on release)",
            closed, active
        );
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }

    pub fn metrics(&self) -> PoolMetrics {
        let state = self.shared.state.lock();
        let mut metrics = state.metrics.clone();
        metrics.idle_size = state.idle.len();
        metrics.current_active = state.active.len();
        metrics
    }

    pub fn status(&self) -> PoolStatus {
        let metrics = self.metrics();
        let pending = self.shared.state.lock().pending;

        PoolStatus {
            idle: metrics.idle_size,
            active: metrics.current_active,
            pending,
            min_connections: self.shared.config.min_connections,
            max_connections: self.shared.config.max_connections,
            is_shutdown: self.is_shutdown(),
            metrics,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    pub fn manager(&self) -> &M {
        &self.shared.manager
    }
}

impl<M: ManageConnection> Drop for ConnectionPool<M> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<M: ManageConnection> fmt::Debug for ConnectionPool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.shared.config)
            .field("status", &self.status())
            .finish()
    }
}

/// A borrowed connection, returned to the pool on drop
pub struct PooledConnection<M: ManageConnection> {
    pool: Arc<SharedPool<M>>,
    /// `None` only once the connection has gone back to the pool
    conn: Option<M::Connection>,
    meta: ConnectionMeta,
}

impl<M: ManageConnection> PooledConnection<M> {
    pub fn id(&self) -> u64 {
        self.meta.id
    }

    pub fn use_count(&self) -> u64 {
        self.meta.use_count
    }

    pub fn age(&self) -> Duration {
        self.meta.created_at.elapsed()
    }

    /// Close this connection on release instead of returning it to the idle queue
    pub fn invalidate(&self) {
        self.meta.valid.store(false, Ordering::SeqCst);
    }

    pub fn is_valid(&self) -> bool {
        self.meta.valid.load(Ordering::SeqCst)
    }
}

impl<M: ManageConnection> Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("connection already released"),
        }
    }
}

impl<M: ManageConnection> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.conn {
            Some(conn) => conn,
            None => unreachable!("connection already released"),
        }
    }
}

impl<M: ManageConnection> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.meta.clone());
        }
    }
}

impl<M: ManageConnection> fmt::Debug for PooledConnection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.meta.id)
            .field("use_count", &self.meta.use_count)
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::mock::{test_config, MockManager};
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn pool_with(config: PoolConfig) -> ConnectionPool<MockManager> {
        ConnectionPool::new(MockManager::default(), config).unwrap()
    }

    #[test]
    fn test_new_opens_min_connections() {
        let pool = pool_with(test_config());
        let metrics = pool.metrics();

        assert_eq!(metrics.idle_size, 2);
        assert_eq!(metrics.total_created, 2);
        assert_eq!(metrics.current_active, 0);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = PoolConfig {
            min_connections: 10,
            max_connections: 2,
            ..test_config()
        };
        let result = ConnectionPool::new(MockManager::default(), config);
        assert!(matches!(result, Err(PoolError::Configuration(_))));
    }

    #[test]
    fn test_new_fails_fast_when_database_unreachable() {
        let manager = MockManager::default();
        manager.fail_all(true);

        let result = ConnectionPool::new(manager, test_config());
        assert!(matches!(result, Err(PoolError::Connection(_))));
    }

    #[test]
    fn test_acquire_and_release_reuses_connection() {
        let pool = pool_with(test_config());

        let first_id = {
            let conn = pool.acquire().unwrap();
            assert_eq!(pool.metrics().current_active, 1);
            conn.id()
        };

        let metrics = pool.metrics();
        assert_eq!(metrics.current_active, 0);
        assert_eq!(metrics.idle_size, 2);

        // most recently returned connection comes back first
        let conn = pool.acquire().unwrap();
        assert_eq!(conn.id(), first_id);
        assert_eq!(conn.use_count(), 2);
        assert_eq!(pool.metrics().total_created, 2);
    }

    #[test]
    fn test_acquire_beyond_max_times_out() {
        let config = PoolConfig {
            min_connections: 0,
            max_connections: 2,
            ..test_config()
        };
        let pool = pool_with(config);

        let _a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();

        let started = Instant::now();
        let result = pool.acquire_timeout(Duration::from_millis(100));

        assert!(matches!(result, Err(PoolError::Timeout { .. })));
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(pool.metrics().failed_requests, 1);
        assert_eq!(pool.metrics().total_created, 2);
    }

    #[test]
    fn test_acquire_uses_connection_timeout() {
        let config = PoolConfig {
            min_connections: 0,
            max_connections: 2,
            connection_timeout: Duration::from_millis(100),
            ..test_config()
        };
        let pool = pool_with(config);

        let _a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();

        let started = Instant::now();
        let result = pool.acquire();

        assert!(matches!(result, Err(PoolError::Timeout { .. })));
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(100));
        assert!(waited < Duration::from_secs(2));
        assert_eq!(pool.metrics().failed_requests, 1);
    }

    #[test]
    fn test_connection_outliving_pool_handle_is_closed() {
        let pool = pool_with(test_config());
        let mut held = pool.acquire().unwrap();
        held.record("still usable");
        drop(pool);

        assert!(!held.is_valid());
        drop(held);
    }

    #[test]
    fn test_waiter_unblocked_by_release() {
        let config = PoolConfig {
            min_connections: 0,
            max_connections: 1,
            ..test_config()
        };
        let pool = Arc::new(pool_with(config));

        let held = pool.acquire().unwrap();
        let held_id = held.id();

        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.acquire_timeout(Duration::from_secs(5)).map(|c| c.id()))
        };

        thread::sleep(Duration::from_millis(50));
        drop(held);

        let id = waiter.join().unwrap().unwrap();
        assert_eq!(id, held_id);
        assert_eq!(pool.metrics().total_created, 1);
    }

    #[test]
    fn test_concurrent_acquires_never_exceed_max() {
        let config = PoolConfig {
            min_connections: 1,
            max_connections: 4,
            ..test_config()
        };
        let pool = Arc::new(pool_with(config));
        let in_use = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let in_use = Arc::clone(&in_use);
                let high_water = Arc::clone(&high_water);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let _conn = pool.acquire_timeout(Duration::from_secs(10)).unwrap();
                        let now = in_use.fetch_add(1, Ordering::SeqCst) + 1;
                        high_water.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(1));
                        in_use.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let metrics = pool.metrics();
        assert!(high_water.load(Ordering::SeqCst) <= 4);
        assert!(metrics.peak_active <= 4);
        assert!(metrics.total_created <= 4);
        assert_eq!(metrics.total_requests, 160);
        assert_eq!(metrics.failed_requests, 0);
        assert_eq!(metrics.current_active, 0);
    }

    #[test]
    fn test_create_retries_with_backoff() {
        let config = PoolConfig {
            min_connections: 0,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(20),
            ..test_config()
        };
        let pool = pool_with(config);
        pool.manager().fail_next(2);

        let started = Instant::now();
        let conn = pool.acquire().unwrap();

        // 20ms + 40ms of backoff before the third attempt succeeds
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(pool.manager().connect_calls(), 3);
        assert!(conn.is_valid());
    }

    #[test]
    fn test_create_gives_up_after_retry_attempts() {
        let config = PoolConfig {
            min_connections: 0,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(5),
            ..test_config()
        };
        let pool = pool_with(config);
        pool.manager().fail_all(true);

        let result = pool.acquire();
        assert!(matches!(result, Err(PoolError::Timeout { .. })));
        assert_eq!(pool.manager().connect_calls(), 3);

        let metrics = pool.metrics();
        assert_eq!(metrics.failed_requests, 1);
        assert_eq!(metrics.total_created, 0);
        assert_eq!(pool.status().pending, 0);
    }

    #[test]
    fn test_unhealthy_idle_connection_replaced() {
        let config = PoolConfig {
            min_connections: 1,
            ..test_config()
        };
        let pool = pool_with(config);
        pool.manager().break_existing();

        let conn = pool.acquire().unwrap();
        assert_eq!(conn.id(), 2);

        let metrics = pool.metrics();
        assert_eq!(metrics.total_created, 2);
        assert_eq!(metrics.total_closed, 1);
    }

    #[test]
    fn test_invalidated_connection_closed_on_release() {
        let pool = pool_with(test_config());

        let conn = pool.acquire().unwrap();
        conn.invalidate();
        drop(conn);

        let metrics = pool.metrics();
        assert_eq!(metrics.idle_size, 1);
        assert_eq!(metrics.total_closed, 1);
    }

    #[test]
    fn test_expired_connection_closed_on_release() {
        let config = PoolConfig {
            min_connections: 0,
            max_lifetime: Duration::from_millis(20),
            ..test_config()
        };
        let pool = pool_with(config);

        let conn = pool.acquire().unwrap();
        thread::sleep(Duration::from_millis(30));
        drop(conn);

        assert_eq!(pool.metrics().idle_size, 0);
        assert_eq!(pool.metrics().total_closed, 1);
    }

    #[test]
    fn test_shutdown_is_idempotent_and_rejects_acquire() {
        let pool = pool_with(test_config());
        let held = pool.acquire().unwrap();

        pool.shutdown();
        pool.shutdown();

        assert!(pool.is_shutdown());
        assert!(matches!(pool.acquire(), Err(PoolError::Closed)));
        assert!(!held.is_valid());

        drop(held);
        let metrics = pool.metrics();
        assert_eq!(metrics.idle_size, 0);
        assert_eq!(metrics.current_active, 0);
        assert_eq!(metrics.total_closed, 2);
    }

    #[test]
    fn test_shutdown_wakes_waiters() {
        let config = PoolConfig {
            min_connections: 0,
            max_connections: 1,
            ..test_config()
        };
        let pool = Arc::new(pool_with(config));
        let _held = pool.acquire().unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.acquire_timeout(Duration::from_secs(10)).map(|c| c.id()))
        };

        thread::sleep(Duration::from_millis(50));
        pool.shutdown();

        assert!(matches!(waiter.join().unwrap(), Err(PoolError::Closed)));
    }

    #[test]
    fn test_wait_time_average_recorded() {
        let config = PoolConfig {
            min_connections: 0,
            max_connections: 1,
            ..test_config()
        };
        let pool = Arc::new(pool_with(config));
        let held = pool.acquire().unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let _conn = pool.acquire_timeout(Duration::from_secs(5)).unwrap();
            })
        };

        thread::sleep(Duration::from_millis(100));
        drop(held);
        waiter.join().unwrap();

        // one fast sample plus one ~100ms sample smoothed at 0.1
        let avg = pool.metrics().avg_wait_time_ms;
        assert!(avg >= 9.0, "avg_wait_time_ms = {}", avg);
        assert!(avg < 100.0, "avg_wait_time_ms = {}", avg);
    }

    #[test]
    fn test_status_reports_bounds() {
        let pool = pool_with(test_config());
        let _conn = pool.acquire().unwrap();

        let status = pool.status();
        assert_eq!(status.idle, 1);
        assert_eq!(status.active, 1);
        assert_eq!(status.max_connections, 5);
        assert!(!status.is_shutdown);
    }
}
