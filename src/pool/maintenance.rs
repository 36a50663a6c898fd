use chrono::Utc;
use diesel::r2d2::ManageConnection;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::connection_pool::{ConnectionPool, IdleConnection, SharedPool};
use super::errors::PoolError;

/// Outcome of one maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    /// Idle connections probed
    pub probed: usize,
    /// Connections closed (failed probe, expired or idle too long)
    pub closed: usize,
    /// Connections opened to top the idle queue back up
    pub created: usize,
    /// Borrowed connections marked for closing on release
    pub flagged: usize,
}

/// Wakes the maintenance loops early on shutdown
pub(crate) struct StopSignal {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            cvar: Condvar::new(),
        }
    }

    pub(crate) fn stop(&self) {
        *self.stopped.lock() = true;
        self.cvar.notify_all();
    }

    /// Sleep for `timeout` or until stopped. Returns true once stopped.
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.cvar.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

/// A named maintenance thread with a bounded join
pub(crate) struct MaintenanceWorker {
    name: &'static str,
    handle: JoinHandle<()>,
    done: mpsc::Receiver<()>,
}

impl MaintenanceWorker {
    pub(crate) fn spawn<M: ManageConnection>(
        name: &'static str,
        shared: Arc<SharedPool<M>>,
        interval: Duration,
        task: fn(&SharedPool<M>),
    ) -> Result<Self, PoolError> {
        let (done_tx, done) = mpsc::channel();

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!("{} loop started (every {:?})", name, interval);
                while !shared.stop.wait(interval) {
                    task(&shared);
                }
                debug!("{} loop stopped", name);
                let _ = done_tx.send(());
            })
            .map_err(|e| PoolError::Configuration(format!("failed to spawn {} thread: {}", name, e)))?;

        Ok(Self { name, handle, done })
    }

    /// Wait up to `timeout` for the loop to exit; a stuck loop is detached
    pub(crate) fn join(self, timeout: Duration) {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    warn!("{} thread panicked", self.name);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("{} thread did not stop within {:?}, detaching", self.name, timeout);
            }
        }
    }
}

impl<M: ManageConnection> SharedPool<M> {
    /// Probe every idle connection and flag borrowed ones past `max_lifetime`
    ///
    /// Borrowed connections belong to their callers, so they are never probed
    /// here; flagged ones are closed when released.
    pub(crate) fn run_health_check(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        let batch: Vec<IdleConnection<M::Connection>> = {
            let mut state = self.state.lock();
            let batch: Vec<_> = state.idle.drain(..).collect();
            state.pending += batch.len();

            for entry in state.active.values() {
                if entry.created_at.elapsed() >= self.config.max_lifetime
                    && entry.valid.swap(false, Ordering::SeqCst)
                {
                    report.flagged += 1;
                }
            }
            batch
        };

        report.probed = batch.len();
        let mut healthy = Vec::with_capacity(batch.len());
        let mut broken = Vec::new();
        for mut idle in batch {
            if self.probe(&mut idle.conn) {
                healthy.push(idle);
            } else {
                broken.push(idle);
            }
        }

        {
            let mut state = self.state.lock();
            state.pending -= report.probed;
            if self.is_shutdown() {
                broken.append(&mut healthy);
            } else {
                state.idle.extend(healthy);
            }
            state.metrics.total_closed += broken.len() as u64;
            state.metrics.last_health_check = Some(Utc::now());
        }

        report.closed = broken.len();
        drop(broken);
        self.available.notify_all();

        if report.closed > 0 || report.flagged > 0 {
            warn!(
                "Health check closed {} of {} idle connections, flagged {} expired active",
                report.closed, report.probed, report.flagged
            );
        } else {
            debug!("Health check passed ({} idle connections)", report.probed);
        }

        report
    }

    /// Close expired or long-idle connections, then top the idle queue back
    /// up to `min_connections`
    pub(crate) fn run_cleanup(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        let expired: VecDeque<IdleConnection<M::Connection>> = {
            let mut state = self.state.lock();
            let max_lifetime = self.config.max_lifetime;
            let max_idle_time = self.config.max_idle_time;
            let (keep, expired): (VecDeque<_>, VecDeque<_>) = state.idle.drain(..).partition(|idle| {
                !idle.meta.is_expired(max_lifetime) && idle.meta.last_used_at.elapsed() < max_idle_time
            });
            state.idle = keep;
            state.metrics.total_closed += expired.len() as u64;
            expired
        };
        report.closed = expired.len();
        drop(expired);

        let to_create = {
            let mut state = self.state.lock();
            if self.is_shutdown() {
                0
            } else {
                let deficit = (self.config.min_connections as usize).saturating_sub(state.idle.len());
                let room = (self.config.max_connections as usize).saturating_sub(state.total());
                let n = deficit.min(room);
                state.pending += n;
                n
            }
        };

        for _ in 0..to_create {
            match self.manager.connect() {
                Ok(conn) => {
                    let meta = self.new_meta();
                    let mut state = self.state.lock();
                    state.pending -= 1;
                    state.metrics.total_created += 1;
                    if self.is_shutdown() {
                        state.metrics.total_closed += 1;
                    } else {
                        state.idle.push_back(IdleConnection { conn, meta });
                        report.created += 1;
                    }
                    drop(state);
                    self.available.notify_one();
                }
                Err(e) => {
                    self.state.lock().pending -= 1;
                    warn!("Failed to replenish idle connection: {}", e);
                }
            }
        }

        if report.closed > 0 || report.created > 0 {
            info!(
                "🧹 Pool cleanup closed {} connections, opened {}",
                report.closed, report.created
            );
        }

        report
    }
}

impl<M: ManageConnection> ConnectionPool<M> {
    /// Run one health-check pass now
    pub fn run_health_check(&self) -> MaintenanceReport {
        self.shared.run_health_check()
    }

    /// Run one cleanup pass now
    pub fn run_cleanup(&self) -> MaintenanceReport {
        self.shared.run_cleanup()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::mock::{test_config, MockManager};
    use crate::pool::PoolConfig;
    use std::thread;

    #[test]
    fn test_health_check_discards_broken_idle() {
        let pool = ConnectionPool::new(MockManager::default(), test_config()).unwrap();
        pool.manager().break_existing();

        let report = pool.run_health_check();
        assert_eq!(report.probed, 2);
        assert_eq!(report.closed, 2);

        let metrics = pool.metrics();
        assert_eq!(metrics.idle_size, 0);
        assert_eq!(metrics.total_closed, 2);
        assert!(metrics.last_health_check.is_some());
    }

    #[test]
    fn test_health_check_flags_expired_active() {
        let config = PoolConfig {
            min_connections: 0,
            max_lifetime: Duration::from_millis(20),
            ..test_config()
        };
        let pool = ConnectionPool::new(MockManager::default(), config).unwrap();
        let conn = pool.acquire().unwrap();

        thread::sleep(Duration::from_millis(30));
        let report = pool.run_health_check();

        assert_eq!(report.flagged, 1);
        assert!(!conn.is_valid());
    }

    #[test]
    fn test_cleanup_closes_idle_and_replenishes() {
        let config = PoolConfig {
            min_connections: 2,
            max_idle_time: Duration::from_millis(20),
            ..test_config()
        };
        let pool = ConnectionPool::new(MockManager::default(), config).unwrap();

        thread::sleep(Duration::from_millis(30));
        let report = pool.run_cleanup();

        assert_eq!(report.closed, 2);
        assert_eq!(report.created, 2);

        let metrics = pool.metrics();
        assert_eq!(metrics.idle_size, 2);
        assert_eq!(metrics.total_created, 4);
    }

    #[test]
    fn test_pool_heals_after_database_outage() {
        let pool = ConnectionPool::new(MockManager::default(), test_config()).unwrap();

        // outage: existing connections die and nothing new can be opened
        pool.manager().break_existing();
        pool.manager().fail_all(true);
        pool.run_health_check();
        assert_eq!(pool.metrics().idle_size, 0);
        assert!(pool.acquire_timeout(Duration::from_millis(50)).is_err());

        // database back: cleanup restores the warm minimum
        pool.manager().fail_all(false);
        let report = pool.run_cleanup();
        assert_eq!(report.created, 2);
        assert_eq!(pool.metrics().idle_size, 2);
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn test_cleanup_respects_max_connections() {
        let config = PoolConfig {
            min_connections: 2,
            max_connections: 2,
            ..test_config()
        };
        let pool = ConnectionPool::new(MockManager::default(), config).unwrap();
        let _a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();

        let report = pool.run_cleanup();
        assert_eq!(report.created, 0);
        assert_eq!(pool.status().idle, 0);
    }

    #[test]
    fn test_background_loops_run_and_stop() {
        let config = PoolConfig {
            min_connections: 1,
            enable_health_check: true,
            health_check_interval: Duration::from_millis(20),
            cleanup_interval: Duration::from_millis(20),
            ..test_config()
        };
        let pool = ConnectionPool::new(MockManager::default(), config).unwrap();

        thread::sleep(Duration::from_millis(120));
        assert!(pool.metrics().last_health_check.is_some());

        let started = Instant::now();
        pool.shutdown();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_stop_signal_wakes_early() {
        let signal = Arc::new(StopSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait(Duration::from_secs(30)))
        };

        thread::sleep(Duration::from_millis(20));
        signal.stop();
        assert!(waiter.join().unwrap());
        assert!(!StopSignal::new().wait(Duration::from_millis(1)));
    }
}
