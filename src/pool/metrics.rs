use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smoothing factor of the average wait time
const WAIT_SMOOTHING: f64 = 0.1;

/// Connection pool counters
///
/// Mutated only while the pool state lock is held.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolMetrics {
    pub total_created: u64,
    pub total_closed: u64,
    pub current_active: usize,
    pub peak_active: usize,
    pub total_requests: u64,
    pub failed_requests: u64,
    /// Exponentially smoothed acquire wait: `avg = avg * 0.9 + sample * 0.1`
    pub avg_wait_time_ms: f64,
    pub idle_size: usize,
    pub last_health_check: Option<DateTime<Utc>>,
}

impl PoolMetrics {
    pub(crate) fn record_wait(&mut self, wait: Duration) {
        let sample_ms = wait.as_secs_f64() * 1000.0;
        self.avg_wait_time_ms = self.avg_wait_time_ms * (1.0 - WAIT_SMOOTHING) + sample_ms * WAIT_SMOOTHING;
    }

    pub(crate) fn set_active(&mut self, active: usize) {
        self.current_active = active;
        self.peak_active = self.peak_active.max(active);
    }
}

/// Point-in-time view of the pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    pub idle: usize,
    pub active: usize,
    /// Connections being created or probed outside the lock
    pub pending: usize,
    pub min_connections: u32,
    pub max_connections: u32,
    pub is_shutdown: bool,
    pub metrics: PoolMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_time_smoothing() {
        let mut metrics = PoolMetrics::default();

        metrics.record_wait(Duration::from_millis(100));
        assert!((metrics.avg_wait_time_ms - 10.0).abs() < 1e-9);

        metrics.record_wait(Duration::from_millis(100));
        assert!((metrics.avg_wait_time_ms - 19.0).abs() < 1e-9);
    }

    #[test]
    fn test_peak_active_tracks_maximum() {
        let mut metrics = PoolMetrics::default();
        metrics.set_active(3);
        metrics.set_active(1);

        assert_eq!(metrics.current_active, 1);
        assert_eq!(metrics.peak_active, 3);
    }
}
