/// Bounded, self-healing connection pool
///
/// - Blocking acquire with timeout, RAII release
/// - Connection creation with exponential backoff
/// - Health-check and cleanup loops on background threads
/// - Query and transaction helpers

pub mod config;
pub mod connection_pool;
pub mod errors;
pub mod maintenance;
pub mod metrics;
pub mod transaction;

#[cfg(test)]
pub(crate) mod mock;

pub use config::PoolConfig;
pub use connection_pool::{ConnectionPool, PooledConnection};
pub use errors::PoolError;
pub use maintenance::MaintenanceReport;
pub use metrics::{PoolMetrics, PoolStatus};
pub use transaction::TransactionalConnection;
