/// Database module for PostgreSQL and TimescaleDB integration
///
/// This module provides:
/// - Connection pools for both PostgreSQL (bookkeeping, audit) and TimescaleDB (time-series)
/// - Repositories implementing the store traits
/// - Dynamic SQL for tables addressed by name
/// - The audit model and its Diesel schema

pub mod connection;
pub mod models;
pub mod repositories;
pub mod schema;
pub mod sql;
pub mod unit_of_work;

pub use connection::{
    establish_connection_pools, DatabaseConfig, DatabaseError, DatabasePools, PgPool, PgPooledConnection,
};
pub use repositories::{AuditRepositoryImpl, RelationalRepositoryImpl, TimeSeriesRepositoryImpl};
pub use unit_of_work::PgUnitOfWork;
