/// Postgres-backed implementations of the store traits
///
/// Each repository takes a connection provider closure, so the same code runs
/// against either pool.

pub mod audit_repository;
pub mod relational_repository;
pub mod timeseries_repository;

pub use audit_repository::AuditRepositoryImpl;
pub use relational_repository::RelationalRepositoryImpl;
pub use timeseries_repository::TimeSeriesRepositoryImpl;
