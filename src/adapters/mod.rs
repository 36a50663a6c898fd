/// Pluggable market-data sources and their registry

pub mod registry;
pub mod traits;

pub use registry::AdapterRegistry;
pub use traits::{AdapterError, DataAdapter, FetchRequest};
