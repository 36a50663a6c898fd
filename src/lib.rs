// Library Crate Root
// lib.rs

pub mod adapters;
pub mod database;
pub mod events;
pub mod manager;
pub mod pool;
pub mod routing;
pub mod saga;
pub mod storage;

// pub use = re-export at crate root
pub use adapters::{AdapterRegistry, DataAdapter, FetchRequest};
pub use events::{EventBus, DATA_OPERATION_COMPLETE};
pub use manager::{pivot_fn, DataManager};
pub use pool::{ConnectionPool, PoolConfig, PoolError};
pub use routing::{DataCategory, DataRouter, StoreTarget};
pub use saga::{DoubleFault, SagaCoordinator, SagaOutcome};
pub use storage::{Filters, Frame, Row, StoreError, Value};
