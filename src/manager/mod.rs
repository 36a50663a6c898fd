/// Orchestrator composing routing, saga, adapters and events

pub mod data_manager;

pub use data_manager::{pivot_fn, DataManager, DataOperationEvent, HealthReport, PivotFn};
