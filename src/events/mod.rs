/// In-process event bus used for monitoring notifications

pub mod bus;

pub use bus::{Event, EventBus, EventBusStats, EventHandler, HandlerError, DATA_OPERATION_COMPLETE};
