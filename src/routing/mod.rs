/// Routing of semantic data categories to the store that owns them
///
/// - `DataCategory` / `StoreTarget`: the static category taxonomy
/// - `DataRouter`: immutable category -> store lookup table built once at startup

pub mod category;
pub mod router;

pub use category::{DataCategory, StoreTarget};
pub use router::{DataRouter, RoutingStats};
