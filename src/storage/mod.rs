/// Store access layer shared by the saga coordinator and the data manager
///
/// - Value model (`Value`, `Row`, `Frame`, `Filters`)
/// - Time-series table shapes (`TableSchema`, `SchemaCatalog`)
/// - Store traits implemented by the Postgres repositories and the in-memory stores

pub mod errors;
pub mod memory;
pub mod table_schema;
pub mod traits;
pub mod value;

pub use errors::StoreError;
pub use memory::{InMemoryAuditTrail, InMemoryRelational, InMemoryTimeSeries};
pub use table_schema::{is_valid_identifier, RowKey, SchemaCatalog, TableSchema, TXN_ID_COLUMN, VALID_COLUMN};
pub use traits::{AuditTrail, RelationalAccess, TimeSeriesAccess, UnitOfWork, UnitOfWorkSource};
pub use value::{Filters, Frame, Row, Value};
