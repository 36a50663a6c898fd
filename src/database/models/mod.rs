pub mod audit;

pub use audit::{AuditRecord, FinalStatus, NewAuditRecord, StepStatus};
