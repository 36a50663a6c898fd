use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::routing::DataCategory;

/// Status of one store's step within a saga attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Success,
    Failed,
    Compensated,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Compensated => "compensated",
            StepStatus::Skipped => "skipped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(StepStatus::Pending),
            "success" => Some(StepStatus::Success),
            "failed" => Some(StepStatus::Failed),
            "compensated" => Some(StepStatus::Compensated),
            "skipped" => Some(StepStatus::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal status of a saga attempt
///
/// `Failed` is only written when compensation itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    Committed,
    RolledBack,
    Failed,
}

impl FinalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalStatus::Committed => "committed",
            FinalStatus::RolledBack => "rolled_back",
            FinalStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "committed" => Some(FinalStatus::Committed),
            "rolled_back" => Some(FinalStatus::RolledBack),
            "failed" => Some(FinalStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit trail entry - one row per saga attempt, never updated
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::transaction_log)]
#[diesel(primary_key(id))]
pub struct AuditRecord {
    pub id: i64,

    /// Attempt identifier stamped on every time-series row (`txn_id`)
    pub transaction_id: String,

    /// Data category the attempt wrote
    pub business_type: DataCategory,

    /// Caller-supplied business key
    pub business_id: String,

    /// Time-series step status
    pub td_status: String,

    /// Relational step status
    pub pg_status: String,

    pub final_status: String,

    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn final_status(&self) -> Option<FinalStatus> {
        FinalStatus::from_str(&self.final_status)
    }

    pub fn td_status(&self) -> Option<StepStatus> {
        StepStatus::from_str(&self.td_status)
    }

    pub fn pg_status(&self) -> Option<StepStatus> {
        StepStatus::from_str(&self.pg_status)
    }
}

/// New audit entry
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::transaction_log)]
pub struct NewAuditRecord {
    pub transaction_id: String,
    pub business_type: DataCategory,
    pub business_id: String,
    pub td_status: String,
    pub pg_status: String,
    pub final_status: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewAuditRecord {
    pub fn new(
        transaction_id: impl Into<String>,
        business_type: DataCategory,
        business_id: impl Into<String>,
        td_status: StepStatus,
        pg_status: StepStatus,
        final_status: FinalStatus,
        error_message: Option<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            business_type,
            business_id: business_id.into(),
            td_status: td_status.as_str().to_string(),
            pg_status: pg_status.as_str().to_string(),
            final_status: final_status.as_str().to_string(),
            error_message,
            created_at: Utc::now(),
        }
    }

    /// Materialise as a stored record with the given id
    pub fn into_record(self, id: i64) -> AuditRecord {
        AuditRecord {
            id,
            transaction_id: self.transaction_id,
            business_type: self.business_type,
            business_id: self.business_id,
            td_status: self.td_status,
            pg_status: self.pg_status,
            final_status: self.final_status,
            error_message: self.error_message,
            created_at: self.created_at,
        }
    }
}
