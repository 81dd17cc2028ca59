use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::warehouse::WarehouseId;

/// Outcome of the external background-check workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundCheckStatus {
    #[default]
    NotStarted,
    Pending,
    InProgress,
    Approved,
    Rejected,
}

impl BackgroundCheckStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BackgroundCheckStatus::NotStarted => "not_started",
            BackgroundCheckStatus::Pending => "pending",
            BackgroundCheckStatus::InProgress => "in_progress",
            BackgroundCheckStatus::Approved => "approved",
            BackgroundCheckStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for BackgroundCheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub is_document_verified: bool,
    pub is_account_verified: bool,
    pub is_available: bool,
    pub is_active: bool,
    pub background_check_status: BackgroundCheckStatus,
    pub warehouse_id: WarehouseId,
    /// Order currently held by this driver, if any.
    pub current_order: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    pub fn is_on_duty(&self) -> bool {
        self.current_order.is_some()
    }
}
