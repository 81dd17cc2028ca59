use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::warehouse::WarehouseId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AssignmentSource {
    /// Driver accepted the duty through the claim endpoint.
    Claimed,
    /// Picked by the background assignment engine.
    Auto,
}

impl AssignmentSource {
    pub fn as_label(self) -> &'static str {
        match self {
            AssignmentSource::Claimed => "claimed",
            AssignmentSource::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub driver_id: Uuid,
    pub warehouse_id: WarehouseId,
    pub source: AssignmentSource,
    pub assigned_at: DateTime<Utc>,
}
