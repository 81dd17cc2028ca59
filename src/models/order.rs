use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::warehouse::WarehouseId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Assigned,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub id: Uuid,
    pub warehouse_id: WarehouseId,
    pub status: OrderStatus,
    pub assigned_driver: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl DeliveryOrder {
    pub fn is_claimable(&self) -> bool {
        self.status == OrderStatus::Pending && self.assigned_driver.is_none()
    }
}
