use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::rest::parse_warehouse_filter;
use crate::error::AppError;
use crate::models::driver::{BackgroundCheckStatus, Driver};
use crate::models::warehouse::WarehouseId;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id", get(get_driver))
        .route("/drivers/:id/status", patch(update_driver_status))
        .route("/drivers/:id/verification", patch(update_driver_verification))
        .route("/drivers/:id/warehouse", patch(update_driver_warehouse))
}

fn default_true() -> bool {
    true
}

/// New drivers start unverified unless the caller already knows better.
#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub is_document_verified: bool,
    #[serde(default)]
    pub is_account_verified: bool,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub background_check_status: BackgroundCheckStatus,
}

#[derive(Deserialize)]
pub struct ListDriversQuery {
    pub warehouse_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub is_available: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateVerificationRequest {
    pub is_document_verified: Option<bool>,
    pub is_account_verified: Option<bool>,
    pub background_check_status: Option<BackgroundCheckStatus>,
}

#[derive(Deserialize)]
pub struct UpdateWarehouseRequest {
    pub warehouse_id: WarehouseId,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let driver = Driver {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        is_document_verified: payload.is_document_verified,
        is_account_verified: payload.is_account_verified,
        is_available: payload.is_available,
        is_active: payload.is_active,
        background_check_status: payload.background_check_status,
        warehouse_id: payload.warehouse_id,
        current_order: None,
        updated_at: Utc::now(),
    };

    state.drivers.insert(driver.id, driver.clone());
    state.refresh_driver_gauge();

    info!(driver_id = %driver.id, warehouse_id = %driver.warehouse_id, "driver registered");
    Ok(Json(driver))
}

async fn list_drivers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListDriversQuery>,
) -> Result<Json<Vec<Driver>>, AppError> {
    let warehouse = parse_warehouse_filter(query.warehouse_id.as_deref())?;

    let mut drivers: Vec<Driver> = state
        .drivers
        .iter()
        .filter(|entry| {
            warehouse
                .as_ref()
                .is_none_or(|warehouse| &entry.warehouse_id == warehouse)
        })
        .map(|entry| entry.value().clone())
        .collect();
    drivers.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

    Ok(Json(drivers))
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, AppError> {
    let driver = state
        .drivers
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    Ok(Json(driver.value().clone()))
}

async fn update_driver_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.is_available.is_none() && payload.is_active.is_none() {
        return Err(AppError::BadRequest(
            "one of is_available or is_active is required".to_string(),
        ));
    }

    let driver = {
        let mut driver = state
            .drivers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

        if payload.is_available == Some(true) && driver.is_on_duty() {
            return Err(AppError::Conflict(format!(
                "driver {id} is on a duty and cannot be marked available"
            )));
        }

        if let Some(is_available) = payload.is_available {
            driver.is_available = is_available;
        }
        if let Some(is_active) = payload.is_active {
            driver.is_active = is_active;
        }
        driver.updated_at = Utc::now();
        driver.clone()
    };

    state.refresh_driver_gauge();
    info!(
        driver_id = %id,
        is_available = driver.is_available,
        is_active = driver.is_active,
        "driver status updated"
    );

    Ok(Json(driver))
}

async fn update_driver_verification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateVerificationRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.is_document_verified.is_none()
        && payload.is_account_verified.is_none()
        && payload.background_check_status.is_none()
    {
        return Err(AppError::BadRequest(
            "at least one verification field is required".to_string(),
        ));
    }

    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    if let Some(verified) = payload.is_document_verified {
        driver.is_document_verified = verified;
    }
    if let Some(verified) = payload.is_account_verified {
        driver.is_account_verified = verified;
    }
    if let Some(status) = payload.background_check_status {
        driver.background_check_status = status;
    }
    driver.updated_at = Utc::now();

    info!(
        driver_id = %id,
        background_check = %driver.background_check_status,
        "driver verification updated"
    );

    Ok(Json(driver.clone()))
}

async fn update_driver_warehouse(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWarehouseRequest>,
) -> Result<Json<Driver>, AppError> {
    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    if driver.is_on_duty() {
        return Err(AppError::Conflict(format!(
            "driver {id} is on a duty and cannot change warehouse"
        )));
    }

    driver.warehouse_id = payload.warehouse_id;
    driver.updated_at = Utc::now();

    info!(driver_id = %id, warehouse_id = %driver.warehouse_id, "driver moved");
    Ok(Json(driver.clone()))
}
