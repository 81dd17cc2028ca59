use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::rest::parse_warehouse_filter;
use crate::engine::assignment::{assign_driver, cancel_order, complete_order};
use crate::engine::eligibility::{check, check_records, EligibilityResult};
use crate::engine::queue::{enqueue_order, QueuedOrder};
use crate::error::AppError;
use crate::models::assignment::{Assignment, AssignmentSource};
use crate::models::order::{DeliveryOrder, OrderStatus};
use crate::models::warehouse::WarehouseId;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/eligibility", get(order_eligibility))
        .route("/orders/:id/claim", post(claim_order))
        .route("/orders/:id/deliver", post(deliver_order))
        .route("/orders/:id/cancel", post(cancel))
        .route("/eligibility", post(check_eligibility))
        .route("/assignments", get(list_assignments))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub warehouse_id: WarehouseId,
    /// Falls back to the server's `AUTO_ASSIGN` setting.
    pub auto_assign: Option<bool>,
}

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    pub warehouse_id: Option<String>,
}

#[derive(Deserialize)]
pub struct ClaimRequest {
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct EligibilityRequest {
    pub driver_id: Uuid,
    pub order_id: Uuid,
}

#[derive(Serialize)]
pub struct DriverEligibility {
    pub driver_id: Uuid,
    pub driver_name: String,
    #[serde(flatten)]
    pub result: EligibilityResult,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let order = DeliveryOrder {
        id: Uuid::new_v4(),
        warehouse_id: payload.warehouse_id,
        status: OrderStatus::Pending,
        assigned_driver: None,
        created_at: Utc::now(),
    };

    state.orders.insert(order.id, order.clone());

    let auto_assign = payload.auto_assign.unwrap_or(state.settings.auto_assign);
    if auto_assign {
        enqueue_order(&state, QueuedOrder::new(order.id)).await?;
    }

    info!(order_id = %order.id, warehouse_id = %order.warehouse_id, auto_assign, "order created");
    Ok(Json(order))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<DeliveryOrder>>, AppError> {
    let warehouse = parse_warehouse_filter(query.warehouse_id.as_deref())?;

    let mut orders: Vec<DeliveryOrder> = state
        .orders
        .iter()
        .filter(|entry| {
            warehouse
                .as_ref()
                .is_none_or(|warehouse| &entry.warehouse_id == warehouse)
        })
        .map(|entry| entry.value().clone())
        .collect();
    orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    Ok(Json(orders))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    Ok(Json(order.value().clone()))
}

/// Verdict of every registered driver for one order. Read-only listing, so
/// it is not counted in the eligibility metrics.
async fn order_eligibility(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DriverEligibility>>, AppError> {
    let order = state
        .orders
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    let mut verdicts: Vec<DriverEligibility> = state
        .drivers
        .iter()
        .map(|entry| {
            let failures = check(entry.value(), &order);
            DriverEligibility {
                driver_id: entry.id,
                driver_name: entry.name.clone(),
                result: EligibilityResult::from(failures.as_slice()),
            }
        })
        .collect();
    verdicts.sort_by(|a, b| {
        a.driver_name
            .cmp(&b.driver_name)
            .then(a.driver_id.cmp(&b.driver_id))
    });

    Ok(Json(verdicts))
}

async fn check_eligibility(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EligibilityRequest>,
) -> Result<Json<EligibilityResult>, AppError> {
    let driver = state
        .drivers
        .get(&payload.driver_id)
        .map(|entry| entry.value().clone());
    let order = state
        .orders
        .get(&payload.order_id)
        .map(|entry| entry.value().clone());

    let failures = check_records(driver.as_ref(), order.as_ref())?;
    state.metrics.observe_eligibility(&failures);

    Ok(Json(EligibilityResult::from(failures.as_slice())))
}

async fn claim_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClaimRequest>,
) -> Result<Json<Assignment>, AppError> {
    let assignment = assign_driver(&state, id, payload.driver_id, AssignmentSource::Claimed)?;
    Ok(Json(assignment))
}

async fn deliver_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(complete_order(&state, id)?))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(cancel_order(&state, id)?))
}

async fn list_assignments(State(state): State<Arc<AppState>>) -> Json<Vec<Assignment>> {
    let mut assignments: Vec<Assignment> = state
        .assignments
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    assignments.sort_by(|a, b| a.assigned_at.cmp(&b.assigned_at));

    Json(assignments)
}
