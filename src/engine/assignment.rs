use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::eligibility::{check, EligibilityResult};
use crate::engine::queue::{enqueue_order, QueuedOrder};
use crate::error::AppError;
use crate::models::assignment::{Assignment, AssignmentSource};
use crate::models::order::{DeliveryOrder, OrderStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineOutcome {
    Assigned,
    Requeued,
    Skipped,
    Exhausted,
}

impl EngineOutcome {
    fn as_label(self) -> &'static str {
        match self {
            EngineOutcome::Assigned => "success",
            EngineOutcome::Requeued => "requeued",
            EngineOutcome::Skipped => "skipped",
            EngineOutcome::Exhausted => "exhausted",
        }
    }
}

/// Gives `order_id` to `driver_id` if the order is still open and the driver
/// passes every eligibility rule.
///
/// The order entry is locked before the driver entry and both stay locked
/// while the verdict is computed and applied, so concurrent claims on the
/// same order (or the same driver) cannot both win.
pub fn assign_driver(
    state: &AppState,
    order_id: Uuid,
    driver_id: Uuid,
    source: AssignmentSource,
) -> Result<Assignment, AppError> {
    let assignment = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if !order.is_claimable() {
            return Err(AppError::Conflict(format!(
                "order {order_id} is {:?} and cannot be assigned",
                order.status
            )));
        }

        let mut driver = state
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

        let failures = check(&driver, &order);
        state.metrics.observe_eligibility(&failures);
        if !failures.is_empty() {
            let verdict = EligibilityResult::from(failures.as_slice());
            return Err(AppError::Ineligible {
                errors: verdict.errors,
            });
        }

        let now = Utc::now();
        order.status = OrderStatus::Assigned;
        order.assigned_driver = Some(driver_id);

        driver.is_available = false;
        driver.current_order = Some(order_id);
        driver.updated_at = now;

        Assignment {
            id: Uuid::new_v4(),
            order_id,
            driver_id,
            warehouse_id: order.warehouse_id.clone(),
            source,
            assigned_at: now,
        }
    };

    state.assignments.insert(assignment.id, assignment.clone());
    let _ = state.assignment_events_tx.send(assignment.clone());
    state.refresh_driver_gauge();
    state
        .metrics
        .assignments_total
        .with_label_values(&[source.as_label()])
        .inc();

    info!(
        order_id = %order_id,
        driver_id = %driver_id,
        warehouse_id = %assignment.warehouse_id,
        source = source.as_label(),
        "order assigned"
    );

    Ok(assignment)
}

/// Marks an assigned order as delivered and frees its driver.
pub fn complete_order(state: &AppState, order_id: Uuid) -> Result<DeliveryOrder, AppError> {
    close_order(state, order_id, OrderStatus::Delivered)
}

/// Cancels an open or assigned order, freeing the driver if one held it.
pub fn cancel_order(state: &AppState, order_id: Uuid) -> Result<DeliveryOrder, AppError> {
    close_order(state, order_id, OrderStatus::Cancelled)
}

fn close_order(
    state: &AppState,
    order_id: Uuid,
    target: OrderStatus,
) -> Result<DeliveryOrder, AppError> {
    let closed = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        let allowed = match target {
            OrderStatus::Delivered => order.status == OrderStatus::Assigned,
            OrderStatus::Cancelled => {
                matches!(order.status, OrderStatus::Pending | OrderStatus::Assigned)
            }
            OrderStatus::Pending | OrderStatus::Assigned => false,
        };
        if !allowed {
            return Err(AppError::Conflict(format!(
                "order {order_id} is {:?} and cannot become {target:?}",
                order.status
            )));
        }

        if let Some(driver_id) = order.assigned_driver {
            if let Some(mut driver) = state.drivers.get_mut(&driver_id) {
                if driver.current_order == Some(order_id) {
                    driver.current_order = None;
                    driver.is_available = true;
                    driver.updated_at = Utc::now();
                }
            }
        }

        order.status = target;
        order.clone()
    };

    state.refresh_driver_gauge();
    info!(
        order_id = %order_id,
        driver_id = ?closed.assigned_driver,
        status = ?closed.status,
        "order closed"
    );

    Ok(closed)
}

pub async fn run_assignment_engine(state: Arc<AppState>, mut order_rx: mpsc::Receiver<QueuedOrder>) {
    info!("assignment engine started");

    while let Some(queued) = order_rx.recv().await {
        state.metrics.orders_in_queue.dec();

        let start = Instant::now();
        let label = match process_order(state.clone(), queued).await {
            Ok(outcome) => outcome.as_label(),
            Err(err) => {
                error!(order_id = %queued.order_id, error = %err, "failed to process order");
                "error"
            }
        };

        state
            .metrics
            .assignment_latency_seconds
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());
        state
            .metrics
            .auto_assignment_runs_total
            .with_label_values(&[label])
            .inc();
    }

    warn!("assignment engine stopped: queue channel closed");
}

async fn process_order(state: Arc<AppState>, queued: QueuedOrder) -> Result<EngineOutcome, AppError> {
    let order = state
        .orders
        .get(&queued.order_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", queued.order_id)))?;

    if !order.is_claimable() {
        debug!(order_id = %order.id, status = ?order.status, "order no longer open; skipping");
        return Ok(EngineOutcome::Skipped);
    }

    // longest idle first
    let mut candidates: Vec<_> = state
        .drivers
        .iter()
        .filter(|entry| check(entry.value(), &order).is_empty())
        .map(|entry| (entry.updated_at, entry.id))
        .collect();
    candidates.sort();

    for (_, driver_id) in candidates {
        match assign_driver(&state, order.id, driver_id, AssignmentSource::Auto) {
            Ok(_) => return Ok(EngineOutcome::Assigned),
            Err(AppError::Ineligible { errors }) => {
                debug!(
                    order_id = %order.id,
                    driver_id = %driver_id,
                    reasons = ?errors,
                    "candidate became ineligible"
                );
            }
            Err(AppError::Conflict(reason)) => {
                debug!(order_id = %order.id, reason = %reason, "order taken before auto-assignment");
                return Ok(EngineOutcome::Skipped);
            }
            Err(AppError::NotFound(_)) => continue,
            Err(err) => return Err(err),
        }
    }

    let attempts = queued.attempts.saturating_add(1);
    if attempts >= state.settings.max_attempts {
        warn!(
            order_id = %order.id,
            warehouse_id = %order.warehouse_id,
            attempts,
            "no eligible drivers; leaving order open for manual claim"
        );
        return Ok(EngineOutcome::Exhausted);
    }

    warn!(
        order_id = %order.id,
        warehouse_id = %order.warehouse_id,
        attempts,
        "no eligible drivers; re-queueing order"
    );

    let retry_delay = Duration::from_millis(state.settings.retry_delay_ms);
    let retry_state = state.clone();
    tokio::spawn(async move {
        sleep(retry_delay).await;
        let retry = QueuedOrder {
            order_id: queued.order_id,
            attempts,
        };
        if let Err(err) = enqueue_order(&retry_state, retry).await {
            error!(order_id = %retry.order_id, error = %err, "failed to re-queue order");
        }
    });

    Ok(EngineOutcome::Requeued)
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use chrono::{Duration as ChronoDuration, Utc};
    use uuid::Uuid;

    use super::{assign_driver, cancel_order, complete_order};
    use crate::error::AppError;
    use crate::models::assignment::AssignmentSource;
    use crate::models::driver::{BackgroundCheckStatus, Driver};
    use crate::models::order::{DeliveryOrder, OrderStatus};
    use crate::models::warehouse::WarehouseId;
    use crate::state::{AppState, DispatchSettings};

    fn state() -> AppState {
        let (state, _rx) = AppState::new(16, 16, DispatchSettings::default());
        state
    }

    fn add_driver(state: &AppState, seed: u128, warehouse: &str) -> Uuid {
        let driver = Driver {
            id: Uuid::from_u128(seed),
            name: format!("driver-{seed}"),
            is_document_verified: true,
            is_account_verified: true,
            is_available: true,
            is_active: true,
            background_check_status: BackgroundCheckStatus::Approved,
            warehouse_id: WarehouseId::parse(warehouse).unwrap(),
            current_order: None,
            updated_at: Utc::now() - ChronoDuration::seconds(seed as i64),
        };
        let id = driver.id;
        state.drivers.insert(id, driver);
        id
    }

    fn add_order(state: &AppState, warehouse: &str) -> Uuid {
        let order = DeliveryOrder {
            id: Uuid::new_v4(),
            warehouse_id: WarehouseId::parse(warehouse).unwrap(),
            status: OrderStatus::Pending,
            assigned_driver: None,
            created_at: Utc::now(),
        };
        let id = order.id;
        state.orders.insert(id, order);
        id
    }

    #[test]
    fn eligible_claim_assigns_and_engages_driver() {
        let state = state();
        let driver_id = add_driver(&state, 1, "WH1");
        let order_id = add_order(&state, "WH1");

        let assignment =
            assign_driver(&state, order_id, driver_id, AssignmentSource::Claimed).unwrap();

        assert_eq!(assignment.driver_id, driver_id);
        let order = state.orders.get(&order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Assigned);
        assert_eq!(order.assigned_driver, Some(driver_id));
        let driver = state.drivers.get(&driver_id).unwrap();
        assert!(!driver.is_available);
        assert_eq!(driver.current_order, Some(order_id));
        assert_eq!(state.assignments.len(), 1);
    }

    #[test]
    fn ineligible_claim_returns_every_reason() {
        let state = state();
        let driver_id = add_driver(&state, 1, "WH1");
        state.drivers.get_mut(&driver_id).unwrap().is_active = false;
        let order_id = add_order(&state, "WH2");

        let err = assign_driver(&state, order_id, driver_id, AssignmentSource::Claimed)
            .unwrap_err();

        match err {
            AppError::Ineligible { errors } => assert_eq!(
                errors,
                vec![
                    "Account not active",
                    "Can't get this order (driver & order must be same where house)",
                ]
            ),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            state.orders.get(&order_id).unwrap().status,
            OrderStatus::Pending
        );
    }

    #[test]
    fn second_claim_on_same_order_conflicts() {
        let state = state();
        let first = add_driver(&state, 1, "WH1");
        let second = add_driver(&state, 2, "WH1");
        let order_id = add_order(&state, "WH1");

        assign_driver(&state, order_id, first, AssignmentSource::Claimed).unwrap();
        let err = assign_driver(&state, order_id, second, AssignmentSource::Claimed).unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert!(state.drivers.get(&second).unwrap().is_available);
    }

    #[test]
    fn driver_on_duty_cannot_take_another_order() {
        let state = state();
        let driver_id = add_driver(&state, 1, "WH1");
        let first = add_order(&state, "WH1");
        let second = add_order(&state, "WH1");

        assign_driver(&state, first, driver_id, AssignmentSource::Claimed).unwrap();
        let err = assign_driver(&state, second, driver_id, AssignmentSource::Claimed).unwrap_err();

        assert!(matches!(err, AppError::Ineligible { errors } if errors == vec!["Not available"]));
    }

    #[test]
    fn delivering_releases_the_driver() {
        let state = state();
        let driver_id = add_driver(&state, 1, "WH1");
        let order_id = add_order(&state, "WH1");
        assign_driver(&state, order_id, driver_id, AssignmentSource::Claimed).unwrap();

        let order = complete_order(&state, order_id).unwrap();

        assert_eq!(order.status, OrderStatus::Delivered);
        let driver = state.drivers.get(&driver_id).unwrap();
        assert!(driver.is_available);
        assert!(driver.current_order.is_none());
    }

    #[test]
    fn pending_order_cannot_be_delivered_but_can_be_cancelled() {
        let state = state();
        let order_id = add_order(&state, "WH1");

        assert!(matches!(
            complete_order(&state, order_id),
            Err(AppError::Conflict(_))
        ));
        let cancelled = cancel_order(&state, order_id).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(matches!(
            cancel_order(&state, order_id),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn cancelling_assigned_order_frees_the_driver() {
        let state = state();
        let driver_id = add_driver(&state, 1, "WH1");
        let order_id = add_order(&state, "WH1");
        assign_driver(&state, order_id, driver_id, AssignmentSource::Claimed).unwrap();

        let cancelled = cancel_order(&state, order_id).unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        {
            let driver = state.drivers.get(&driver_id).unwrap();
            assert!(driver.is_available);
            assert!(driver.current_order.is_none());
        }
        assert!(matches!(
            complete_order(&state, order_id),
            Err(AppError::Conflict(_))
        ));
        assert_eq!(state.available_driver_count(), 1);
    }

    #[test]
    fn racing_claims_on_one_order_have_a_single_winner() {
        const CLAIMANTS: u128 = 16;

        for _ in 0..50 {
            let state = state();
            let order_id = add_order(&state, "WH1");
            let drivers: Vec<Uuid> = (1..=CLAIMANTS)
                .map(|seed| add_driver(&state, seed, "WH1"))
                .collect();
            let barrier = Barrier::new(drivers.len());

            let winners = thread::scope(|scope| {
                let handles: Vec<_> = drivers
                    .iter()
                    .map(|&driver_id| {
                        let state = &state;
                        let barrier = &barrier;
                        scope.spawn(move || {
                            barrier.wait();
                            assign_driver(state, order_id, driver_id, AssignmentSource::Claimed)
                                .is_ok()
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| handle.join().unwrap())
                    .filter(|won| *won)
                    .count()
            });

            assert_eq!(winners, 1);
            assert_eq!(state.assignments.len(), 1);
            let engaged = state
                .drivers
                .iter()
                .filter(|entry| entry.current_order == Some(order_id))
                .count();
            assert_eq!(engaged, 1);
        }
    }

    #[test]
    fn racing_orders_for_one_driver_have_a_single_winner() {
        const ORDERS: usize = 16;

        for _ in 0..50 {
            let state = state();
            let driver_id = add_driver(&state, 1, "WH1");
            let orders: Vec<Uuid> = (0..ORDERS).map(|_| add_order(&state, "WH1")).collect();
            let barrier = Barrier::new(orders.len());

            let winners = thread::scope(|scope| {
                let handles: Vec<_> = orders
                    .iter()
                    .map(|&order_id| {
                        let state = &state;
                        let barrier = &barrier;
                        scope.spawn(move || {
                            barrier.wait();
                            assign_driver(state, order_id, driver_id, AssignmentSource::Claimed)
                                .is_ok()
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| handle.join().unwrap())
                    .filter(|won| *won)
                    .count()
            });

            assert_eq!(winners, 1);
            let assigned = state
                .orders
                .iter()
                .filter(|entry| entry.status == OrderStatus::Assigned)
                .count();
            assert_eq!(assigned, 1);
        }
    }

    #[test]
    fn unknown_records_are_not_found() {
        let state = state();
        let order_id = add_order(&state, "WH1");

        assert!(matches!(
            assign_driver(&state, order_id, Uuid::new_v4(), AssignmentSource::Claimed),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            assign_driver(&state, Uuid::new_v4(), Uuid::new_v4(), AssignmentSource::Claimed),
            Err(AppError::NotFound(_))
        ));
    }
}
