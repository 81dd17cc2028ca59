use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// An order waiting for the assignment engine.
#[derive(Debug, Clone, Copy)]
pub struct QueuedOrder {
    pub order_id: Uuid,
    pub attempts: u32,
}

impl QueuedOrder {
    pub fn new(order_id: Uuid) -> Self {
        Self {
            order_id,
            attempts: 0,
        }
    }
}

/// Counts the order as queued before sending, so the engine's decrement
/// never runs ahead of it.
pub async fn enqueue_order(state: &AppState, queued: QueuedOrder) -> Result<(), AppError> {
    state.metrics.orders_in_queue.inc();

    if let Err(err) = state.order_tx.send(queued).await {
        state.metrics.orders_in_queue.dec();
        return Err(AppError::Internal(format!("order queue send failed: {err}")));
    }

    Ok(())
}
