use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::queue::QueuedOrder;
use crate::models::assignment::Assignment;
use crate::models::driver::Driver;
use crate::models::order::DeliveryOrder;
use crate::observability::metrics::Metrics;

/// Knobs the handlers and the assignment engine read at runtime.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub auto_assign: bool,
    pub retry_delay_ms: u64,
    pub max_attempts: u32,
}

impl From<&Config> for DispatchSettings {
    fn from(config: &Config) -> Self {
        Self {
            auto_assign: config.auto_assign,
            retry_delay_ms: config.assignment_retry_ms,
            max_attempts: config.assignment_max_attempts,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

pub struct AppState {
    pub drivers: DashMap<Uuid, Driver>,
    pub orders: DashMap<Uuid, DeliveryOrder>,
    pub assignments: DashMap<Uuid, Assignment>,
    pub order_tx: mpsc::Sender<QueuedOrder>,
    pub assignment_events_tx: broadcast::Sender<Assignment>,
    pub settings: DispatchSettings,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        order_queue_size: usize,
        event_buffer_size: usize,
        settings: DispatchSettings,
    ) -> (Self, mpsc::Receiver<QueuedOrder>) {
        let (order_tx, order_rx) = mpsc::channel(order_queue_size);
        let (assignment_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        (
            Self {
                drivers: DashMap::new(),
                orders: DashMap::new(),
                assignments: DashMap::new(),
                order_tx,
                assignment_events_tx,
                settings,
                metrics: Metrics::new(),
            },
            order_rx,
        )
    }

    pub fn from_config(config: &Config) -> (Self, mpsc::Receiver<QueuedOrder>) {
        Self::new(
            config.order_queue_size,
            config.event_buffer_size,
            DispatchSettings::from(config),
        )
    }

    pub fn available_driver_count(&self) -> usize {
        self.drivers
            .iter()
            .filter(|entry| entry.is_available && entry.is_active)
            .count()
    }

    /// Recomputes the available-drivers gauge from the driver table.
    pub fn refresh_driver_gauge(&self) {
        self.metrics
            .available_drivers
            .set(self.available_driver_count() as i64);
    }
}
