use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::engine::eligibility::RuleFailure;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub assignments_total: IntCounterVec,
    pub orders_in_queue: IntGauge,
    pub assignment_latency_seconds: HistogramVec,
    pub auto_assignment_runs_total: IntCounterVec,
    pub eligibility_checks_total: IntCounterVec,
    pub eligibility_rule_failures_total: IntCounterVec,
    pub available_drivers: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Total duty assignments by source"),
            &["source"],
        )
        .expect("valid assignments_total metric");

        let orders_in_queue = IntGauge::new(
            "orders_in_queue",
            "Current number of orders waiting for auto-assignment",
        )
        .expect("valid orders_in_queue metric");

        let assignment_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "assignment_latency_seconds",
                "Latency of auto-assignment processing in seconds",
            ),
            &["outcome"],
        )
        .expect("valid assignment_latency_seconds metric");

        let auto_assignment_runs_total = IntCounterVec::new(
            Opts::new(
                "auto_assignment_runs_total",
                "Auto-assignment engine runs by outcome",
            ),
            &["outcome"],
        )
        .expect("valid auto_assignment_runs_total metric");

        let eligibility_checks_total = IntCounterVec::new(
            Opts::new(
                "eligibility_checks_total",
                "Driver eligibility evaluations by verdict",
            ),
            &["verdict"],
        )
        .expect("valid eligibility_checks_total metric");

        let eligibility_rule_failures_total = IntCounterVec::new(
            Opts::new(
                "eligibility_rule_failures_total",
                "Failed eligibility rules by rule",
            ),
            &["rule"],
        )
        .expect("valid eligibility_rule_failures_total metric");

        let available_drivers = IntGauge::new(
            "available_drivers",
            "Drivers currently active and accepting duties",
        )
        .expect("valid available_drivers metric");

        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(orders_in_queue.clone()))
            .expect("register orders_in_queue");
        registry
            .register(Box::new(assignment_latency_seconds.clone()))
            .expect("register assignment_latency_seconds");
        registry
            .register(Box::new(auto_assignment_runs_total.clone()))
            .expect("register auto_assignment_runs_total");
        registry
            .register(Box::new(eligibility_checks_total.clone()))
            .expect("register eligibility_checks_total");
        registry
            .register(Box::new(eligibility_rule_failures_total.clone()))
            .expect("register eligibility_rule_failures_total");
        registry
            .register(Box::new(available_drivers.clone()))
            .expect("register available_drivers");

        Self {
            registry,
            assignments_total,
            orders_in_queue,
            assignment_latency_seconds,
            auto_assignment_runs_total,
            eligibility_checks_total,
            eligibility_rule_failures_total,
            available_drivers,
        }
    }

    pub fn observe_eligibility(&self, failures: &[RuleFailure]) {
        let verdict = if failures.is_empty() {
            "eligible"
        } else {
            "ineligible"
        };
        self.eligibility_checks_total
            .with_label_values(&[verdict])
            .inc();

        for failure in failures {
            self.eligibility_rule_failures_total
                .with_label_values(&[failure.rule()])
                .inc();
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
