//! Prometheus metrics for the intake and reconciliation pipeline.
//!
//! Each [`ServiceMetrics`] owns its registry, so tests can build as many
//! instances as they like without metric-name collisions in a global
//! registry.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Pipeline metrics exposed on `/metrics`.
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    // Intake
    pub events_received_total: IntCounter,
    pub events_duplicate_total: IntCounter,
    pub events_deferred_total: IntCounter,
    pub events_ignored_total: IntCounter,
    pub signature_failures_total: IntCounter,
    pub webhook_duration_seconds: Histogram,

    // Pipeline health
    pub events_quarantined_total: IntCounter,
    pub queue_processor_active: IntGauge,

    // Reconciliation
    pub reconciliation_runs_total: IntCounter,
    pub reconciliation_failures_total: IntCounter,
    pub discrepancies_found_total: IntCounter,
    pub discrepancies_resolved_total: IntCounter,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let events_received_total = IntCounter::with_opts(Opts::new(
            "events_received_total",
            "Webhook deliveries accepted past signature verification",
        ))?;
        let events_duplicate_total = IntCounter::with_opts(Opts::new(
            "events_duplicate_total",
            "Deliveries short-circuited as duplicates",
        ))?;
        let events_deferred_total = IntCounter::with_opts(Opts::new(
            "events_deferred_total",
            "Deliveries acknowledged with processing deferred to the queue",
        ))?;
        let events_ignored_total = IntCounter::with_opts(Opts::new(
            "events_ignored_total",
            "Deliveries with unroutable topics acknowledged as no-ops",
        ))?;
        let signature_failures_total = IntCounter::with_opts(Opts::new(
            "signature_failures_total",
            "Deliveries rejected for signature verification failure",
        ))?;
        let webhook_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "webhook_duration_seconds",
                "Inline webhook processing time",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0]),
        )?;
        let events_quarantined_total = IntCounter::with_opts(Opts::new(
            "events_quarantined_total",
            "Events quarantined after exhausting the retry ceiling",
        ))?;
        let queue_processor_active = IntGauge::with_opts(Opts::new(
            "queue_processor_active",
            "Whether the queue processor loop is running",
        ))?;
        let reconciliation_runs_total = IntCounter::with_opts(Opts::new(
            "reconciliation_runs_total",
            "Reconciliation runs started",
        ))?;
        let reconciliation_failures_total = IntCounter::with_opts(Opts::new(
            "reconciliation_failures_total",
            "Reconciliation runs closed as failed",
        ))?;
        let discrepancies_found_total = IntCounter::with_opts(Opts::new(
            "discrepancies_found_total",
            "New discrepancies opened by reconciliation runs",
        ))?;
        let discrepancies_resolved_total = IntCounter::with_opts(Opts::new(
            "discrepancies_resolved_total",
            "Discrepancies resolved automatically or by operators",
        ))?;

        registry.register(Box::new(events_received_total.clone()))?;
        registry.register(Box::new(events_duplicate_total.clone()))?;
        registry.register(Box::new(events_deferred_total.clone()))?;
        registry.register(Box::new(events_ignored_total.clone()))?;
        registry.register(Box::new(signature_failures_total.clone()))?;
        registry.register(Box::new(webhook_duration_seconds.clone()))?;
        registry.register(Box::new(events_quarantined_total.clone()))?;
        registry.register(Box::new(queue_processor_active.clone()))?;
        registry.register(Box::new(reconciliation_runs_total.clone()))?;
        registry.register(Box::new(reconciliation_failures_total.clone()))?;
        registry.register(Box::new(discrepancies_found_total.clone()))?;
        registry.register(Box::new(discrepancies_resolved_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            events_received_total,
            events_duplicate_total,
            events_deferred_total,
            events_ignored_total,
            signature_failures_total,
            webhook_duration_seconds,
            events_quarantined_total,
            queue_processor_active,
            reconciliation_runs_total,
            reconciliation_failures_total,
            discrepancies_found_total,
            discrepancies_resolved_total,
        }))
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        encoder.encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
