// Private module declaration
mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGaugeVec, Opts, Registry,
};

use crate::models::UnavailableReason;

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Device registration and termination per group
// - Readings recorded by device actors
// - Group query throughput, latency and unavailable outcomes
// - Requests dropped because they were routed to the wrong group
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Registry Metrics
    pub devices_registered: IntCounterVec,
    pub devices_active: IntGaugeVec,
    pub device_terminations: IntCounterVec,
    pub routing_mismatches: IntCounter,

    // Device Metrics
    pub readings_recorded: IntCounter,

    // Group Query Metrics
    pub group_queries: IntCounterVec,
    pub group_query_duration: HistogramVec,
    pub query_unavailable: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Registry Metrics
        let devices_registered = IntCounterVec::new(
            Opts::new("devices_registered_total", "Total device actors created"),
            &["group"],
        )?;
        registry.register(Box::new(devices_registered.clone()))?;

        let devices_active = IntGaugeVec::new(
            Opts::new("devices_active", "Device actors currently mapped in a group"),
            &["group"],
        )?;
        registry.register(Box::new(devices_active.clone()))?;

        let device_terminations = IntCounterVec::new(
            Opts::new("device_terminations_total", "Device actor terminations observed by a group"),
            &["group"],
        )?;
        registry.register(Box::new(device_terminations.clone()))?;

        let routing_mismatches = IntCounter::new(
            "routing_mismatches_total",
            "Requests dropped because they named a group the receiver does not own",
        )?;
        registry.register(Box::new(routing_mismatches.clone()))?;

        // Device Metrics
        let readings_recorded = IntCounter::new(
            "readings_recorded_total",
            "Total readings recorded by device actors",
        )?;
        registry.register(Box::new(readings_recorded.clone()))?;

        // Group Query Metrics
        let group_queries = IntCounterVec::new(
            Opts::new("group_queries_total", "Total group queries completed"),
            &["group"],
        )?;
        registry.register(Box::new(group_queries.clone()))?;

        let group_query_duration = HistogramVec::new(
            HistogramOpts::new("group_query_duration_seconds", "Group query duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 3.0, 10.0]),
            &["group"],
        )?;
        registry.register(Box::new(group_query_duration.clone()))?;

        let query_unavailable = IntCounterVec::new(
            Opts::new("query_unavailable_total", "Devices resolved to unavailable in group queries"),
            &["group", "reason"],
        )?;
        registry.register(Box::new(query_unavailable.clone()))?;

        Ok(Self {
            registry,
            devices_registered,
            devices_active,
            device_terminations,
            routing_mismatches,
            readings_recorded,
            group_queries,
            group_query_duration,
            query_unavailable,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a newly created device actor
    pub fn record_device_registered(&self, group: &str, active: usize) {
        self.devices_registered.with_label_values(&[group]).inc();
        self.devices_active.with_label_values(&[group]).set(active as i64);
    }

    /// Helper to record an observed device termination
    pub fn record_device_terminated(&self, group: &str, active: usize) {
        self.device_terminations.with_label_values(&[group]).inc();
        self.devices_active.with_label_values(&[group]).set(active as i64);
    }

    /// Helper to record a request dropped by routing
    pub fn record_routing_mismatch(&self) {
        self.routing_mismatches.inc();
    }

    /// Helper to record a stored reading
    pub fn record_reading(&self) {
        self.readings_recorded.inc();
    }

    /// Helper to record a completed group query
    pub fn record_group_query(&self, group: &str, duration_secs: f64) {
        self.group_queries.with_label_values(&[group]).inc();
        self.group_query_duration.with_label_values(&[group]).observe(duration_secs);
    }

    /// Helper to record a device that resolved to unavailable
    pub fn record_unavailable(&self, group: &str, reason: UnavailableReason) {
        self.query_unavailable
            .with_label_values(&[group, reason.as_str()])
            .inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
