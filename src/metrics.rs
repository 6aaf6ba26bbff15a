//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub cosign_requests: IntCounter,
    pub cosign_success: IntCounter,
    pub cosign_failed: IntCounter,
    pub cosign_failures_by_kind: IntCounterVec,
    pub balance_rejections: IntCounter,
    pub submit_retries: IntCounter,
    pub swaps_prepared: IntCounter,

    // Gauges
    pub cosign_in_flight: IntGauge,
    pub fee_payer_balance: IntGauge,

    // Histograms
    pub cosign_latency: Histogram,
    pub confirm_latency: Histogram,
    pub assemble_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let cosign_requests = IntCounter::with_opts(Opts::new(
            "cosign_requests_total",
            "Total number of co-sign requests received",
        ))?;

        let cosign_success = IntCounter::with_opts(Opts::new(
            "cosign_success_total",
            "Number of co-signed transactions confirmed on-chain",
        ))?;

        let cosign_failed = IntCounter::with_opts(Opts::new(
            "cosign_failed_total",
            "Number of co-sign requests that ended in failure",
        ))?;

        let cosign_failures_by_kind = IntCounterVec::new(
            Opts::new("cosign_failures_by_kind_total", "Co-sign failures by error kind"),
            &["kind"],
        )?;

        let balance_rejections = IntCounter::with_opts(Opts::new(
            "fee_payer_balance_rejections_total",
            "Requests refused because the fee payer was below the minimum balance",
        ))?;

        let submit_retries = IntCounter::with_opts(Opts::new(
            "submit_retries_total",
            "Submission attempts retried after transient network errors",
        ))?;

        let swaps_prepared = IntCounter::with_opts(Opts::new(
            "swaps_prepared_total",
            "Number of gasless swap transactions assembled",
        ))?;

        let cosign_in_flight = IntGauge::with_opts(Opts::new(
            "cosign_in_flight",
            "Co-sign requests currently being processed",
        ))?;

        let fee_payer_balance = IntGauge::with_opts(Opts::new(
            "fee_payer_balance_lamports",
            "Last observed fee-payer balance",
        ))?;

        let cosign_latency = Histogram::with_opts(
            HistogramOpts::new("cosign_latency_seconds", "End-to-end co-sign latency")
                .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;

        let confirm_latency = Histogram::with_opts(
            HistogramOpts::new("confirm_latency_seconds", "Time from submission to confirmation")
                .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;

        let assemble_latency = Histogram::with_opts(
            HistogramOpts::new("assemble_latency_seconds", "Transaction assembly latency")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]),
        )?;

        // Register all metrics
        registry.register(Box::new(cosign_requests.clone()))?;
        registry.register(Box::new(cosign_success.clone()))?;
        registry.register(Box::new(cosign_failed.clone()))?;
        registry.register(Box::new(cosign_failures_by_kind.clone()))?;
        registry.register(Box::new(balance_rejections.clone()))?;
        registry.register(Box::new(submit_retries.clone()))?;
        registry.register(Box::new(swaps_prepared.clone()))?;
        registry.register(Box::new(cosign_in_flight.clone()))?;
        registry.register(Box::new(fee_payer_balance.clone()))?;
        registry.register(Box::new(cosign_latency.clone()))?;
        registry.register(Box::new(confirm_latency.clone()))?;
        registry.register(Box::new(assemble_latency.clone()))?;

        Ok(Self {
            registry,
            cosign_requests,
            cosign_success,
            cosign_failed,
            cosign_failures_by_kind,
            balance_rejections,
            submit_retries,
            swaps_prepared,
            cosign_in_flight,
            fee_payer_balance,
            cosign_latency,
            confirm_latency,
            assemble_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a failed co-sign request under its error kind
    pub fn record_failure(&self, kind: &str) {
        self.cosign_failed.inc();
        self.cosign_failures_by_kind.with_label_values(&[kind]).inc();
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the in-flight gauge raised for as long as it lives
pub struct InFlightGuard<'a> {
    gauge: &'a IntGauge,
}

impl<'a> InFlightGuard<'a> {
    pub fn new(gauge: &'a IntGauge) -> Self {
        gauge.inc();
        Self { gauge }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}
