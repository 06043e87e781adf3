use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Dispatch decisions, labelled "passthrough" or "redirect"
pub static REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sorrypage_requests_total",
            "Requests handled by the gate, by dispatch mode",
        ),
        &["mode"],
    )
    .unwrap()
});

pub static UPSTREAM_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sorrypage_upstream_errors_total",
        "Diverted requests that failed to reach the redirect target",
    )
    .unwrap()
});

pub static REDIRECT_LATENCY: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "sorrypage_redirect_latency_seconds",
            "Time to first byte from the redirect target",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .unwrap()
});

/// Register all metrics with the registry
pub fn register_metrics() {
    REGISTRY.register(Box::new(REQUESTS_TOTAL.clone())).unwrap();
    REGISTRY
        .register(Box::new(UPSTREAM_ERRORS.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(REDIRECT_LATENCY.clone()))
        .unwrap();
}
