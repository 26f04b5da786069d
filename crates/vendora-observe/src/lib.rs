//! Vendora Observe - Metrics abstraction and tracing lifecycle
//!
//! No global metrics singletons: every component takes an
//! `Arc<dyn MetricsSink>` so tests can read what production emits. Tracing
//! has an explicit process-wide lifecycle: init at startup, flush at
//! shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;

use dashmap::DashMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Counter/histogram abstraction injected into each component
pub trait MetricsSink: Send + Sync {
    /// Increment a named counter
    fn incr_counter(&self, name: &str, n: u64);

    /// Record one observation of a named value
    fn observe(&self, name: &str, value: f64);
}

/// Sink that drops everything
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn incr_counter(&self, _name: &str, _n: u64) {}
    fn observe(&self, _name: &str, _value: f64) {}
}

/// In-memory sink, readable in tests
#[derive(Debug, Default)]
pub struct MemoryMetrics {
    counters: DashMap<String, AtomicU64>,
    observations: DashMap<String, Vec<f64>>,
}

impl MemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, zero if never incremented
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// All recorded observations for a name
    pub fn observations(&self, name: &str) -> Vec<f64> {
        self.observations
            .get(name)
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

impl MetricsSink for MemoryMetrics {
    fn incr_counter(&self, name: &str, n: u64) {
        self.counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(n, Ordering::Relaxed);
    }

    fn observe(&self, name: &str, value: f64) {
        self.observations
            .entry(name.to_string())
            .or_default()
            .push(value);
    }
}

static TRACING_INIT: Once = Once::new();

/// Install the env-filter subscriber once per process
///
/// Respects `RUST_LOG`; defaults to `info`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
        info!("tracing initialized");
    });
}

/// Explicit flush point at shutdown
///
/// The fmt subscriber writes synchronously, so this only marks the boundary
/// in the log stream.
pub fn shutdown_tracing() {
    info!("tracing shut down");
}
