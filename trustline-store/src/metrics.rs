//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `trust_lines_upserted_total` - Rows written by batch upserts
//! - `trust_lines_removed_total` - Rows deleted
//! - `trust_lines_rejected_batches_total` - Batches refused before writing
//! - `trust_lines_batch_size` - Histogram of upsert batch sizes
//! - `trust_lines_upsert_duration_seconds` - Histogram of upsert latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Rows written by upserts
    pub upserted_total: IntCounter,

    /// Rows removed
    pub removed_total: IntCounter,

    /// Batches rejected before any write
    pub rejected_batches_total: IntCounter,

    /// Batch size histogram
    pub batch_size: Histogram,

    /// Upsert duration histogram
    pub upsert_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("upserted_total", &self.upserted_total.get())
            .field("removed_total", &self.removed_total.get())
            .field("rejected_batches_total", &self.rejected_batches_total.get())
            .finish()
    }
}

impl Metrics {
    /// Create new metrics collector on its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let upserted_total = IntCounter::new(
            "trust_lines_upserted_total",
            "Rows written by batch upserts",
        )?;
        registry.register(Box::new(upserted_total.clone()))?;

        let removed_total = IntCounter::new("trust_lines_removed_total", "Rows deleted")?;
        registry.register(Box::new(removed_total.clone()))?;

        let rejected_batches_total = IntCounter::new(
            "trust_lines_rejected_batches_total",
            "Batches refused before writing",
        )?;
        registry.register(Box::new(rejected_batches_total.clone()))?;

        let batch_size = Histogram::with_opts(
            HistogramOpts::new("trust_lines_batch_size", "Histogram of upsert batch sizes")
                .buckets(vec![1.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0]),
        )?;
        registry.register(Box::new(batch_size.clone()))?;

        let upsert_duration = Histogram::with_opts(
            HistogramOpts::new(
                "trust_lines_upsert_duration_seconds",
                "Histogram of upsert latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(upsert_duration.clone()))?;

        Ok(Self {
            upserted_total,
            removed_total,
            rejected_batches_total,
            batch_size,
            upsert_duration,
            registry,
        })
    }

    /// Record a committed upsert batch
    pub fn record_upsert(&self, rows: usize, duration_seconds: f64) {
        self.upserted_total.inc_by(rows as u64);
        self.batch_size.observe(rows as f64);
        self.upsert_duration.observe(duration_seconds);
    }

    /// Record deleted rows
    pub fn record_removed(&self, rows: u64) {
        self.removed_total.inc_by(rows);
    }

    /// Record a batch refused before writing
    pub fn record_rejected_batch(&self) {
        self.rejected_batches_total.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
