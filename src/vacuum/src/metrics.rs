//! Vacuuming metrics
//!
//! Thread-safe counters shared between the service and the scheduling loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::report::VacuumReport;

/// Thread-safe metrics for tracking vacuuming passes
#[derive(Debug, Clone, Default)]
pub struct VacuumMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    passes_completed: AtomicUsize,
    statements_applied: AtomicUsize,
    statements_failed: AtomicUsize,
    statements_skipped: AtomicUsize,
    rows_affected: AtomicU64,
    feedback_emitted: AtomicUsize,
    /// Triggers rejected because a pass was already running.
    passes_rejected: AtomicUsize,
    /// Ticks that failed before producing a report.
    passes_errored: AtomicUsize,
    total_duration_ms: AtomicU64,
}

impl VacuumMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished pass into the counters.
    pub fn record_report(&self, report: &VacuumReport) {
        let inner = &self.inner;
        inner.passes_completed.fetch_add(1, Ordering::Relaxed);
        inner
            .statements_applied
            .fetch_add(report.applied(), Ordering::Relaxed);
        inner
            .statements_failed
            .fetch_add(report.failed(), Ordering::Relaxed);
        inner
            .statements_skipped
            .fetch_add(report.skipped(), Ordering::Relaxed);
        inner
            .rows_affected
            .fetch_add(report.rows_affected(), Ordering::Relaxed);
        inner
            .feedback_emitted
            .fetch_add(report.feedback.len(), Ordering::Relaxed);

        let duration_ms = (report.completed_at - report.started_at)
            .num_milliseconds()
            .max(0) as u64;
        inner
            .total_duration_ms
            .fetch_add(duration_ms, Ordering::Relaxed);
    }

    pub fn record_pass_rejected(&self) {
        self.inner.passes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pass_errored(&self) {
        self.inner.passes_errored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn passes_completed(&self) -> usize {
        self.inner.passes_completed.load(Ordering::Relaxed)
    }

    pub fn statements_applied(&self) -> usize {
        self.inner.statements_applied.load(Ordering::Relaxed)
    }

    pub fn statements_failed(&self) -> usize {
        self.inner.statements_failed.load(Ordering::Relaxed)
    }

    pub fn statements_skipped(&self) -> usize {
        self.inner.statements_skipped.load(Ordering::Relaxed)
    }

    pub fn rows_affected(&self) -> u64 {
        self.inner.rows_affected.load(Ordering::Relaxed)
    }

    pub fn feedback_emitted(&self) -> usize {
        self.inner.feedback_emitted.load(Ordering::Relaxed)
    }

    pub fn passes_rejected(&self) -> usize {
        self.inner.passes_rejected.load(Ordering::Relaxed)
    }

    pub fn passes_errored(&self) -> usize {
        self.inner.passes_errored.load(Ordering::Relaxed)
    }

    /// Average pass duration in milliseconds
    pub fn avg_duration_ms(&self) -> f64 {
        let passes = self.passes_completed();
        if passes == 0 {
            return 0.0;
        }
        self.inner.total_duration_ms.load(Ordering::Relaxed) as f64 / passes as f64
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            passes_completed: self.passes_completed(),
            passes_rejected: self.passes_rejected(),
            passes_errored: self.passes_errored(),
            statements_applied: self.statements_applied(),
            statements_failed: self.statements_failed(),
            statements_skipped: self.statements_skipped(),
            rows_affected: self.rows_affected(),
            feedback_emitted: self.feedback_emitted(),
            avg_duration_ms: self.avg_duration_ms(),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub passes_completed: usize,
    pub passes_rejected: usize,
    pub passes_errored: usize,
    pub statements_applied: usize,
    pub statements_failed: usize,
    pub statements_skipped: usize,
    pub rows_affected: u64,
    pub feedback_emitted: usize,
    pub avg_duration_ms: f64,
}

impl MetricsSummary {
    /// Log the metrics summary
    pub fn log(&self) {
        tracing::info!("=== Vacuuming Metrics Summary ===");
        tracing::info!(
            "Passes: {} completed, {} rejected (in flight), {} errored",
            self.passes_completed,
            self.passes_rejected,
            self.passes_errored
        );
        tracing::info!(
            "Statements: {} applied, {} failed, {} skipped ({} rows)",
            self.statements_applied,
            self.statements_failed,
            self.statements_skipped,
            self.rows_affected
        );
        tracing::info!("Feedback: {} diagnostics", self.feedback_emitted);
        tracing::info!("Average pass duration: {:.2} ms", self.avg_duration_ms);
    }
}
