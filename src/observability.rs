use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Pipeline usage metrics
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub turns_started: AtomicU64,
    pub turns_answered: AtomicU64,
    pub scope_rejections: AtomicU64,
    pub repairs: AtomicU64,
    pub retry_exhaustions: AtomicU64,
    pub charts_rendered: AtomicU64,
    pub charts_suppressed: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_turn_started(&self) {
        self.turns_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_turn_answered(&self) {
        self.turns_answered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scope_rejection(&self) {
        self.scope_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_repair(&self) {
        self.repairs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry_exhausted(&self) {
        self.retry_exhaustions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chart_rendered(&self) {
        self.charts_rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chart_suppressed(&self) {
        self.charts_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            turns_started: self.turns_started.load(Ordering::Relaxed),
            turns_answered: self.turns_answered.load(Ordering::Relaxed),
            scope_rejections: self.scope_rejections.load(Ordering::Relaxed),
            repairs: self.repairs.load(Ordering::Relaxed),
            retry_exhaustions: self.retry_exhaustions.load(Ordering::Relaxed),
            charts_rendered: self.charts_rendered.load(Ordering::Relaxed),
            charts_suppressed: self.charts_suppressed.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Pipeline metrics: started={}, answered={}, rejected={}, repairs={}, exhausted={}, charts={}, suppressed={}",
            stats.turns_started,
            stats.turns_answered,
            stats.scope_rejections,
            stats.repairs,
            stats.retry_exhaustions,
            stats.charts_rendered,
            stats.charts_suppressed
        );
    }
}

#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub turns_started: u64,
    pub turns_answered: u64,
    pub scope_rejections: u64,
    pub repairs: u64,
    pub retry_exhaustions: u64,
    pub charts_rendered: u64,
    pub charts_suppressed: u64,
}

/// Global metrics instance
static PIPELINE_METRICS: std::sync::LazyLock<PipelineMetrics> =
    std::sync::LazyLock::new(PipelineMetrics::new);

pub fn pipeline_metrics() -> &'static PipelineMetrics {
    &PIPELINE_METRICS
}

/// Time an operation and log its duration on completion.
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
