use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Initialize structured logging. JSON output carries span context and
/// correlation IDs so turns can be traced end to end.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));

    if config.json_logs {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }

    tracing::info!("tabletalk telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking one turn's log lines.
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering a single question/answer turn.
pub fn create_turn_span(correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "turn",
        correlation.id = correlation_id,
        otel.kind = "internal"
    )
}

/// Shutdown telemetry gracefully.
pub fn shutdown_telemetry() {
    tracing::info!("tabletalk telemetry shutdown complete");
}
