// tabletalk - natural-language question answering over a SQL database
// This exposes the core components for testing and integration

pub mod capabilities;
pub mod config;
pub mod observability;
pub mod pipeline;
pub mod state;
pub mod telemetry;

// Re-export key types for easy access
pub use capabilities::{
    CapabilityError, CapabilitySet, ChartDecision, ChartPlanner, ChartRenderer, QueryOutcome,
    QueryRepairer, QueryRunner, QueryTranslator, ResultExplainer, ScopeValidator,
};
pub use config::TabletalkConfig;
pub use observability::{pipeline_metrics, OperationTimer, PipelineMetrics};
pub use pipeline::{
    PipelineError, RetryController, RetryVerdict, WorkflowCoordinator, DEFAULT_MAX_ATTEMPTS,
};
pub use state::{
    ChartType, Disposition, ScopeVerdict, StageDelta, TerminalState, TransitionRecord, TurnPhase,
    TurnState,
};
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
