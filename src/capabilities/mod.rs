// Capability interfaces for the external collaborators the pipeline routes
// between. Each trait covers exactly one stage's dependency, which keeps the
// coordinator testable against scripted doubles.

pub mod chart;
pub mod ollama;
pub mod scripted;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::state::{ChartType, ScopeVerdict};

/// Failure of an external collaborator itself. A *bad query* is not a
/// capability error — the runner reports that as [`QueryOutcome::Failed`]
/// and the retry controller handles it.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("model backend request failed: {0}")]
    Backend(#[from] reqwest::Error),

    #[error("datastore unavailable: {0}")]
    Datastore(#[from] sqlx::Error),

    #[error("malformed capability response: {0}")]
    Malformed(String),

    #[error("{0}")]
    Unavailable(String),
}

/// Result of running a query: either rendered rows or the store's error
/// text for a query it rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Rows(String),
    Failed(String),
}

/// Chart planner output. A chart decision always carries its type, so
/// "needs a chart but of no particular kind" is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartDecision {
    NoChart,
    Chart(ChartType),
}

#[async_trait]
pub trait ScopeValidator: Send + Sync {
    async fn classify(&self, question: &str) -> Result<ScopeVerdict, CapabilityError>;
}

#[async_trait]
pub trait QueryTranslator: Send + Sync {
    /// Translate a natural-language question into a candidate SQL query.
    /// Schema context is owned by the implementation.
    async fn translate(&self, question: &str) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Execute a query. Returns `Err` only when the store itself is
    /// unavailable; a rejected query comes back as `QueryOutcome::Failed`.
    async fn run(&self, query: &str) -> Result<QueryOutcome, CapabilityError>;
}

#[async_trait]
pub trait QueryRepairer: Send + Sync {
    /// Produce a replacement query from the immediately preceding attempt's
    /// query and error text.
    async fn repair(&self, prior_query: &str, error: &str) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait ResultExplainer: Send + Sync {
    async fn explain(&self, question: &str, result: &str) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait ChartPlanner: Send + Sync {
    async fn plan(&self, question: &str, result: &str) -> Result<ChartDecision, CapabilityError>;
}

#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render(
        &self,
        result: &str,
        chart_type: ChartType,
        title: &str,
    ) -> Result<String, CapabilityError>;
}

/// The full collaborator set one coordinator instance routes between.
#[derive(Clone)]
pub struct CapabilitySet {
    pub scope: Arc<dyn ScopeValidator>,
    pub translator: Arc<dyn QueryTranslator>,
    pub runner: Arc<dyn QueryRunner>,
    pub repairer: Arc<dyn QueryRepairer>,
    pub explainer: Arc<dyn ResultExplainer>,
    pub planner: Arc<dyn ChartPlanner>,
    pub renderer: Arc<dyn ChartRenderer>,
}
