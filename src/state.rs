use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chart families the planner may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Scatter,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
            ChartType::Scatter => "scatter",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bar" => Some(ChartType::Bar),
            "line" => Some(ChartType::Line),
            "pie" => Some(ChartType::Pie),
            "scatter" => Some(ChartType::Scatter),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guardrail verdict for an incoming question. Greetings get their own
/// fixed reply but otherwise follow the same short-circuit path as
/// out-of-scope questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeVerdict {
    InScope,
    Greeting,
    OutOfScope,
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    Answered,
    Greeting,
    OutOfScope,
    RetryExhausted,
}

/// Pipeline phase for one turn. Routing is driven by this tag rather than
/// inferred from field presence, so invalid combinations (a chart phase
/// without a chart type, an analysis phase without a result) are
/// unreachable by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    ScopeCheck,
    Generating,
    Executing,
    Repairing,
    Analyzing,
    Charting,
    Done,
}

/// Audit record for a single phase transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: TurnPhase,
    pub to: TurnPhase,
    pub at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// The shared state record for one turn.
///
/// Created by the coordinator with only `question` populated. Stages never
/// mutate it directly; each stage returns a [`StageDelta`] covering only the
/// fields it owns and the coordinator applies it. The record is exclusively
/// owned by one in-flight turn and is frozen into a [`TerminalState`] when
/// the turn completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnState {
    pub question: String,
    pub is_in_scope: Option<bool>,
    pub query: Option<String>,
    pub query_result: Option<String>,
    pub error: Option<String>,
    pub attempt_count: u32,
    pub needs_chart: Option<bool>,
    pub chart_type: Option<ChartType>,
    pub chart_payload: Option<String>,
    pub final_answer: Option<String>,
}

impl TurnState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            is_in_scope: None,
            query: None,
            query_result: None,
            error: None,
            attempt_count: 0,
            needs_chart: None,
            chart_type: None,
            chart_payload: None,
            final_answer: None,
        }
    }

    /// Apply a stage's partial update. `None` fields are left untouched.
    pub fn apply(&mut self, delta: StageDelta) {
        if let Some(v) = delta.is_in_scope {
            self.is_in_scope = Some(v);
        }
        if let Some(v) = delta.query {
            self.query = Some(v);
        }
        if let Some(v) = delta.query_result {
            self.query_result = Some(v);
        }
        if let Some(v) = delta.error {
            self.error = Some(v);
        }
        if let Some(v) = delta.needs_chart {
            self.needs_chart = Some(v);
        }
        if let Some(v) = delta.chart_type {
            self.chart_type = Some(v);
        }
        if let Some(v) = delta.chart_payload {
            self.chart_payload = Some(v);
        }
        if let Some(v) = delta.final_answer {
            self.final_answer = Some(v);
        }
    }

    /// Clear the prior attempt's outcome before re-executing so a repaired
    /// query never observes stale results or a stale error.
    pub fn begin_attempt(&mut self) {
        self.error = None;
        self.query_result = None;
    }
}

/// Partial state update produced by one stage. Every field a stage does not
/// own stays `None`; the coordinator is the only writer of `TurnState`.
#[derive(Debug, Default, Clone)]
pub struct StageDelta {
    pub is_in_scope: Option<bool>,
    pub query: Option<String>,
    pub query_result: Option<String>,
    pub error: Option<String>,
    pub needs_chart: Option<bool>,
    pub chart_type: Option<ChartType>,
    pub chart_payload: Option<String>,
    pub final_answer: Option<String>,
}

/// Immutable snapshot returned to the caller once a turn terminates.
/// `final_answer` is populated on every reachable path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalState {
    pub disposition: Disposition,
    pub final_answer: String,
    pub query: Option<String>,
    pub query_result: Option<String>,
    pub error: Option<String>,
    pub attempt_count: u32,
    pub needs_chart: Option<bool>,
    pub chart_type: Option<ChartType>,
    pub chart_payload: Option<String>,
    pub transitions: Vec<TransitionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_application_leaves_unset_fields_alone() {
        let mut state = TurnState::new("how many orders?");
        state.apply(StageDelta {
            is_in_scope: Some(true),
            ..Default::default()
        });
        state.apply(StageDelta {
            query: Some("SELECT COUNT(*) FROM orders".to_string()),
            ..Default::default()
        });

        assert_eq!(state.is_in_scope, Some(true));
        assert_eq!(state.query.as_deref(), Some("SELECT COUNT(*) FROM orders"));
        assert!(state.query_result.is_none());
        assert!(state.final_answer.is_none());
        assert_eq!(state.attempt_count, 0);
    }

    #[test]
    fn begin_attempt_clears_prior_outcome() {
        let mut state = TurnState::new("q");
        state.apply(StageDelta {
            query_result: Some("[(1,)]".to_string()),
            error: Some("no such column".to_string()),
            ..Default::default()
        });

        state.begin_attempt();

        assert!(state.query_result.is_none());
        assert!(state.error.is_none());
    }

    #[test]
    fn chart_type_round_trips_through_names() {
        for ty in [
            ChartType::Bar,
            ChartType::Line,
            ChartType::Pie,
            ChartType::Scatter,
        ] {
            assert_eq!(ChartType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(ChartType::parse("histogram"), None);
    }
}
