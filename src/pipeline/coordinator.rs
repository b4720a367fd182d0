//! The workflow coordinator: a phase-tagged state machine that routes one
//! question through scope checking, query generation, bounded
//! execution/repair retries, concurrent explanation + chart planning, and
//! optional chart rendering.
//!
//! Routing is deterministic: the next phase depends only on the current
//! phase and the shared state's field values. Every reachable terminal
//! carries a populated `final_answer`.

use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

use super::error::PipelineError;
use super::fork_join::explain_and_plan;
use super::retry::{RetryController, RetryVerdict};
use crate::capabilities::{CapabilitySet, ChartDecision, QueryOutcome};
use crate::observability::pipeline_metrics;
use crate::state::{
    Disposition, ScopeVerdict, StageDelta, TerminalState, TransitionRecord, TurnPhase, TurnState,
};
use crate::telemetry::{create_turn_span, generate_correlation_id};

/// Fixed replies for the short-circuit terminals.
pub const GREETING_REPLY: &str =
    "Hello! I can help you analyze the data in this database. \
     Ask me about the tables it holds.";
pub const OUT_OF_SCOPE_REPLY: &str =
    "I can only answer questions about the connected database. \
     Please ask about the data it contains.";

pub fn retry_exhausted_reply(last_error: &str) -> String {
    format!(
        "I could not complete this query after repeated attempts. \
         Last error: {last_error}"
    )
}

/// One coordinator instance may serve many turns, but holds no mutable
/// state across them: every `run` call owns its own state record.
pub struct WorkflowCoordinator {
    capabilities: CapabilitySet,
    retry: RetryController,
}

impl WorkflowCoordinator {
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self {
            capabilities,
            retry: RetryController::default(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry = RetryController::new(max_attempts);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts()
    }

    /// Run one turn. The caller aborting this future cancels every
    /// in-flight stage, including both halves of the fork/join; no terminal
    /// state is emitted for an aborted turn.
    pub async fn run(&self, question: &str) -> Result<TerminalState, PipelineError> {
        if question.trim().is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }

        let correlation_id = generate_correlation_id();
        let span = create_turn_span(&correlation_id);
        self.drive(TurnState::new(question)).instrument(span).await
    }

    async fn drive(&self, mut state: TurnState) -> Result<TerminalState, PipelineError> {
        pipeline_metrics().record_turn_started();
        let mut phase = TurnPhase::ScopeCheck;
        let mut disposition = Disposition::Answered;
        let mut transitions: Vec<TransitionRecord> = Vec::new();

        loop {
            let entered = Instant::now();
            let next = match phase {
                TurnPhase::ScopeCheck => self.scope_check(&mut state, &mut disposition).await?,
                TurnPhase::Generating => self.generate(&mut state).await?,
                TurnPhase::Executing => self.execute(&mut state, &mut disposition).await?,
                TurnPhase::Repairing => self.repair(&mut state).await?,
                TurnPhase::Analyzing => self.analyze(&mut state).await?,
                TurnPhase::Charting => self.chart(&mut state).await?,
                TurnPhase::Done => break,
            };

            let record = TransitionRecord {
                from: phase,
                to: next,
                at: Utc::now(),
                duration_ms: entered.elapsed().as_millis() as u64,
            };
            debug!(
                from = ?record.from,
                to = ?record.to,
                duration_ms = record.duration_ms,
                "phase transition"
            );
            transitions.push(record);
            phase = next;
        }

        let Some(final_answer) = state.final_answer.clone() else {
            return Err(PipelineError::Invariant(
                "final answer missing at terminal state",
            ));
        };

        if disposition == Disposition::Answered {
            pipeline_metrics().record_turn_answered();
        }
        info!(
            disposition = ?disposition,
            attempts = state.attempt_count,
            transitions = transitions.len(),
            "turn complete"
        );

        Ok(TerminalState {
            disposition,
            final_answer,
            query: state.query,
            query_result: state.query_result,
            error: state.error,
            attempt_count: state.attempt_count,
            needs_chart: state.needs_chart,
            chart_type: state.chart_type,
            chart_payload: state.chart_payload,
            transitions,
        })
    }

    async fn scope_check(
        &self,
        state: &mut TurnState,
        disposition: &mut Disposition,
    ) -> Result<TurnPhase, PipelineError> {
        let verdict = self
            .capabilities
            .scope
            .classify(&state.question)
            .await
            .map_err(|e| PipelineError::capability("scope-validator", e))?;

        match verdict {
            ScopeVerdict::InScope => {
                state.apply(StageDelta {
                    is_in_scope: Some(true),
                    ..Default::default()
                });
                Ok(TurnPhase::Generating)
            }
            ScopeVerdict::Greeting => {
                pipeline_metrics().record_scope_rejection();
                *disposition = Disposition::Greeting;
                state.apply(StageDelta {
                    is_in_scope: Some(false),
                    final_answer: Some(GREETING_REPLY.to_string()),
                    ..Default::default()
                });
                Ok(TurnPhase::Done)
            }
            ScopeVerdict::OutOfScope => {
                pipeline_metrics().record_scope_rejection();
                *disposition = Disposition::OutOfScope;
                state.apply(StageDelta {
                    is_in_scope: Some(false),
                    final_answer: Some(OUT_OF_SCOPE_REPLY.to_string()),
                    ..Default::default()
                });
                Ok(TurnPhase::Done)
            }
        }
    }

    async fn generate(&self, state: &mut TurnState) -> Result<TurnPhase, PipelineError> {
        let query = self
            .capabilities
            .translator
            .translate(&state.question)
            .await
            .map_err(|e| PipelineError::capability("query-translator", e))?;

        debug!(query = %query, "generated query");
        state.apply(StageDelta {
            query: Some(query),
            ..Default::default()
        });
        Ok(TurnPhase::Executing)
    }

    async fn execute(
        &self,
        state: &mut TurnState,
        disposition: &mut Disposition,
    ) -> Result<TurnPhase, PipelineError> {
        // Each attempt starts from a clean slate: no stale result or error
        // from a prior attempt may leak into this one.
        state.begin_attempt();
        let Some(query) = state.query.clone() else {
            return Err(PipelineError::Invariant("query missing before execution"));
        };

        let outcome = self
            .capabilities
            .runner
            .run(&query)
            .await
            .map_err(|e| PipelineError::capability("query-runner", e))?;

        match outcome {
            QueryOutcome::Rows(rows) => {
                state.apply(StageDelta {
                    query_result: Some(rows),
                    ..Default::default()
                });
                Ok(TurnPhase::Analyzing)
            }
            QueryOutcome::Failed(message) => {
                warn!(
                    attempt = state.attempt_count,
                    error = %message,
                    "query execution failed"
                );
                state.apply(StageDelta {
                    error: Some(message),
                    ..Default::default()
                });

                match self.retry.on_failed_attempt(state) {
                    RetryVerdict::Repair => Ok(TurnPhase::Repairing),
                    RetryVerdict::Exhausted => {
                        pipeline_metrics().record_retry_exhausted();
                        *disposition = Disposition::RetryExhausted;
                        let last_error = state.error.clone().unwrap_or_default();
                        state.apply(StageDelta {
                            final_answer: Some(retry_exhausted_reply(&last_error)),
                            ..Default::default()
                        });
                        Ok(TurnPhase::Done)
                    }
                }
            }
        }
    }

    async fn repair(&self, state: &mut TurnState) -> Result<TurnPhase, PipelineError> {
        pipeline_metrics().record_repair();
        let (Some(query), Some(error)) = (state.query.clone(), state.error.clone()) else {
            return Err(PipelineError::Invariant(
                "repair entered without a failed query",
            ));
        };

        let replacement = self
            .capabilities
            .repairer
            .repair(&query, &error)
            .await
            .map_err(|e| PipelineError::capability("query-repairer", e))?;

        debug!(query = %replacement, "repaired query");
        state.apply(StageDelta {
            query: Some(replacement),
            ..Default::default()
        });
        Ok(TurnPhase::Executing)
    }

    async fn analyze(&self, state: &mut TurnState) -> Result<TurnPhase, PipelineError> {
        let Some(result) = state.query_result.clone() else {
            return Err(PipelineError::Invariant(
                "analysis entered without a query result",
            ));
        };

        let outcome = explain_and_plan(
            &self.capabilities.explainer,
            &self.capabilities.planner,
            &state.question,
            &result,
        )
        .await?;

        if outcome.planner_degraded {
            pipeline_metrics().record_chart_suppressed();
        }

        let mut delta = StageDelta {
            final_answer: Some(outcome.explanation),
            ..Default::default()
        };
        match outcome.decision {
            ChartDecision::Chart(chart_type) => {
                delta.needs_chart = Some(true);
                delta.chart_type = Some(chart_type);
                state.apply(delta);
                Ok(TurnPhase::Charting)
            }
            ChartDecision::NoChart => {
                delta.needs_chart = Some(false);
                state.apply(delta);
                Ok(TurnPhase::Done)
            }
        }
    }

    async fn chart(&self, state: &mut TurnState) -> Result<TurnPhase, PipelineError> {
        let (Some(result), Some(chart_type)) = (state.query_result.clone(), state.chart_type)
        else {
            return Err(PipelineError::Invariant(
                "charting entered without a result and chart type",
            ));
        };

        match self
            .capabilities
            .renderer
            .render(&result, chart_type, &state.question)
            .await
        {
            Ok(payload) => {
                pipeline_metrics().record_chart_rendered();
                state.apply(StageDelta {
                    chart_payload: Some(payload),
                    ..Default::default()
                });
            }
            Err(error) => {
                // Chart faults never fail the turn; the answer ships bare.
                warn!(error = %error, "chart rendering failed, suppressing chart");
                pipeline_metrics().record_chart_suppressed();
            }
        }
        Ok(TurnPhase::Done)
    }
}
