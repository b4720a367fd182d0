use std::sync::Arc;
use tracing::warn;

use super::error::PipelineError;
use crate::capabilities::{ChartDecision, ChartPlanner, ResultExplainer};

/// Joined output of the two post-execution branches.
#[derive(Debug)]
pub(crate) struct AnalysisOutcome {
    pub explanation: String,
    pub decision: ChartDecision,
    pub planner_degraded: bool,
}

/// Run result explanation and chart planning concurrently and join both
/// before returning.
///
/// Both branches are pure functions of `(question, result)` and neither
/// reads a field the other writes. They are child futures of the turn, so
/// cancelling the turn cancels them together and no partial result is
/// observable outside the join. The failure policy is asymmetric: no answer
/// exists without an explanation, so explainer failure is fatal; planner
/// failure degrades to "no chart".
pub(crate) async fn explain_and_plan(
    explainer: &Arc<dyn ResultExplainer>,
    planner: &Arc<dyn ChartPlanner>,
    question: &str,
    result: &str,
) -> Result<AnalysisOutcome, PipelineError> {
    let (explained, planned) = tokio::join!(
        explainer.explain(question, result),
        planner.plan(question, result),
    );

    let explanation =
        explained.map_err(|e| PipelineError::capability("result-explainer", e))?;
    let (decision, planner_degraded) = match planned {
        Ok(decision) => (decision, false),
        Err(error) => {
            warn!(error = %error, "chart planner failed, continuing without a chart");
            (ChartDecision::NoChart, true)
        }
    };

    Ok(AnalysisOutcome {
        explanation,
        decision,
        planner_degraded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::scripted::{ScriptedExplainer, ScriptedPlanner};
    use crate::state::ChartType;

    #[tokio::test]
    async fn joins_both_branches() {
        let explainer: Arc<dyn ResultExplainer> = Arc::new(ScriptedExplainer::echoing());
        let planner: Arc<dyn ChartPlanner> = Arc::new(ScriptedPlanner::chart(ChartType::Bar));

        let outcome = explain_and_plan(&explainer, &planner, "q", "[('a', 1), ('b', 2)]")
            .await
            .expect("joined");

        assert!(outcome.explanation.contains("[('a', 1), ('b', 2)]"));
        assert_eq!(outcome.decision, ChartDecision::Chart(ChartType::Bar));
        assert!(!outcome.planner_degraded);
    }

    #[tokio::test]
    async fn planner_failure_degrades_to_no_chart() {
        let explainer: Arc<dyn ResultExplainer> = Arc::new(ScriptedExplainer::echoing());
        let planner: Arc<dyn ChartPlanner> = Arc::new(ScriptedPlanner::failing());

        let outcome = explain_and_plan(&explainer, &planner, "q", "[(1,)]")
            .await
            .expect("degraded but joined");

        assert_eq!(outcome.decision, ChartDecision::NoChart);
        assert!(outcome.planner_degraded);
    }

    #[tokio::test]
    async fn explainer_failure_is_fatal() {
        let explainer: Arc<dyn ResultExplainer> = Arc::new(ScriptedExplainer::failing());
        let planner: Arc<dyn ChartPlanner> = Arc::new(ScriptedPlanner::no_chart());

        let err = explain_and_plan(&explainer, &planner, "q", "[(1,)]")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Capability {
                capability: "result-explainer",
                ..
            }
        ));
    }
}
