//! Behavior of the concurrent explanation + chart-planning fork and the
//! chart rendering stage when either side misbehaves.

use std::sync::Arc;

use tabletalk::capabilities::scripted::{
    ScriptedExplainer, ScriptedPlanner, ScriptedRenderer, ScriptedRepairer, ScriptedRunner,
    ScriptedScope, ScriptedTranslator,
};
use tabletalk::capabilities::CapabilitySet;
use tabletalk::{ChartType, Disposition, PipelineError, ScopeVerdict, WorkflowCoordinator};

fn set_with(
    explainer: Arc<ScriptedExplainer>,
    planner: Arc<ScriptedPlanner>,
    renderer: Arc<ScriptedRenderer>,
) -> CapabilitySet {
    CapabilitySet {
        scope: Arc::new(ScriptedScope::new(ScopeVerdict::InScope)),
        translator: Arc::new(ScriptedTranslator::new(
            "SELECT region, revenue FROM sales",
        )),
        runner: Arc::new(ScriptedRunner::always_rows(
            "[('north', 120), ('south', 95)]",
        )),
        repairer: Arc::new(ScriptedRepairer::new(" -- fixed")),
        explainer,
        planner,
        renderer,
    }
}

#[tokio::test]
async fn planner_failure_degrades_to_a_plain_answer() {
    let renderer = Arc::new(ScriptedRenderer::new("{}"));
    let set = set_with(
        Arc::new(ScriptedExplainer::echoing()),
        Arc::new(ScriptedPlanner::failing()),
        renderer.clone(),
    );
    let coordinator = WorkflowCoordinator::new(set);

    let terminal = coordinator
        .run("Revenue by region?")
        .await
        .expect("terminal");

    assert_eq!(terminal.disposition, Disposition::Answered);
    assert!(terminal.final_answer.contains("north"));
    assert_eq!(terminal.needs_chart, Some(false));
    assert!(terminal.chart_type.is_none());
    assert!(terminal.chart_payload.is_none());
    assert_eq!(renderer.calls(), 0);
}

#[tokio::test]
async fn renderer_failure_ships_the_answer_without_a_chart() {
    let renderer = Arc::new(ScriptedRenderer::failing());
    let set = set_with(
        Arc::new(ScriptedExplainer::echoing()),
        Arc::new(ScriptedPlanner::chart(ChartType::Pie)),
        renderer.clone(),
    );
    let coordinator = WorkflowCoordinator::new(set);

    let terminal = coordinator
        .run("Revenue by region?")
        .await
        .expect("terminal");

    assert_eq!(terminal.disposition, Disposition::Answered);
    assert_eq!(terminal.needs_chart, Some(true));
    assert_eq!(terminal.chart_type, Some(ChartType::Pie));
    assert!(terminal.chart_payload.is_none());
    assert_eq!(renderer.calls(), 1);
}

#[tokio::test]
async fn explainer_failure_fails_the_turn() {
    let planner = Arc::new(ScriptedPlanner::chart(ChartType::Bar));
    let set = set_with(
        Arc::new(ScriptedExplainer::failing()),
        planner.clone(),
        Arc::new(ScriptedRenderer::new("{}")),
    );
    let coordinator = WorkflowCoordinator::new(set);

    let err = coordinator.run("Revenue by region?").await.unwrap_err();

    match err {
        PipelineError::Capability { capability, .. } => {
            assert_eq!(capability, "result-explainer");
        }
        other => panic!("expected a capability error, got {other:?}"),
    }
    // The planner side of the fork still ran before the join surfaced the
    // explainer's failure.
    assert_eq!(planner.calls(), 1);
}

#[tokio::test]
async fn both_fork_branches_feed_the_terminal_state() {
    let explainer = Arc::new(ScriptedExplainer::echoing());
    let planner = Arc::new(ScriptedPlanner::chart(ChartType::Line));
    let set = set_with(
        explainer.clone(),
        planner.clone(),
        Arc::new(ScriptedRenderer::new("{\"data\":[]}")),
    );
    let coordinator = WorkflowCoordinator::new(set);

    let terminal = coordinator
        .run("Revenue by region?")
        .await
        .expect("terminal");

    assert_eq!(explainer.calls(), 1);
    assert_eq!(planner.calls(), 1);
    assert!(terminal.final_answer.contains("north"));
    assert_eq!(terminal.chart_type, Some(ChartType::Line));
    assert!(terminal.chart_payload.is_some());
}
