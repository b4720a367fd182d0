//! Scripted capability doubles with no side effects.
//!
//! Deterministic stand-ins for the model and database collaborators. Each
//! double records how often it was invoked so tests can assert which stages
//! ran, in the spirit of mocks that log executed commands.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::capabilities::{
    CapabilityError, ChartDecision, ChartPlanner, ChartRenderer, QueryOutcome, QueryRepairer,
    QueryRunner, QueryTranslator, ResultExplainer, ScopeValidator,
};
use crate::state::{ChartType, ScopeVerdict};

#[derive(Debug)]
pub struct ScriptedScope {
    verdict: ScopeVerdict,
    calls: AtomicU32,
}

impl ScriptedScope {
    pub fn new(verdict: ScopeVerdict) -> Self {
        Self {
            verdict,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScopeValidator for ScriptedScope {
    async fn classify(&self, _question: &str) -> Result<ScopeVerdict, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verdict)
    }
}

#[derive(Debug)]
pub struct ScriptedTranslator {
    query: String,
    calls: AtomicU32,
}

impl ScriptedTranslator {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryTranslator for ScriptedTranslator {
    async fn translate(&self, _question: &str) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.query.clone())
    }
}

/// Runner that replays a fixed script of outcomes and records every query
/// it was asked to execute.
#[derive(Debug)]
pub struct ScriptedRunner {
    script: Mutex<VecDeque<QueryOutcome>>,
    executed: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new(outcomes: Vec<QueryOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn always_rows(rows: &str) -> Self {
        Self::new(vec![QueryOutcome::Rows(rows.to_string())])
    }

    pub fn executed_queries(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn calls(&self) -> u32 {
        self.executed.lock().unwrap().len() as u32
    }
}

#[async_trait]
impl QueryRunner for ScriptedRunner {
    async fn run(&self, query: &str) -> Result<QueryOutcome, CapabilityError> {
        self.executed.lock().unwrap().push(query.to_string());
        let mut script = self.script.lock().unwrap();
        match script.pop_front() {
            Some(outcome) => {
                // The last scripted outcome repeats for later attempts.
                if script.is_empty() {
                    script.push_back(outcome.clone());
                }
                Ok(outcome)
            }
            None => Err(CapabilityError::Unavailable(
                "runner script exhausted".to_string(),
            )),
        }
    }
}

/// Repairer that appends a marker so tests can tell repaired queries from
/// the original.
#[derive(Debug)]
pub struct ScriptedRepairer {
    suffix: String,
    seen: Mutex<Vec<(String, String)>>,
}

impl ScriptedRepairer {
    pub fn new(suffix: &str) -> Self {
        Self {
            suffix: suffix.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> u32 {
        self.seen.lock().unwrap().len() as u32
    }

    pub fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryRepairer for ScriptedRepairer {
    async fn repair(&self, prior_query: &str, error: &str) -> Result<String, CapabilityError> {
        self.seen
            .lock()
            .unwrap()
            .push((prior_query.to_string(), error.to_string()));
        Ok(format!("{prior_query}{}", self.suffix))
    }
}

#[derive(Debug)]
pub struct ScriptedExplainer {
    fail: bool,
    calls: AtomicU32,
}

impl ScriptedExplainer {
    /// Echoes the result text back inside a fixed sentence.
    pub fn echoing() -> Self {
        Self {
            fail: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultExplainer for ScriptedExplainer {
    async fn explain(&self, _question: &str, result: &str) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CapabilityError::Unavailable(
                "explainer offline".to_string(),
            ));
        }
        Ok(format!("Based on the data, the result is {result}."))
    }
}

#[derive(Debug)]
pub struct ScriptedPlanner {
    decision: Option<ChartDecision>,
    calls: AtomicU32,
}

impl ScriptedPlanner {
    pub fn deciding(decision: ChartDecision) -> Self {
        Self {
            decision: Some(decision),
            calls: AtomicU32::new(0),
        }
    }

    pub fn no_chart() -> Self {
        Self::deciding(ChartDecision::NoChart)
    }

    pub fn chart(chart_type: ChartType) -> Self {
        Self::deciding(ChartDecision::Chart(chart_type))
    }

    pub fn failing() -> Self {
        Self {
            decision: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChartPlanner for ScriptedPlanner {
    async fn plan(&self, _question: &str, _result: &str) -> Result<ChartDecision, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.decision
            .ok_or_else(|| CapabilityError::Unavailable("planner offline".to_string()))
    }
}

#[derive(Debug)]
pub struct ScriptedRenderer {
    payload: Option<String>,
    calls: AtomicU32,
}

impl ScriptedRenderer {
    pub fn new(payload: &str) -> Self {
        Self {
            payload: Some(payload.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            payload: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChartRenderer for ScriptedRenderer {
    async fn render(
        &self,
        _result: &str,
        _chart_type: ChartType,
        _title: &str,
    ) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payload
            .clone()
            .ok_or_else(|| CapabilityError::Malformed("renderer rejected input".to_string()))
    }
}
