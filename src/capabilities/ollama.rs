//! Ollama HTTP backend implementing the model-backed capabilities.
//!
//! One client serves scope checking, SQL generation, repair, result
//! explanation and chart planning against a local Ollama `/api/generate`
//! endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::capabilities::{
    CapabilityError, ChartDecision, ChartPlanner, QueryRepairer, QueryTranslator, ResultExplainer,
    ScopeValidator,
};
use crate::config::ModelConfig;
use crate::state::{ChartType, ScopeVerdict};

static CODE_FENCE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"```[a-zA-Z]*\n?|```").unwrap());

/// Strip markdown code fences the model sometimes wraps around SQL or JSON.
fn strip_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for one Ollama model. Holds the schema summary the translator
/// and repairer embed in their prompts; the coordinator never sees it.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    num_predict: u32,
    schema: String,
}

impl OllamaClient {
    pub fn new(config: &ModelConfig, schema: String) -> Result<Self, CapabilityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            num_predict: config.num_predict,
            schema,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, CapabilityError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.num_predict,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<GenerateResponse>()
            .await?;

        Ok(response.response.trim().to_string())
    }
}

#[async_trait]
impl ScopeValidator for OllamaClient {
    async fn classify(&self, question: &str) -> Result<ScopeVerdict, CapabilityError> {
        let prompt = format!(
            "You are a helpful assistant for a SQL database.\n\
             Determine if the user's question is:\n\
             1. A greeting (e.g., \"hi\", \"hello\") -> Return \"GREETING\"\n\
             2. A valid question about the data in the database -> Return \"IN_SCOPE\"\n\
             3. Out of scope (e.g., \"who is the president\", \"weather\") -> Return \"OUT_OF_SCOPE\"\n\n\
             Only return one of these three strings.\n\n\
             Question: {question}"
        );

        let reply = self.generate(&prompt).await?;
        debug!(reply = %reply, "scope verdict");

        if reply.contains("GREETING") {
            Ok(ScopeVerdict::Greeting)
        } else if reply.contains("OUT_OF_SCOPE") {
            Ok(ScopeVerdict::OutOfScope)
        } else {
            Ok(ScopeVerdict::InScope)
        }
    }
}

#[async_trait]
impl QueryTranslator for OllamaClient {
    async fn translate(&self, question: &str) -> Result<String, CapabilityError> {
        let prompt = format!(
            "You are an expert SQLite data analyst.\n\
             Given the following database schema, generate a valid SQLite query \
             to answer the user's question.\n\n\
             Schema:\n{schema}\n\n\
             Rules:\n\
             1. Return ONLY the SQL query. No markdown, no explanations.\n\
             2. If the query might return many rows, limit it to 10.\n\
             3. Use valid SQLite syntax.\n\n\
             Question: {question}",
            schema = self.schema,
        );

        let query = strip_fences(&self.generate(&prompt).await?);
        if query.is_empty() {
            return Err(CapabilityError::Malformed(
                "translator returned an empty query".to_string(),
            ));
        }
        Ok(query)
    }
}

#[async_trait]
impl QueryRepairer for OllamaClient {
    async fn repair(&self, prior_query: &str, error: &str) -> Result<String, CapabilityError> {
        let prompt = format!(
            "You are fixing a broken SQL query.\n\
             Original Query: {prior_query}\n\
             Error: {error}\n\n\
             Database Schema:\n{schema}\n\n\
             Return the corrected SQL query ONLY. No markdown.",
            schema = self.schema,
        );

        let query = strip_fences(&self.generate(&prompt).await?);
        if query.is_empty() {
            return Err(CapabilityError::Malformed(
                "repairer returned an empty query".to_string(),
            ));
        }
        Ok(query)
    }
}

#[async_trait]
impl ResultExplainer for OllamaClient {
    async fn explain(&self, question: &str, result: &str) -> Result<String, CapabilityError> {
        let prompt = format!(
            "You are a data analyst. Explain the following database results in \
             natural language to the user.\n\
             User Question: {question}\n\
             Result: {result}\n\n\
             Provide a clear, concise answer. If the result is a list, summarize it."
        );

        self.generate(&prompt).await
    }
}

#[async_trait]
impl ChartPlanner for OllamaClient {
    async fn plan(&self, question: &str, result: &str) -> Result<ChartDecision, CapabilityError> {
        let prompt = format!(
            "You are a data visualization expert. Analyze if a visualization \
             would be helpful.\n\n\
             IMPORTANT: Return ONLY valid JSON, nothing else. No explanations, no markdown.\n\n\
             Format:\n{{\"needs_graph\": true, \"graph_type\": \"bar\"}}\n\n\
             Rules:\n\
             - Use \"bar\" for comparisons (top 10, rankings, categories)\n\
             - Use \"line\" for trends over time (yearly, monthly)\n\
             - Use \"pie\" for proportions (percentages, shares)\n\
             - Use \"scatter\" for correlations\n\
             - If single number or simple text: {{\"needs_graph\": false, \"graph_type\": \"none\"}}\n\n\
             Question: {question}\nResult: {result}\n\nReturn JSON:"
        );

        let reply = self.generate(&prompt).await?;
        Ok(parse_chart_decision(&reply, result))
    }
}

#[derive(Debug, Deserialize)]
struct RawChartDecision {
    #[serde(default)]
    needs_graph: bool,
    #[serde(default)]
    graph_type: String,
}

/// Parse the planner's JSON reply. A malformed reply falls back to a shape
/// heuristic instead of failing: multi-row results default to a bar chart,
/// anything else to no chart.
fn parse_chart_decision(reply: &str, result: &str) -> ChartDecision {
    let cleaned = strip_fences(reply);
    match serde_json::from_str::<RawChartDecision>(&cleaned) {
        Ok(raw) if raw.needs_graph => match ChartType::parse(&raw.graph_type) {
            Some(ty) => ChartDecision::Chart(ty),
            None => ChartDecision::NoChart,
        },
        Ok(_) => ChartDecision::NoChart,
        Err(err) => {
            warn!(error = %err, reply = %cleaned, "unparseable chart decision, using shape heuristic");
            if looks_multi_row(result) {
                ChartDecision::Chart(ChartType::Bar)
            } else {
                ChartDecision::NoChart
            }
        }
    }
}

/// Rough row count on the runner's `[(..), (..)]` rendering.
fn looks_multi_row(result: &str) -> bool {
    result.matches("), (").count() >= 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn strips_sql_fences() {
        let fenced = "```sql\nSELECT 1;\n```";
        assert_eq!(strip_fences(fenced), "SELECT 1;");
        assert_eq!(strip_fences("SELECT 1;"), "SELECT 1;");
    }

    #[test]
    fn chart_decision_parses_well_formed_json() {
        let decision =
            parse_chart_decision(r#"{"needs_graph": true, "graph_type": "line"}"#, "[(1, 2)]");
        assert_eq!(decision, ChartDecision::Chart(ChartType::Line));

        let decision =
            parse_chart_decision(r#"{"needs_graph": false, "graph_type": "none"}"#, "[(1,)]");
        assert_eq!(decision, ChartDecision::NoChart);
    }

    #[test]
    fn chart_decision_falls_back_on_garbage() {
        let multi = "[('a', 1), ('b', 2), ('c', 3)]";
        assert_eq!(
            parse_chart_decision("I think a bar chart would be great!", multi),
            ChartDecision::Chart(ChartType::Bar)
        );
        assert_eq!(
            parse_chart_decision("not json", "[(45101,)]"),
            ChartDecision::NoChart
        );
    }

    #[test]
    fn chart_decision_with_unknown_type_means_no_chart() {
        let decision = parse_chart_decision(
            r#"{"needs_graph": true, "graph_type": "treemap"}"#,
            "[('a', 1), ('b', 2)]",
        );
        assert_eq!(decision, ChartDecision::NoChart);
    }

    #[tokio::test]
    async fn translator_hits_generate_endpoint_and_strips_fences() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "```sql\nSELECT COUNT(*) FROM orders\n```"
            })))
            .mount(&server)
            .await;

        let config = ModelConfig {
            base_url: server.uri(),
            ..ModelConfig::default()
        };
        let client = OllamaClient::new(&config, "CREATE TABLE orders (id INTEGER)".to_string())
            .expect("client");

        let query = client.translate("how many orders?").await.expect("query");
        assert_eq!(query, "SELECT COUNT(*) FROM orders");
    }

    #[tokio::test]
    async fn backend_error_surfaces_as_capability_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = ModelConfig {
            base_url: server.uri(),
            ..ModelConfig::default()
        };
        let client = OllamaClient::new(&config, String::new()).expect("client");

        let err = client.translate("q").await.unwrap_err();
        assert!(matches!(err, CapabilityError::Backend(_)));
    }
}
