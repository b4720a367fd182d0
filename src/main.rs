use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use tabletalk::capabilities::chart::ChartSpecRenderer;
use tabletalk::capabilities::ollama::OllamaClient;
use tabletalk::capabilities::sqlite::SqliteStore;
use tabletalk::capabilities::CapabilitySet;
use tabletalk::config::TabletalkConfig;
use tabletalk::observability::{pipeline_metrics, OperationTimer};
use tabletalk::pipeline::WorkflowCoordinator;
use tabletalk::telemetry::{init_telemetry, shutdown_telemetry};

#[derive(Parser)]
#[command(name = "tabletalk")]
#[command(about = "Ask natural-language questions against a SQL database")]
#[command(
    long_about = "tabletalk routes a question through scope checking, SQL generation, \
                  execution with bounded error repair, and result explanation, and \
                  optionally renders a chart of the answer."
)]
struct Cli {
    /// The question to answer
    question: String,

    /// Path to a configuration file (defaults to tabletalk.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the retry bound for query repair
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Write the chart payload (if one is produced) to this file
    #[arg(long)]
    chart_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tokio::runtime::Runtime::new()?.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    TabletalkConfig::load_env_file()?;
    let config = TabletalkConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_telemetry(&config.observability)?;

    let store = Arc::new(
        SqliteStore::connect(&config.database)
            .await
            .context("connecting to database")?,
    );
    let schema = store
        .schema_summary()
        .await
        .context("reading database schema")?;
    let model = Arc::new(OllamaClient::new(&config.model, schema).context("building model client")?);

    let capabilities = CapabilitySet {
        scope: model.clone(),
        translator: model.clone(),
        runner: store.clone(),
        repairer: model.clone(),
        explainer: model.clone(),
        planner: model,
        renderer: Arc::new(ChartSpecRenderer::new()),
    };

    let max_attempts = cli.max_attempts.unwrap_or(config.pipeline.max_attempts);
    let coordinator = WorkflowCoordinator::new(capabilities).with_max_attempts(max_attempts);

    let timer = OperationTimer::new("turn");
    let terminal = coordinator.run(&cli.question).await?;
    timer.finish();

    if let Some(query) = &terminal.query {
        println!("Generated SQL:\n{query}\n");
    }
    println!("{}", terminal.final_answer);

    if let Some(payload) = &terminal.chart_payload {
        match &cli.chart_out {
            Some(path) => {
                std::fs::write(path, payload).context("writing chart payload")?;
                println!("\nChart written to {}", path.display());
            }
            None => println!("\nChart payload:\n{payload}"),
        }
    }

    store.close().await;
    pipeline_metrics().log_stats();
    shutdown_telemetry();
    Ok(())
}
