mod auth;
mod config;
mod engine;
mod evaluator;
mod executor;
mod report;


use anyhow::Context;
use config::{RunnerConfig, StoreConfig};
use engine::ReqwestEngine;
use executor::RunOptions;
use restcheck_common::config::Settings;
use restcheck_common::store::{RedisStore, SqliteStore, Store};
use restcheck_common::suite;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_line_number(true)
        .init();

    info!("restcheck worker booting...");

    let settings = Settings::from_env();
    let config = RunnerConfig::load_default(&settings).map_err(|e| {
        error!("Failed to load runner configuration: {:#}", e);
        e
    })?;

    info!(
        suite = %config.suite_path.display(),
        failure_reporting = ?config.failure_reporting,
        timeout_ms = config.request_timeout_ms,
        "Runner configured"
    );

    let loaded = suite::load_suite(&config.suite_path).map_err(|e| {
        error!(suite = %config.suite_path.display(), error = %e, "Failed to load test suite");
        e
    })?;
    if !loaded.rejected.is_empty() {
        warn!(rejected = loaded.rejected.len(), "Some test case records were rejected");
    }

    let mut store = match &config.store {
        StoreConfig::Sqlite { path } => {
            let store = SqliteStore::open(path)
                .with_context(|| format!("Failed to open results database {}", path.display()))?;
            info!(path = %path.display(), "Using SQLite result store");
            Store::Sqlite(store)
        }
        StoreConfig::Redis { url, ttl_seconds } => {
            let store = RedisStore::connect(url, *ttl_seconds)
                .await
                .with_context(|| format!("Failed to connect to Redis at {url}"))?;
            info!(url = %url, ttl_seconds, "Using Redis result store");
            Store::Redis(store)
        }
    };

    let engine = ReqwestEngine::new(config.request_timeout()).context("Failed to build HTTP client")?;

    let started_at = chrono::Local::now();
    let options = RunOptions {
        execution_name: executor::execution_name(&config.execution_prefix, &started_at),
        reporting: config.failure_reporting,
    };

    let run = executor::execute_run(&loaded.cases, &engine, &mut store, &options).await?;

    print!("{}", report::render_summary(&run));

    if let Some(path) = &config.report_path {
        if let Err(e) = report::write_json_report(&run, path) {
            error!(path = %path.display(), error = %format!("{e:#}"), "Failed to write run report");
        }
    }

    if config.write_back {
        if let Err(e) = report::annotate_suite(&config.suite_path, &run.results, &started_at) {
            error!(suite = %config.suite_path.display(), error = %format!("{e:#}"), "Failed to write results back");
        }
    }

    if run.has_failures() {
        info!(failed = run.summary.failed_tests, "Run finished with failures");
        std::process::exit(1);
    }

    info!("Run finished");
    Ok(())
}
