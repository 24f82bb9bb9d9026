use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sluice_client::{ClientConfig, HttpControlPlane};
use sluice_core::{
    BatchExecution, EngineConfig, ExecuteOptions, JobEngine, JobState, StateSubscriber, Subscribe,
};
use sluice_model::{ExportDestination, ExportFormat, ExportSource, JobSpec};
use sluice_observe::{Journal, LoggerConfig, logger_init};
use sluice_prometheus::{Encoder, PrometheusMetrics, TextEncoder};

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn table(namespace: &str, repository: &str, table: &str) -> JobSpec {
    JobSpec::Export {
        source: ExportSource::Table {
            namespace: namespace.to_string(),
            repository: repository.to_string(),
            table: table.to_string(),
            tag: None,
        },
        destination: ExportDestination {
            format: ExportFormat::Parquet,
            filename: Some(format!("{table}.parquet")),
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Logger
    let cfg = LoggerConfig {
        format: env_or("SLUICE_LOG_FORMAT", "text").parse()?,
        level: env_or("SLUICE_LOG", "info"),
        ..Default::default()
    };
    logger_init(&cfg)?;
    info!("logger initialized");

    // 2) Control plane client
    let mut client = ClientConfig::new(env_or("SLUICE_ENDPOINT", "http://localhost:8080"));
    if let Ok(token) = std::env::var("SLUICE_TOKEN") {
        client = client.with_header("authorization", format!("Bearer {token}"));
    }
    let plane = Arc::new(HttpControlPlane::new(&client).context("building http client")?);
    info!(endpoint = %client.endpoint, "control plane configured");

    // 3) Engine + subscribers
    let metrics = Arc::new(PrometheusMetrics::new()?);
    let state = JobState::new();
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![
        Arc::new(Journal::new()),
        Arc::new(StateSubscriber::new(state.clone())),
        metrics.clone(),
    ];
    let engine = JobEngine::new(plane)
        .with_config(EngineConfig::default().with_max_in_flight(16))
        .with_subscribers(subscribers);

    // 4) Ctrl+C stops polling
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling batch");
                cancel.cancel();
            }
        }
    });

    // 5) Submit and wait
    let jobs = vec![
        table("acme", "sales", "orders"),
        table("acme", "sales", "customers"),
        JobSpec::Export {
            source: ExportSource::Query {
                query: "SELECT region, sum(total) FROM orders GROUP BY region".to_string(),
                vdb_id: None,
            },
            destination: ExportDestination::default(),
        },
    ];
    let execution = engine
        .execute_batch(jobs, ExecuteOptions::default(), &cancel)
        .await?;

    if let BatchExecution::Completed(result) = execution {
        info!(
            passed = result.total_passed,
            failed = result.total_failed,
            summary = ?result.summary(),
            "batch done"
        );
        for resolved in &result.failed {
            warn!(
                task_id = %resolved.job.task_id,
                error = %resolved.outcome.error_message().unwrap_or_default(),
                "job failed"
            );
        }
        if let Some(error) = result.error() {
            warn!("{error}");
        }
    }
    info!(tracked = state.list_all().len(), "ledger");

    // 6) Metrics snapshot
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&metrics.gather(), &mut buffer)?;
    println!("{}", String::from_utf8_lossy(&buffer));

    Ok(())
}
