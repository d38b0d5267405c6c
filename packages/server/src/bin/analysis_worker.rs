// Main entry point for the analysis worker

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use server_core::common::ReportId;
use server_core::domains::analysis::activities::reconcile_stale_reports;
use server_core::domains::analysis::analyzers::{HtmlSeoAnalyzer, LlmAeoAnalyzer};
use server_core::kernel::{
    AnalysisWorker, AnalysisWorkerConfig, HttpLlmGateway, PgLlmConfigStore, PgReportRepository,
    PlaintextCredentials, WorkerDeps,
};
use server_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "analysis_worker")]
#[command(about = "Background SEO/AEO analysis worker")]
struct Cli {
    /// Pending reports to queue at startup (repeatable)
    #[arg(long = "report")]
    reports: Vec<ReportId>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting TrafficTuner analysis worker");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.worker_concurrency as u32 + 4)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Wire dependencies
    let gateway = HttpLlmGateway::new(config.llm_request_timeout)
        .context("Failed to build LLM gateway")?;
    let seo_analyzer = HtmlSeoAnalyzer::new(config.seo_fetch_timeout)
        .context("Failed to build SEO analyzer")?;

    let deps = WorkerDeps::new(
        Arc::new(PgReportRepository::new(pool.clone())),
        Arc::new(PgLlmConfigStore::new(pool.clone(), Arc::new(PlaintextCredentials))),
        Arc::new(seo_analyzer),
        Arc::new(LlmAeoAnalyzer::new(Arc::new(gateway))),
    )
    .with_llm_provider(config.llm_provider);

    // Fail reports orphaned by a previous run
    let stale_after = chrono::Duration::from_std(config.stale_processing_after)
        .context("STALE_PROCESSING_SECS is out of range")?;
    let reconciled = reconcile_stale_reports(&deps, stale_after)
        .await
        .context("Failed to reconcile interrupted analyses")?;
    tracing::info!(count = reconciled, "Startup reconciliation complete");

    // Start worker
    let worker = AnalysisWorker::with_config(
        deps,
        AnalysisWorkerConfig {
            poll_timeout: config.worker_poll_timeout,
            concurrency: config.worker_concurrency,
            ..Default::default()
        },
    );
    worker.start();

    // Embedding servers enqueue through `AnalysisWorker::enqueue`; standalone
    // runs take report IDs from the command line.
    for report_id in cli.reports {
        worker.enqueue(report_id);
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    worker.stop().await;
    pool.close().await;

    Ok(())
}
