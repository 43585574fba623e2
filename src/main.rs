//! bulk-worker: runs the ingestion, dispatch and apply consumers and the scheduler

#![allow(missing_docs)]

use anyhow::Context;
use bulk_actions::storage::StorageLayer;
use bulk_actions::utils::logging::init_logging;
use bulk_actions::{Config, Pipeline, PipelineContext};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "bulk-worker", version, about = "Bulk action pipeline worker")]
struct Args {
    /// YAML configuration file; environment variables are used when absent
    #[arg(short, long, env = "BULK_WORKER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::from_env().context("loading configuration from environment")?,
    };
    init_logging(&config.pipeline.logging);
    info!("Starting {} {}", bulk_actions::NAME, bulk_actions::VERSION);

    let storage = StorageLayer::new(&config.pipeline)
        .await
        .context("connecting storage")?;
    storage.migrate().await.context("running migrations")?;
    let health = storage.health_check().await;
    if !health.overall {
        anyhow::bail!("storage is unhealthy: {:?}", health);
    }

    let ctx = PipelineContext::new(
        config.pipeline.clone(),
        storage.database.clone(),
        storage.broker(&config.pipeline),
        storage.files.clone(),
        Some(storage.shared_cache()),
    );
    let pipeline = Pipeline::new(ctx);
    pipeline.prepare().await.context("preparing queues")?;
    let handle = pipeline.start();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown signal received");

    handle.shutdown().await;
    storage.close().await.context("closing storage")?;
    info!("Worker stopped");
    Ok(())
}
