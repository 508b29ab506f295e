//! machine-actuator
//!
//! Runs one actuator operation against a machine manifest. The status is
//! written back to the manifest after `create` and `update`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use capg_compute::GceClient;
use capg_machine_actuator::{
    Actuator, ActuatorParams, Config, DirectorySecretStore, FileMachineStore, TracingRecorder,
};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Reconcile a machine manifest against GCE.
#[derive(Debug, Parser)]
#[command(name = "machine-actuator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the machine manifest (JSON).
    #[arg(long, env = "CAPG_MACHINE_FILE")]
    machine: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the instance and record its status.
    Create,
    /// Report whether the instance exists.
    Exists,
    /// Refresh the machine status from the instance.
    Update,
    /// Delete the instance.
    Delete,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        compute_endpoint = %config.compute_endpoint,
        default_project = ?config.default_project,
        secrets_dir = %config.secrets_dir.display(),
        "Configuration loaded"
    );

    let store = Arc::new(FileMachineStore::new(&cli.machine));
    let machine = store
        .load()
        .await
        .with_context(|| format!("failed to load machine manifest {}", cli.machine.display()))?;

    let compute =
        GceClient::new(config.gce_client_config()).context("failed to build compute client")?;

    let actuator = Actuator::new(ActuatorParams {
        compute: Arc::new(compute),
        secrets: Arc::new(DirectorySecretStore::new(&config.secrets_dir)),
        store,
        events: Arc::new(TracingRecorder),
        config: config.actuator_config(),
    });

    let result = match cli.command {
        Command::Create => actuator.create(&machine).await,
        Command::Exists => actuator.exists(&machine).await.map(|exists| {
            println!("{}", serde_json::json!({ "exists": exists }));
        }),
        Command::Update => actuator.update(&machine).await,
        Command::Delete => actuator.delete(&machine).await,
    };

    if let Err(e) = result {
        error!(machine = %machine.name(), error = %e, retryable = e.is_retryable(), "Actuator operation failed");
        std::process::exit(1);
    }

    Ok(())
}
