//! dxvif: reconcile one dedicated-connection virtual interface.
//!
//! The local record lives in a JSON state file. Each invocation runs a single
//! lifecycle operation against the provider API and writes the record back.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dxvif::clients::GrpcClient;
use dxvif::reconciler::{Reconciler, VirtualInterfaceReconciler};
use dxvif::{LocalRecord, ReconcilerConfig, VirtualInterfaceSpec};

/// Virtual interface reconciler
#[derive(Parser, Debug)]
#[command(name = "dxvif", version, about)]
struct Args {
    /// Provider API endpoint (e.g., http://[::1]:50070)
    #[arg(long, default_value = "http://[::1]:50070")]
    endpoint: String,

    /// Local record file
    #[arg(long, default_value = "dxvif.json")]
    state: PathBuf,

    /// Seconds to wait for a new interface to become available
    #[arg(long, default_value = "60")]
    create_timeout: u64,

    /// Seconds to pause after create before the first status probe
    #[arg(long, default_value = "0")]
    create_delay: u64,

    /// Seconds between status probes
    #[arg(long, default_value = "2")]
    poll_interval: u64,

    /// Wait until the provider reports the interface deleted
    #[arg(long)]
    wait_for_deletion: bool,

    /// Seconds to wait for deletion (with --wait-for-deletion)
    #[arg(long, default_value = "600")]
    delete_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the interface described by a spec file and wait for it
    Create {
        /// Virtual interface spec (JSON)
        #[arg(long)]
        spec: PathBuf,
    },
    /// Refresh the record from the provider
    Read,
    /// Re-check the interface (attributes are immutable)
    Update,
    /// Delete the interface
    Delete,
}

impl Args {
    fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            create_timeout: Duration::from_secs(self.create_timeout),
            poll_interval: Duration::from_secs(self.poll_interval),
            create_delay: Duration::from_secs(self.create_delay),
            wait_for_deletion: self.wait_for_deletion,
            delete_timeout: Duration::from_secs(self.delete_timeout),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dxvif=info,tonic=warn,tower=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    info!("Provider endpoint: {}", args.endpoint);

    let client = GrpcClient::new(&args.endpoint).context("Invalid provider endpoint")?;

    // Ctrl-C cancels any wait in progress; the record is still written back.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(forward_interrupt(tokio::signal::ctrl_c(), shutdown_tx));

    let reconciler = VirtualInterfaceReconciler::new(Arc::new(client), args.reconciler_config())
        .with_shutdown(shutdown_rx);

    let mut record = load_record(&args.state)?;
    let result = match &args.command {
        Command::Create { spec } => {
            let spec = load_spec(spec)?;
            let record = record.get_or_insert_with(|| LocalRecord::new(spec.clone()));
            if !record.is_present() {
                record.spec = spec;
            }
            reconciler.create(record).await.map(Some)
        }
        Command::Read => {
            let record = record.as_mut().context("No local record to read")?;
            reconciler.read(record).await
        }
        Command::Update => {
            let record = record.as_mut().context("No local record to update")?;
            reconciler.update(record).await
        }
        Command::Delete => match record.as_mut() {
            Some(record) => reconciler.delete(record).await.map(|()| None),
            None => Ok(None),
        },
    };

    if let Some(record) = &record {
        save_record(&args.state, record)?;
    }

    match result? {
        Some(vi) => println!("{}", serde_json::to_string_pretty(&vi)?),
        None => info!("Virtual interface is not present"),
    }
    Ok(())
}

/// Turn the interrupt signal into a shutdown request.
///
/// The sender stays alive when the signal cannot be installed, since waiters
/// treat a closed channel as shutdown.
async fn forward_interrupt<F>(signal: F, shutdown: watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            warn!("Interrupted, cancelling");
            let _ = shutdown.send(true);
        }
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl-C, interrupts will not cancel waits");
            shutdown.closed().await;
        }
    }
}

fn load_spec(path: &Path) -> Result<VirtualInterfaceSpec> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read spec {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Invalid spec {}", path.display()))
}

fn load_record(path: &Path) -> Result<Option<LocalRecord>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read record {}", path.display()))?;
    let record = serde_json::from_str(&data)
        .with_context(|| format!("Invalid record {}", path.display()))?;
    Ok(Some(record))
}

fn save_record(path: &Path, record: &LocalRecord) -> Result<()> {
    let data = serde_json::to_string_pretty(record)?;
    std::fs::write(path, data).with_context(|| format!("Failed to write record {}", path.display()))
}
