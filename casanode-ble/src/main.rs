//! Casanode BLE peripheral daemon

use std::path::PathBuf;
use std::sync::Arc;

use casanode_ble::api::HttpsBackend;
use casanode_ble::backend::Backend;
use casanode_ble::config::{Config, DEFAULT_CONFIG_FILE};
use casanode_ble::{attributes, gatt, logging};
use clap::Parser;

#[derive(Parser)]
#[command(name = "casanode-ble")]
#[command(about = "BLE peripheral for configuring and controlling a Casanode")]
struct Cli {
    /// Configuration file (KEY=VALUE lines)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    let _logging = logging::init_logging(&config.log_dir);
    tracing::info!(config = %cli.config.display(), "starting casanode-ble");
    for warning in &config.warnings {
        tracing::warn!("{warning}");
    }

    let backend: Arc<dyn Backend> = Arc::new(HttpsBackend::new(&config)?);
    let attributes = attributes::all(&config, backend);

    let server = gatt::serve(&config, attributes).await?;
    tracing::info!(adapter = server.adapter_name(), "peripheral ready, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    drop(server);
    Ok(())
}
