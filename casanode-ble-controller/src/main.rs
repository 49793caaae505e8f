//! Command line client for Casanode devices
//!
//! Scans for devices and reads, writes or triggers attributes over BLE.

use btleplug::api::Peripheral as _;
use clap::{Parser, Subcommand};
use std::time::Duration;

use casanode_ble_controller::ble;
use casanode_proto::ble::ids;

#[derive(Parser)]
#[command(name = "casanode-ble-controller")]
#[command(about = "BLE client for configuring Casanode devices")]
struct Cli {
    /// Device name or address to connect to
    #[arg(short, long, global = true)]
    device: Option<String>,

    /// Characteristic seed configured on the device (BLE_CHARACTERISTIC_SEED)
    #[arg(short, long, global = true, default_value = "")]
    seed: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for Casanode devices
    Scan {
        /// Scan duration in seconds
        #[arg(long, default_value = "5")]
        duration: u64,
    },
    /// Read an attribute, e.g. `moniker` or `node-status`
    Read { id: String },
    /// Write a value to an attribute
    Write { id: String, value: String },
    /// Trigger an action and wait for its result, e.g. `certificate-actions renew`
    Action {
        id: String,
        command: String,
        /// Poll interval in milliseconds
        #[arg(long, default_value = "500")]
        poll: u64,
        /// Give up after this many seconds
        #[arg(long, default_value = "90")]
        timeout: u64,
    },
    /// Create or restore the node wallet
    Mnemonic {
        #[command(subcommand)]
        command: MnemonicCommand,
    },
}

#[derive(Subcommand)]
enum MnemonicCommand {
    /// Create a new wallet and print its mnemonic
    Create,
    /// Restore the wallet from mnemonic words
    Restore { words: Vec<String> },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::Scan { duration } = cli.command {
        println!("Scanning for {duration} seconds...");
        for device in ble::scan(duration).await? {
            let marker = if device.is_casanode { "*" } else { " " };
            let rssi = device.rssi.map(|r| format!("{r} dBm")).unwrap_or_default();
            println!("{marker} {} ({}) {rssi}", device.name, device.address);
        }
        return Ok(());
    }

    let device = ble::connect(cli.device.as_deref()).await?;

    // Every arm runs to a result so the device is always disconnected.
    let result: Result<(), Box<dyn std::error::Error>> = async {
        match &cli.command {
            Commands::Scan { .. } => {}
            Commands::Read { id } => {
                let char = ble::find_characteristic(&device, ble::attribute_uuid(&cli.seed, id)?)?;
                let value = ble::read(&device, &char).await?;
                println!("{}", String::from_utf8_lossy(&value));
            }
            Commands::Write { id, value } => {
                let char = ble::find_characteristic(&device, ble::attribute_uuid(&cli.seed, id)?)?;
                ble::write(&device, &char, value.as_bytes()).await?;
            }
            Commands::Action {
                id,
                command,
                poll,
                timeout,
            } => {
                let char = ble::find_characteristic(&device, ble::attribute_uuid(&cli.seed, id)?)?;
                let status = ble::run_action(
                    &device,
                    &char,
                    command,
                    Duration::from_millis(*poll),
                    Duration::from_secs(*timeout),
                )
                .await?;
                println!("{status}");
            }
            Commands::Mnemonic { command } => {
                let uuid = ble::attribute_uuid(&cli.seed, ids::WALLET_MNEMONIC)?;
                let char = ble::find_characteristic(&device, uuid)?;
                match command {
                    MnemonicCommand::Create => {
                        let words = ble::create_mnemonic(&device, &char).await?;
                        println!("{}", words.join(" "));
                    }
                    MnemonicCommand::Restore { words } => ble::restore_mnemonic(&device, &char, words).await?,
                }
            }
        }
        Ok(())
    }
    .await;

    let _ = device.disconnect().await;
    result
}
