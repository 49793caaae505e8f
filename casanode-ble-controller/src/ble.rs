//! BLE client for Casanode devices
//!
//! Scans for peripherals, reads and writes attributes by identifier, and
//! drives chunked transfers and action polling from the central side.

use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::time::Duration;
use uuid::Uuid;

use casanode_proto::ble::{DEVICE_NAME, DISCOVERY_UUID, characteristic_uuid, ids};
use casanode_proto::{ERROR_SENTINEL, STATUS_IN_PROGRESS, decode_length, frame, open, seal};

type Error = Box<dyn std::error::Error>;

/// A discovered device
#[derive(Debug, Clone)]
pub struct CasanodeDevice {
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
    pub is_casanode: bool,
}

/// UUID of an attribute under the peripheral's seed
pub fn attribute_uuid(seed: &str, id: &str) -> Result<Uuid, Error> {
    if id == ids::DISCOVERY {
        return Ok(Uuid::parse_str(DISCOVERY_UUID)?);
    }
    Ok(characteristic_uuid(seed, id))
}

fn is_casanode(name: &str) -> bool {
    name.starts_with(DEVICE_NAME)
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, Error> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or_else(|| "No Bluetooth adapter found".into())
}

/// Scan for BLE devices
///
/// Casanode devices have `is_casanode = true`.
pub async fn scan(duration_secs: u64) -> Result<Vec<CasanodeDevice>, Error> {
    let adapter = get_adapter().await?;

    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(Duration::from_secs(duration_secs)).await;

    let peripherals = adapter.peripherals().await?;
    let mut devices = Vec::new();

    for peripheral in peripherals {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_else(|| "Unknown".to_string());
            let address = peripheral.address().to_string();
            let is_casanode = is_casanode(&name);
            devices.push(CasanodeDevice {
                name,
                address,
                rssi: props.rssi,
                is_casanode,
            });
        }
    }

    adapter.stop_scan().await?;
    Ok(devices)
}

/// Find a device by name/address pattern, or any Casanode
pub async fn find_device(target: Option<&str>) -> Result<Peripheral, Error> {
    let adapter = get_adapter().await?;

    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(Duration::from_secs(5)).await;

    for peripheral in adapter.peripherals().await? {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_default();
            let addr = peripheral.address().to_string();

            let matches = match target {
                Some(t) => name.contains(t) || addr.contains(t),
                None => is_casanode(&name),
            };

            if matches {
                adapter.stop_scan().await?;
                return Ok(peripheral);
            }
        }
    }

    adapter.stop_scan().await?;
    Err("No Casanode device found".into())
}

/// Find, connect and discover services
pub async fn connect(target: Option<&str>) -> Result<Peripheral, Error> {
    let device = find_device(target).await?;
    device.connect().await?;
    device.discover_services().await?;
    Ok(device)
}

pub fn find_characteristic(device: &Peripheral, uuid: Uuid) -> Result<Characteristic, Error> {
    device
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == uuid)
        .ok_or_else(|| format!("characteristic {uuid} not found").into())
}

pub async fn read(device: &Peripheral, char: &Characteristic) -> Result<Vec<u8>, Error> {
    Ok(device.read(char).await?)
}

pub async fn write(device: &Peripheral, char: &Characteristic, value: &[u8]) -> Result<(), Error> {
    device.write(char, value, WriteType::WithResponse).await?;
    Ok(())
}

/// Read one full chunked cycle
pub async fn read_chunked(device: &Peripheral, char: &Characteristic) -> Result<Vec<u8>, Error> {
    let header = device.read(char).await?;
    let len = decode_length(&header).ok_or("expected a 4-byte length prefix")? as usize;

    let mut payload = Vec::with_capacity(initial_capacity(len));
    while payload.len() < len {
        let chunk = device.read(char).await?;
        if chunk.is_empty() {
            return Err(format!("transfer stalled at {}/{len} bytes", payload.len()).into());
        }
        payload.extend_from_slice(&chunk);
    }
    payload.truncate(len);
    Ok(payload)
}

/// Upper bound on what an announced length may preallocate
const MAX_PREALLOCATION: usize = 64 * 1024;

fn initial_capacity(announced: usize) -> usize {
    announced.min(MAX_PREALLOCATION)
}

/// Write one full chunked cycle: length prefix, then 20-byte chunks
pub async fn write_chunked(device: &Peripheral, char: &Characteristic, payload: &[u8]) -> Result<(), Error> {
    for transfer in frame(payload) {
        device.write(char, &transfer, WriteType::WithResponse).await?;
    }
    Ok(())
}

/// Whether an action status is final (anything but in-progress)
pub fn is_terminal(status: &[u8]) -> bool {
    status != STATUS_IN_PROGRESS.as_bytes()
}

/// Write `command` and poll until the action leaves the in-progress state.
///
/// Returns the final status as text.
pub async fn run_action(
    device: &Peripheral,
    char: &Characteristic,
    command: &str,
    poll: Duration,
    timeout: Duration,
) -> Result<String, Error> {
    write(device, char, command.as_bytes()).await?;

    let status = tokio::time::timeout(timeout, async {
        loop {
            tokio::time::sleep(poll).await;
            let status = device.read(char).await?;
            if is_terminal(&status) {
                return Ok::<_, btleplug::Error>(status);
            }
        }
    })
    .await
    .map_err(|_| format!("action still in progress after {timeout:?}"))??;

    Ok(String::from_utf8_lossy(&status).into_owned())
}

/// Parse a sealed mnemonic read from the device
pub fn unseal_mnemonic(payload: &[u8]) -> Result<Vec<String>, Error> {
    if payload == ERROR_SENTINEL {
        return Err("device could not create a wallet".into());
    }
    let sealed = std::str::from_utf8(payload)?;
    let words = open(sealed)?;
    Ok(words.split(' ').map(str::to_string).collect())
}

/// Create a wallet on the device and return its mnemonic
pub async fn create_mnemonic(device: &Peripheral, char: &Characteristic) -> Result<Vec<String>, Error> {
    let payload = read_chunked(device, char).await?;
    unseal_mnemonic(&payload)
}

/// Send a mnemonic for the device to restore its wallet from
pub async fn restore_mnemonic(device: &Peripheral, char: &Characteristic, words: &[String]) -> Result<(), Error> {
    let sealed = seal(&words.join(" "));
    write_chunked(device, char, sealed.as_bytes()).await
}
