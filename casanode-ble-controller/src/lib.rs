//! Casanode BLE Controller
//!
//! BLE client for configuring and controlling Casanode devices.
//!
//! # Example
//!
//! ```ignore
//! use casanode_ble_controller::ble;
//! use casanode_proto::ble::ids;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = ble::connect(None).await?;
//!     let moniker = ble::find_characteristic(&device, ble::attribute_uuid("seed", ids::MONIKER)?)?;
//!     println!("{}", String::from_utf8_lossy(&ble::read(&device, &moniker).await?));
//!     Ok(())
//! }
//! ```

pub mod ble;
