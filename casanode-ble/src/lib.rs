//! Casanode BLE peripheral
//!
//! Exposes node configuration and control as GATT characteristics and
//! forwards every operation to the local management API.
//!
//! Two engines back the stateful characteristics:
//! - [`action::ActionMachine`]: a command write starts one background backend
//!   call, reads report `0`/`1`/result/`-1`
//! - [`chunked::ChunkedAttribute`]: payloads larger than one attribute value
//!   move as a length prefix followed by 20-byte chunks
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use casanode_ble::{api::HttpsBackend, attributes, config::Config, gatt};
//!
//! let config = Config::load("/etc/casanode.conf".as_ref())?;
//! let backend = Arc::new(HttpsBackend::new(&config)?);
//! let server = gatt::serve(&config, attributes::all(&config, backend)).await?;
//! tokio::signal::ctrl_c().await?;
//! drop(server);
//! ```

pub mod action;
pub mod api;
pub mod attributes;
pub mod backend;
pub mod chunked;
pub mod config;
pub mod error;
pub mod gatt;
pub mod logging;
pub mod network;
pub mod notify;

#[cfg(test)]
pub(crate) mod testing;

pub use error::RejectReason;
