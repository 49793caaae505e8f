//! Every characteristic the peripheral exposes
//!
//! Stateful attributes are thin instantiations of [`ActionMachine`] or
//! [`ChunkedAttribute`]; the rest make one backend call per read or write.

mod certificate;
mod discovery;
mod fields;
mod install;
mod node;
mod system;
mod wallet;

use std::sync::Arc;

use casanode_proto::ERROR_SENTINEL;
use casanode_proto::ble::ids;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::action::{Action, ActionMachine};
use crate::backend::{Backend, BackendRequest};
use crate::chunked::{ChunkedAttribute, ChunkedTransfer};
use crate::config::Config;
use crate::error::RejectReason;
use crate::notify::NotifyGate;

pub use certificate::CertificateActions;
pub use discovery::Discovery;
pub use fields::{BandwidthSpeed, ConfigField, FlagsField, Rule, StatusField};
pub use install::{InstallConfigs, InstallDockerImage};
pub use node::{CheckPort, NodeActions, NodeBalance};
pub use system::SystemActions;
pub use wallet::{WalletActions, WalletMnemonic, WalletPassphrase};

/// GATT characteristic flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub read: bool,
    pub write: bool,
    pub notify: bool,
}

impl Flags {
    pub const READ: Flags = Flags { read: true, write: false, notify: false };
    pub const WRITE: Flags = Flags { read: false, write: true, notify: false };
    pub const READ_WRITE: Flags = Flags { read: true, write: true, notify: false };
    pub const READ_WRITE_NOTIFY: Flags = Flags { read: true, write: true, notify: true };
}

/// Uniform surface the GATT binding serves
pub trait Attribute: Send + Sync {
    fn id(&self) -> &'static str;

    fn flags(&self) -> Flags;

    fn uuid(&self, config: &Config) -> Uuid {
        config.characteristic_uuid(self.id())
    }

    fn read(&self) -> BoxFuture<'_, Result<Vec<u8>, RejectReason>> {
        Box::pin(async { Err(RejectReason::NotSupported) })
    }

    fn write(&self, _value: Vec<u8>) -> BoxFuture<'_, Result<(), RejectReason>> {
        Box::pin(async { Err(RejectReason::NotSupported) })
    }

    /// Present only for attributes with the notify flag
    fn gate(&self) -> Option<&NotifyGate> {
        None
    }
}

/// An [`ActionMachine`] exposed as a characteristic
pub struct ActionAttribute<A: Action> {
    machine: ActionMachine<A>,
    flags: Flags,
}

impl<A: Action> ActionAttribute<A> {
    pub fn new(action: A, backend: Arc<dyn Backend>, flags: Flags) -> Self {
        Self {
            machine: ActionMachine::new(action, backend),
            flags,
        }
    }

    pub fn machine(&self) -> &ActionMachine<A> {
        &self.machine
    }
}

impl<A: Action> Attribute for ActionAttribute<A> {
    fn id(&self) -> &'static str {
        self.machine.action().name()
    }

    fn flags(&self) -> Flags {
        self.flags
    }

    fn read(&self) -> BoxFuture<'_, Result<Vec<u8>, RejectReason>> {
        Box::pin(async move { Ok(self.machine.read()) })
    }

    fn write(&self, value: Vec<u8>) -> BoxFuture<'_, Result<(), RejectReason>> {
        Box::pin(async move { self.machine.submit(&value) })
    }

    fn gate(&self) -> Option<&NotifyGate> {
        self.flags.notify.then(|| self.machine.gate())
    }
}

impl<T: ChunkedTransfer> Attribute for ChunkedAttribute<T> {
    fn id(&self) -> &'static str {
        self.transfer().name()
    }

    fn flags(&self) -> Flags {
        Flags::READ_WRITE
    }

    fn read(&self) -> BoxFuture<'_, Result<Vec<u8>, RejectReason>> {
        Box::pin(async move { Ok(ChunkedAttribute::read(self).await) })
    }

    fn write(&self, value: Vec<u8>) -> BoxFuture<'_, Result<(), RejectReason>> {
        Box::pin(async move {
            // A bad header abandons the cycle; the write itself is acknowledged.
            let _ = ChunkedAttribute::write(self, &value).await;
            Ok(())
        })
    }
}

/// GET `path` and parse the body as JSON, `None` on any failure
pub(crate) async fn fetch_json(backend: &dyn Backend, path: &str) -> Option<serde_json::Value> {
    let response = backend.call(BackendRequest::get(path)).await.ok()?;
    match response.json() {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!(%path, "malformed response body: {e}");
            None
        }
    }
}

/// Send `request`, mapping any failure to [`RejectReason::BackendFailed`]
pub(crate) async fn send(backend: &dyn Backend, request: BackendRequest) -> Result<(), RejectReason> {
    backend
        .call(request)
        .await
        .map(|_| ())
        .map_err(|_| RejectReason::BackendFailed)
}

pub(crate) fn error_sentinel() -> Vec<u8> {
    ERROR_SENTINEL.to_vec()
}

/// Build every attribute, in registration order
pub fn all(config: &Config, backend: Arc<dyn Backend>) -> Vec<Arc<dyn Attribute>> {
    let b = || Arc::clone(&backend);

    vec![
        Arc::new(Discovery::new(config.web_port)),
        Arc::new(StatusField::new(ids::NODE_STATUS, b(), "api/v1/node/status", "/status", "error")),
        Arc::new(ConfigField::new(ids::MONIKER, b(), "moniker", "DefaultMoniker", Rule::LongerThan(8))),
        Arc::new(ConfigField::new(
            ids::NODE_TYPE,
            b(),
            "nodeType",
            "",
            Rule::OneOf(&["residential", "datacenter"]),
        )),
        Arc::new(ConfigField::new(ids::NODE_IP, b(), "nodeIp", "", Rule::Host)),
        Arc::new(ConfigField::new(ids::NODE_PORT, b(), "nodePort", "0", Rule::Port)),
        Arc::new(ConfigField::new(
            ids::VPN_TYPE,
            b(),
            "vpnType",
            "",
            Rule::OneOf(&["wireguard", "v2ray"]),
        )),
        Arc::new(ConfigField::new(ids::VPN_PORT, b(), "vpnPort", "0", Rule::Port)),
        Arc::new(
            ConfigField::new(ids::MAX_PEERS, b(), "maximumPeers", "0", Rule::Range(1, 99_999)).with_error_value("0"),
        ),
        Arc::new(StatusField::new(ids::NODE_LOCATION, b(), "api/v1/status", "/nodeLocation", "")),
        Arc::new(StatusField::new(
            ids::CERT_EXPIRITY,
            b(),
            "api/v1/status",
            "/certificate/expirationDate",
            "error",
        )),
        Arc::new(StatusField::new(ids::ONLINE_USERS, b(), "api/v1/status", "/status/peers", "-1").with_error_value("0")),
        Arc::new(BandwidthSpeed::new(b())),
        Arc::new(StatusField::new(ids::SYSTEM_UPTIME, b(), "api/v1/status", "/uptime", "error")),
        Arc::new(ConfigField::read_only(ids::CASANODE_VERSION, b(), "casanodeVersion", "unknown")),
        Arc::new(ConfigField::new(ids::DOCKER_IMAGE, b(), "dockerImage", "unknown", Rule::InstallImage)),
        Arc::new(ActionAttribute::new(InstallDockerImage, b(), Flags::READ_WRITE)),
        Arc::new(StatusField::new(ids::SYSTEM_OS, b(), "api/v1/status", "/systemOs", "error")),
        Arc::new(StatusField::new(ids::SYSTEM_ARCH, b(), "api/v1/status", "/systemArch", "error")),
        Arc::new(StatusField::new(ids::SYSTEM_KERNEL, b(), "api/v1/status", "/systemKernel", "error")),
        Arc::new(ActionAttribute::new(InstallConfigs, b(), Flags::READ_WRITE_NOTIFY)),
        Arc::new(ActionAttribute::new(WalletActions, b(), Flags::WRITE)),
        Arc::new(ConfigField::new(
            ids::NODE_KEYRING_BACKEND,
            b(),
            "backend",
            "unknown",
            Rule::OneOf(&["test", "file"]),
        )),
        Arc::new(StatusField::new(ids::NODE_ADDRESS, b(), "api/v1/node/address", "/address", "error")),
        Arc::new(ActionAttribute::new(NodeBalance, b(), Flags::READ_WRITE_NOTIFY)),
        Arc::new(ChunkedAttribute::new(WalletMnemonic::new(b()))),
        Arc::new(StatusField::new(ids::WALLET_ADDRESS, b(), "api/v1/wallet/address", "/address", "error")),
        Arc::new(ActionAttribute::new(SystemActions, b(), Flags::READ_WRITE)),
        Arc::new(WalletPassphrase::new(b())),
        Arc::new(ActionAttribute::new(CheckPort, b(), Flags::READ_WRITE_NOTIFY)),
        Arc::new(ActionAttribute::new(CertificateActions, b(), Flags::READ_WRITE_NOTIFY)),
        Arc::new(ActionAttribute::new(NodeActions, b(), Flags::WRITE)),
        Arc::new(FlagsField::new(
            ids::CHECK_INSTALLATION,
            b(),
            "api/v1/check/installation",
            &["image", "containerExists", "nodeConfig", "vpnConfig", "certificateKey", "wallet"],
        )),
    ]
}
