//! BLE GATT identifiers and command keywords for the Casanode service
//!
//! Characteristic UUIDs are not fixed: each device derives them from its
//! configured seed so that only a paired app knows where to look.

use uuid::Uuid;

/// Default primary service UUID
pub const SERVICE_UUID: &str = "00001820-0000-1000-8000-00805f9b34fb";

/// Default discovery characteristic UUID (the only one not derived from the seed)
pub const DISCOVERY_UUID: &str = "0000a2d4-0000-1000-8000-00805f9b34fb";

/// Default advertised local name
pub const DEVICE_NAME: &str = "Casanode";

/// Derive a characteristic UUID: `uuid5(NAMESPACE_URL, "<seed>+<id>")`
pub fn characteristic_uuid(seed: &str, id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("{seed}+{id}").as_bytes())
}

/// Characteristic identifiers, fed to [`characteristic_uuid`]
pub mod ids {
    pub const DISCOVERY: &str = "discovery";
    pub const NODE_STATUS: &str = "node-status";
    pub const MONIKER: &str = "moniker";
    pub const NODE_TYPE: &str = "node-type";
    pub const NODE_IP: &str = "node-ip";
    pub const NODE_PORT: &str = "node-port";
    pub const VPN_TYPE: &str = "vpn-type";
    pub const VPN_PORT: &str = "vpn-port";
    pub const MAX_PEERS: &str = "max-peers";
    pub const NODE_LOCATION: &str = "node-location";
    pub const CERT_EXPIRITY: &str = "cert-expirity";
    pub const ONLINE_USERS: &str = "online-users";
    pub const BANDWIDTH_SPEED: &str = "bandwidth-speed";
    pub const SYSTEM_UPTIME: &str = "system-uptime";
    pub const CASANODE_VERSION: &str = "casanode-version";
    pub const DOCKER_IMAGE: &str = "docker-image";
    pub const INSTALL_DOCKER_IMAGE: &str = "install-docker-image";
    pub const SYSTEM_OS: &str = "system-os";
    pub const SYSTEM_ARCH: &str = "system-arch";
    pub const SYSTEM_KERNEL: &str = "system-kernel";
    pub const INSTALL_CONFIGS: &str = "install-configs";
    pub const WALLET_ACTIONS: &str = "wallet-actions";
    pub const NODE_KEYRING_BACKEND: &str = "node-keyring-backend";
    pub const NODE_ADDRESS: &str = "node-address";
    pub const NODE_BALANCE: &str = "node-balance";
    pub const WALLET_MNEMONIC: &str = "wallet-mnemonic";
    pub const WALLET_ADDRESS: &str = "wallet-address";
    pub const SYSTEM_ACTIONS: &str = "system-actions";
    pub const NODE_PASSPHRASE: &str = "node-passphrase";
    pub const CHECK_PORT: &str = "check-port";
    pub const CERTIFICATE_ACTIONS: &str = "certificate-actions";
    pub const NODE_ACTIONS: &str = "node-actions";
    pub const CHECK_INSTALLATION: &str = "check-installation";
}

/// Command keywords written to action characteristics (trimmed, lowercase)
pub mod commands {
    pub const RENEW: &str = "renew";
    pub const CREATE: &str = "create";
    pub const INSTALL: &str = "install";
    pub const UDVPN: &str = "udvpn";

    pub const PORT_NODE: &str = "node";
    pub const PORT_VPN: &str = "vpn";

    pub const UPDATE_SYSTEM: &str = "update-system";
    pub const UPDATE_SENTINEL: &str = "update-sentinel";
    pub const REBOOT: &str = "reboot";
    pub const HALT: &str = "halt";
    pub const RESET: &str = "reset";

    pub const START: &str = "start";
    pub const STOP: &str = "stop";
    pub const RESTART: &str = "restart";
    pub const REMOVE: &str = "remove";
}
