//! Peripheral configuration
//!
//! Read from an env-style `KEY=VALUE` file (default `/etc/casanode.conf`).
//! Process environment variables take precedence over the file.

use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const DEFAULT_CONFIG_FILE: &str = "/etc/casanode.conf";

const DEFAULT_CERTS_DIR: &str = "/opt/casanode/app/certs";
const DEFAULT_LOG_DIR: &str = "/var/log/casanode";
const DEFAULT_WEB_LISTEN: &str = "0.0.0.0:8080";
const DEFAULT_API_LISTEN: &str = "0.0.0.0:8081";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Something the operator should know about, collected while loading.
///
/// Loading runs before the log subscriber exists, so these are carried on
/// [`Config`] and logged once logging is up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigWarning {
    #[error("configuration file {0} not found, using defaults")]
    MissingFile(PathBuf),
    #[error("BLE_CHARACTERISTIC_SEED not set, characteristic UUIDs will change on restart")]
    GeneratedSeed,
    #[error("API_AUTH not set, backend calls will be rejected")]
    MissingAuth,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Advertised local name and adapter alias
    pub device_name: String,
    /// Directory holding `ca.crt`, the private trust anchor of the management API
    pub certs_dir: PathBuf,
    pub log_dir: PathBuf,
    pub service_uuid: Uuid,
    pub discovery_uuid: Uuid,
    /// Seed for characteristic UUID derivation
    pub characteristic_seed: String,
    pub web_port: u16,
    pub api_port: u16,
    /// Bearer token for the management API
    pub api_auth: String,
    /// Backend host override, otherwise the first non-loopback IPv4 address is used
    pub api_host: Option<String>,
    pub warnings: Vec<ConfigWarning>,
}

impl Config {
    /// Load from `path` (if it exists) and the process environment
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = if path.exists() {
            let ini = ini::Ini::load_from_file(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Some(ini)
        } else {
            None
        };

        let mut config = Self::from_sources(file.as_ref(), |key| std::env::var(key).ok())?;
        if file.is_none() {
            config.warnings.insert(0, ConfigWarning::MissingFile(path.to_path_buf()));
        }
        Ok(config)
    }

    /// Build from an optional parsed file and an environment lookup
    pub fn from_sources<E>(file: Option<&ini::Ini>, env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| -> Option<String> {
            env(key)
                .or_else(|| {
                    file.and_then(|ini| ini.general_section().get(key))
                        .map(str::to_string)
                })
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut warnings = Vec::new();

        let characteristic_seed = get("BLE_CHARACTERISTIC_SEED").unwrap_or_else(|| {
            warnings.push(ConfigWarning::GeneratedSeed);
            Uuid::new_v4().to_string()
        });

        let api_auth = get("API_AUTH").unwrap_or_else(|| {
            warnings.push(ConfigWarning::MissingAuth);
            Uuid::new_v4().to_string()
        });

        Ok(Self {
            device_name: get("BLENO_DEVICE_NAME")
                .unwrap_or_else(|| casanode_proto::ble::DEVICE_NAME.to_string()),
            certs_dir: PathBuf::from(get("CERTS_DIR").unwrap_or_else(|| DEFAULT_CERTS_DIR.into())),
            log_dir: PathBuf::from(get("LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.into())),
            service_uuid: parse_uuid("BLE_UUID", get("BLE_UUID"), casanode_proto::ble::SERVICE_UUID)?,
            discovery_uuid: parse_uuid(
                "BLE_DISCOVERY_UUID",
                get("BLE_DISCOVERY_UUID"),
                casanode_proto::ble::DISCOVERY_UUID,
            )?,
            characteristic_seed,
            web_port: listen_port("WEB_LISTEN", get("WEB_LISTEN"), DEFAULT_WEB_LISTEN)?,
            api_port: listen_port("API_LISTEN", get("API_LISTEN"), DEFAULT_API_LISTEN)?,
            api_auth,
            api_host: get("API_HOST"),
            warnings,
        })
    }

    /// Path of the CA certificate used to verify the management API
    pub fn ca_cert_path(&self) -> PathBuf {
        self.certs_dir.join("ca.crt")
    }

    /// UUID of a characteristic derived from the configured seed
    pub fn characteristic_uuid(&self, id: &str) -> Uuid {
        casanode_proto::ble::characteristic_uuid(&self.characteristic_seed, id)
    }
}

fn parse_uuid(key: &'static str, value: Option<String>, default: &str) -> Result<Uuid, ConfigError> {
    let value = value.unwrap_or_else(|| default.to_string());
    Uuid::parse_str(&value).map_err(|_| ConfigError::InvalidValue {
        key,
        value,
        reason: "not a UUID",
    })
}

fn listen_port(key: &'static str, value: Option<String>, default: &str) -> Result<u16, ConfigError> {
    let value = value.unwrap_or_else(|| default.to_string());
    let port = match value.rsplit_once(':') {
        Some((_, port)) => port,
        None => return listen_port(key, None, default),
    };
    port.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.clone(),
        reason: "expected <host>:<port>",
    })
}
