//! Attributes that map onto one backend value per read or write

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Value, json};

use super::{Attribute, Flags, error_sentinel, fetch_json, send};
use crate::backend::{Backend, BackendRequest, WALLET_TIMEOUT};
use crate::error::RejectReason;
use crate::network;

const CONFIGURATION: &str = "api/v1/node/configuration";
const INSTALL_DOCKER_IMAGE: &str = "api/v1/install/docker-image";

/// Validation applied to a written configuration value
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// Strictly more than n characters
    LongerThan(usize),
    OneOf(&'static [&'static str]),
    /// IP literal or a resolvable host name
    Host,
    Port,
    Range(u32, u32),
    /// Any write reinstalls the docker image instead of updating the field
    InstallImage,
}

impl Rule {
    /// Validate `value` and produce the JSON to store
    pub async fn check(&self, value: &str) -> Result<Value, RejectReason> {
        match *self {
            Rule::LongerThan(min) => {
                if value.chars().count() > min {
                    Ok(json!(value))
                } else {
                    Err(RejectReason::InvalidLength)
                }
            }
            Rule::OneOf(allowed) => {
                if allowed.contains(&value) {
                    Ok(json!(value))
                } else {
                    Err(RejectReason::InvalidValue(value.to_string()))
                }
            }
            Rule::Host => {
                if network::is_valid_ip(value) || (!value.is_empty() && network::is_resolvable(value).await) {
                    Ok(json!(value))
                } else {
                    Err(RejectReason::InvalidValue(value.to_string()))
                }
            }
            Rule::Port => Rule::Range(1, 65_535).check_number(value),
            Rule::Range(..) => self.check_number(value),
            Rule::InstallImage => Ok(Value::Null),
        }
    }

    fn check_number(&self, value: &str) -> Result<Value, RejectReason> {
        let Rule::Range(lo, hi) = *self else {
            return Err(RejectReason::InvalidValue(value.to_string()));
        };
        match value.parse::<u32>() {
            Ok(n) if (lo..=hi).contains(&n) => Ok(json!(n)),
            _ => Err(RejectReason::InvalidValue(value.to_string())),
        }
    }
}

/// Render a JSON scalar the way the attribute reports it
fn render(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// One field of the node configuration document
pub struct ConfigField {
    id: &'static str,
    backend: Arc<dyn Backend>,
    key: &'static str,
    missing: &'static str,
    error_value: &'static str,
    rule: Option<Rule>,
}

impl ConfigField {
    pub fn new(id: &'static str, backend: Arc<dyn Backend>, key: &'static str, missing: &'static str, rule: Rule) -> Self {
        Self {
            id,
            backend,
            key,
            missing,
            error_value: "error",
            rule: Some(rule),
        }
    }

    pub fn read_only(id: &'static str, backend: Arc<dyn Backend>, key: &'static str, missing: &'static str) -> Self {
        Self {
            rule: None,
            ..Self::new(id, backend, key, missing, Rule::InstallImage)
        }
    }

    /// Value reported when the backend can't be read
    pub fn with_error_value(mut self, value: &'static str) -> Self {
        self.error_value = value;
        self
    }

    async fn store(&self, value: &str) -> Result<(), RejectReason> {
        let Some(rule) = self.rule else {
            return Err(RejectReason::NotSupported);
        };

        if let Rule::InstallImage = rule {
            tracing::info!(attribute = self.id, "reinstalling docker image");
            let request = BackendRequest::post(INSTALL_DOCKER_IMAGE).with_timeout(WALLET_TIMEOUT);
            return send(&*self.backend, request).await;
        }

        let checked = rule.check(value).await.inspect_err(|e| {
            tracing::error!(attribute = self.id, "rejected {value:?}: {e}");
        })?;
        tracing::info!(attribute = self.id, %value, "updating configuration");
        let mut body = serde_json::Map::new();
        body.insert(self.key.to_string(), checked);
        let request = BackendRequest::put(CONFIGURATION).with_body(Value::Object(body));
        send(&*self.backend, request).await
    }
}

impl Attribute for ConfigField {
    fn id(&self) -> &'static str {
        self.id
    }

    fn flags(&self) -> Flags {
        if self.rule.is_some() { Flags::READ_WRITE } else { Flags::READ }
    }

    fn read(&self) -> BoxFuture<'_, Result<Vec<u8>, RejectReason>> {
        Box::pin(async move {
            let value = match fetch_json(&*self.backend, CONFIGURATION).await {
                Some(config) => config
                    .get(self.key)
                    .and_then(render)
                    .unwrap_or_else(|| self.missing.to_string()),
                None => self.error_value.to_string(),
            };
            tracing::info!(attribute = self.id, %value, "read");
            Ok(value.into_bytes())
        })
    }

    fn write(&self, value: Vec<u8>) -> BoxFuture<'_, Result<(), RejectReason>> {
        Box::pin(async move {
            let value = String::from_utf8_lossy(&value).trim().to_string();
            self.store(&value).await
        })
    }
}

/// Read-only value picked out of a backend document by JSON pointer
pub struct StatusField {
    id: &'static str,
    backend: Arc<dyn Backend>,
    path: &'static str,
    pointer: &'static str,
    missing: &'static str,
    error_value: &'static str,
}

impl StatusField {
    pub fn new(
        id: &'static str,
        backend: Arc<dyn Backend>,
        path: &'static str,
        pointer: &'static str,
        missing: &'static str,
    ) -> Self {
        Self {
            id,
            backend,
            path,
            pointer,
            missing,
            error_value: "error",
        }
    }

    pub fn with_error_value(mut self, value: &'static str) -> Self {
        self.error_value = value;
        self
    }
}

impl Attribute for StatusField {
    fn id(&self) -> &'static str {
        self.id
    }

    fn flags(&self) -> Flags {
        Flags::READ
    }

    fn read(&self) -> BoxFuture<'_, Result<Vec<u8>, RejectReason>> {
        Box::pin(async move {
            let value = match fetch_json(&*self.backend, self.path).await {
                Some(doc) => doc
                    .pointer(self.pointer)
                    .and_then(render)
                    .unwrap_or_else(|| self.missing.to_string()),
                None => self.error_value.to_string(),
            };
            tracing::info!(attribute = self.id, %value, "read");
            Ok(value.into_bytes())
        })
    }
}

/// Booleans of a backend document rendered as `0`/`1` digits
pub struct FlagsField {
    id: &'static str,
    backend: Arc<dyn Backend>,
    path: &'static str,
    keys: &'static [&'static str],
}

impl FlagsField {
    pub fn new(id: &'static str, backend: Arc<dyn Backend>, path: &'static str, keys: &'static [&'static str]) -> Self {
        Self { id, backend, path, keys }
    }

    pub async fn fetch(&self) -> Vec<u8> {
        let Some(doc) = fetch_json(&*self.backend, self.path).await else {
            tracing::error!(attribute = self.id, "could not read {}", self.path);
            return error_sentinel();
        };
        let values: Vec<bool> = self
            .keys
            .iter()
            .map(|key| doc.get(*key).and_then(Value::as_bool).unwrap_or(false))
            .collect();
        let flags = casanode_proto::flags(&values);
        tracing::info!(attribute = self.id, %flags, "read");
        flags.into_bytes()
    }
}

impl Attribute for FlagsField {
    fn id(&self) -> &'static str {
        self.id
    }

    fn flags(&self) -> Flags {
        Flags::READ
    }

    fn read(&self) -> BoxFuture<'_, Result<Vec<u8>, RejectReason>> {
        Box::pin(async move { Ok(self.fetch().await) })
    }
}

/// `{"d":<download>,"u":<upload>}` from the status document
pub struct BandwidthSpeed {
    backend: Arc<dyn Backend>,
}

impl BandwidthSpeed {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }
}

impl Attribute for BandwidthSpeed {
    fn id(&self) -> &'static str {
        casanode_proto::ble::ids::BANDWIDTH_SPEED
    }

    fn flags(&self) -> Flags {
        Flags::READ
    }

    fn read(&self) -> BoxFuture<'_, Result<Vec<u8>, RejectReason>> {
        Box::pin(async move {
            let doc = fetch_json(&*self.backend, "api/v1/status").await.unwrap_or(Value::Null);
            let pick = |key: &str| doc.pointer(&format!("/bandwidth/{key}")).cloned().unwrap_or(json!(-1));
            let value = json!({"d": pick("download"), "u": pick("upload")}).to_string();
            tracing::info!(attribute = self.id(), %value, "read");
            Ok(value.into_bytes())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;

    #[tokio::test]
    async fn moniker_must_be_longer_than_eight() {
        let backend = MockBackend::new();
        backend.respond(CONFIGURATION, 200, "{}");
        let field = ConfigField::new("moniker", backend.clone(), "moniker", "DefaultMoniker", Rule::LongerThan(8));

        assert_eq!(field.write(b"shorty".to_vec()).await, Err(RejectReason::InvalidLength));
        assert_eq!(field.write(b"12345678".to_vec()).await, Err(RejectReason::InvalidLength));
        assert!(backend.calls().is_empty());

        field.write(b"  casanode-01 \n".to_vec()).await.unwrap();
        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body, Some(json!({"moniker": "casanode-01"})));
    }

    #[tokio::test]
    async fn ports_are_stored_as_numbers() {
        let backend = MockBackend::new();
        backend.respond(CONFIGURATION, 200, "{}");
        let field = ConfigField::new("node-port", backend.clone(), "nodePort", "0", Rule::Port);

        for bad in ["0", "65536", "-1", "http"] {
            assert!(matches!(
                field.write(bad.as_bytes().to_vec()).await,
                Err(RejectReason::InvalidValue(_))
            ));
        }
        field.write(b"16567".to_vec()).await.unwrap();
        assert_eq!(backend.calls()[0].body, Some(json!({"nodePort": 16567})));
    }

    #[tokio::test]
    async fn max_peers_range() {
        assert!(Rule::Range(1, 99_999).check("99999").await.is_ok());
        assert!(Rule::Range(1, 99_999).check("100000").await.is_err());
        assert_eq!(Rule::Range(1, 99_999).check("250").await, Ok(json!(250)));
    }

    #[tokio::test]
    async fn enumerated_values() {
        let rule = Rule::OneOf(&["wireguard", "v2ray"]);
        assert!(rule.check("v2ray").await.is_ok());
        assert!(rule.check("openvpn").await.is_err());
    }

    #[tokio::test]
    async fn host_accepts_ip_literals_and_rejects_garbage() {
        assert!(Rule::Host.check("192.168.0.1").await.is_ok());
        assert!(Rule::Host.check("2001:db8::1").await.is_ok());
        assert!(Rule::Host.check("999.999.999.999").await.is_err());
        assert!(Rule::Host.check("").await.is_err());
        assert!(Rule::Host.check("not a host name").await.is_err());
    }

    #[tokio::test]
    async fn backend_failure_surfaces_on_write() {
        let backend = MockBackend::new();
        backend.respond(CONFIGURATION, 500, "");
        let field = ConfigField::new("vpn-type", backend, "vpnType", "", Rule::OneOf(&["wireguard", "v2ray"]));
        assert_eq!(field.write(b"wireguard".to_vec()).await, Err(RejectReason::BackendFailed));
    }

    #[tokio::test]
    async fn config_read_falls_back() {
        let backend = MockBackend::new();
        backend.respond_json(CONFIGURATION, json!({"nodePort": 16567, "moniker": "livingroom"}));
        let port = ConfigField::new("node-port", backend.clone(), "nodePort", "0", Rule::Port);
        let kind = ConfigField::new("node-type", backend.clone(), "nodeType", "", Rule::OneOf(&[]));
        assert_eq!(port.read().await.unwrap(), b"16567");
        assert_eq!(kind.read().await.unwrap(), b"");

        let offline = MockBackend::new();
        let peers = ConfigField::new("max-peers", offline.clone(), "maximumPeers", "0", Rule::Port).with_error_value("0");
        let moniker = ConfigField::new("moniker", offline, "moniker", "DefaultMoniker", Rule::LongerThan(8));
        assert_eq!(peers.read().await.unwrap(), b"0");
        assert_eq!(moniker.read().await.unwrap(), b"error");
    }

    #[tokio::test]
    async fn docker_image_write_reinstalls() {
        let backend = MockBackend::new();
        backend.respond(INSTALL_DOCKER_IMAGE, 200, "");
        let field = ConfigField::new("docker-image", backend.clone(), "dockerImage", "unknown", Rule::InstallImage);
        field.write(b"anything".to_vec()).await.unwrap();
        let calls = backend.calls();
        assert_eq!(calls[0].path, INSTALL_DOCKER_IMAGE);
        assert_eq!(calls[0].timeout, WALLET_TIMEOUT);
    }

    #[tokio::test]
    async fn read_only_field_refuses_writes() {
        let backend = MockBackend::new();
        let field = ConfigField::read_only("casanode-version", backend.clone(), "casanodeVersion", "unknown");
        assert_eq!(field.flags(), Flags::READ);
        assert_eq!(field.write(b"1.0".to_vec()).await, Err(RejectReason::NotSupported));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn status_field_follows_pointer() {
        let backend = MockBackend::new();
        backend.respond_json(
            "api/v1/status",
            json!({"certificate": {"expirationDate": "2027-01-01"}, "systemOs": " Ubuntu 24.04\n", "status": {"peers": 3}}),
        );
        let expiry = StatusField::new("cert-expirity", backend.clone(), "api/v1/status", "/certificate/expirationDate", "error");
        let os = StatusField::new("system-os", backend.clone(), "api/v1/status", "/systemOs", "error");
        let peers = StatusField::new("online-users", backend.clone(), "api/v1/status", "/status/peers", "-1");
        let location = StatusField::new("node-location", backend.clone(), "api/v1/status", "/nodeLocation", "");
        assert_eq!(expiry.read().await.unwrap(), b"2027-01-01");
        assert_eq!(os.read().await.unwrap(), b"Ubuntu 24.04");
        assert_eq!(peers.read().await.unwrap(), b"3");
        assert_eq!(location.read().await.unwrap(), b"");
    }

    #[tokio::test]
    async fn status_field_error_value() {
        let backend = MockBackend::new();
        backend.respond("api/v1/status", 200, "not json");
        let peers = StatusField::new("online-users", backend, "api/v1/status", "/status/peers", "-1").with_error_value("0");
        assert_eq!(peers.read().await.unwrap(), b"0");
    }

    #[tokio::test]
    async fn installation_flags() {
        let backend = MockBackend::new();
        backend.respond_json(
            "api/v1/check/installation",
            json!({"image": true, "containerExists": false, "nodeConfig": true, "vpnConfig": true, "wallet": true}),
        );
        let field = FlagsField::new(
            "check-installation",
            backend,
            "api/v1/check/installation",
            &["image", "containerExists", "nodeConfig", "vpnConfig", "certificateKey", "wallet"],
        );
        assert_eq!(field.read().await.unwrap(), b"101101");
    }

    #[tokio::test]
    async fn flags_field_reports_error() {
        let field = FlagsField::new("check-installation", MockBackend::new(), "api/v1/check/installation", &["image"]);
        assert_eq!(field.read().await.unwrap(), b"error");
    }

    #[tokio::test]
    async fn bandwidth_defaults_to_minus_one() {
        let backend = MockBackend::new();
        backend.respond_json("api/v1/status", json!({"bandwidth": {"download": 120.5}}));
        let field = BandwidthSpeed::new(backend);
        let value: Value = serde_json::from_slice(&field.read().await.unwrap()).unwrap();
        assert_eq!(value, json!({"d": 120.5, "u": -1}));

        let offline = BandwidthSpeed::new(MockBackend::new());
        let value: Value = serde_json::from_slice(&offline.read().await.unwrap()).unwrap();
        assert_eq!(value, json!({"d": -1, "u": -1}));
    }
}
