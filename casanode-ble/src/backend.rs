//! Backend call boundary - the management API every attribute delegates to

use std::time::Duration;

use futures::future::BoxFuture;

/// Default timeout for reads and small writes
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for wallet create/restore
pub const WALLET_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for install and renew operations
pub const LONG_TIMEOUT: Duration = Duration::from_secs(60);

/// Body fields that are never written to the log
pub const SENSITIVE_FIELDS: &[&str] = &["mnemonic", "passphrase"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub verb: Verb,
    /// Path relative to the API root, e.g. `api/v1/status`
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl BackendRequest {
    pub fn new(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            verb,
            path: path.into(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Verb::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Verb::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Verb::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Verb::Delete, path)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Body safe for logging, sensitive fields replaced by `[CENSORED]`
    pub fn redacted_body(&self) -> Option<serde_json::Value> {
        self.body.as_ref().map(redact)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl BackendResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Any failure to obtain a successful response.
///
/// Network errors, TLS errors, timeouts and non-2xx statuses all end up here;
/// the variant only matters for the log line.
#[derive(Debug, thiserror::Error)]
pub enum Unreachable {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("tls handshake failed: {0}")]
    Tls(String),
    #[error("request failed: {0}")]
    Http(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("backend returned status {0}")]
    Status(u16),
}

pub type BackendFuture<'a> = BoxFuture<'a, Result<BackendResponse, Unreachable>>;

/// The management API as seen by attributes.
///
/// Implementations hold read-only configuration only and are shared by all
/// attributes behind an `Arc<dyn Backend>`.
pub trait Backend: Send + Sync {
    fn call(&self, request: BackendRequest) -> BackendFuture<'_>;
}

/// Replace sensitive top-level fields of a JSON object
pub fn redact(body: &serde_json::Value) -> serde_json::Value {
    let mut body = body.clone();
    if let Some(map) = body.as_object_mut() {
        for field in SENSITIVE_FIELDS {
            if let Some(v) = map.get_mut(*field) {
                *v = serde_json::Value::String("[CENSORED]".to_string());
            }
        }
    }
    body
}
