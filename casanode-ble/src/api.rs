//! HTTPS client for the management API
//!
//! The API serves a certificate issued by the device's own CA, so the root
//! store contains that CA only. Every request carries the bearer token.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;

use crate::backend::{Backend, BackendFuture, BackendRequest, BackendResponse, Unreachable, Verb};
use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("failed to read CA certificate {path}: {source}")]
    ReadCa {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no certificate found in {0}")]
    NoCertificate(PathBuf),
    #[error("invalid CA certificate: {0}")]
    InvalidCa(#[from] rustls::Error),
}

pub struct HttpsBackend {
    host: Option<String>,
    port: u16,
    auth: String,
    connector: tokio_rustls::TlsConnector,
}

impl HttpsBackend {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let roots = load_ca(&config.ca_cert_path())?;
        let tls = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self {
            host: config.api_host.clone(),
            port: config.api_port,
            auth: config.api_auth.clone(),
            connector: tokio_rustls::TlsConnector::from(Arc::new(tls)),
        })
    }

    /// Host the API is reached at. Resolved per call, the LAN address can change.
    fn host(&self) -> String {
        self.host
            .clone()
            .or_else(|| crate::network::local_ipv4().map(|ip| ip.to_string()))
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }

    async fn send(&self, host: &str, request: &BackendRequest) -> Result<BackendResponse, Unreachable> {
        let server_name = ServerName::try_from(host)
            .map_err(|e| Unreachable::Tls(e.to_string()))?
            .to_owned();

        let tcp = TcpStream::connect((host, self.port))
            .await
            .map_err(|e| Unreachable::Connect(e.to_string()))?;
        let stream = self
            .connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| Unreachable::Tls(e.to_string()))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake::<_, Full<Bytes>>(io)
            .await
            .map_err(|e| Unreachable::Http(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("backend connection closed: {e}");
            }
        });

        let mut builder = hyper::Request::builder()
            .method(method(request.verb))
            .uri(format!("/{}", request.path.trim_start_matches('/')))
            .header(hyper::header::HOST, format!("{host}:{}", self.port))
            .header(hyper::header::AUTHORIZATION, format!("Bearer {}", self.auth));

        let body = match &request.body {
            Some(json) => {
                builder = builder.header(hyper::header::CONTENT_TYPE, "application/json");
                Bytes::from(json.to_string())
            }
            None => Bytes::new(),
        };

        let req = builder
            .body(Full::new(body))
            .map_err(|e| Unreachable::Http(e.to_string()))?;
        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| Unreachable::Http(e.to_string()))?;

        let status = resp.status().as_u16();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| Unreachable::Http(e.to_string()))?
            .to_bytes()
            .to_vec();

        let response = BackendResponse::new(status, body);
        if response.is_success() {
            Ok(response)
        } else {
            Err(Unreachable::Status(status))
        }
    }
}

impl Backend for HttpsBackend {
    fn call(&self, request: BackendRequest) -> BackendFuture<'_> {
        Box::pin(async move {
            let host = self.host();
            let url = format!("https://{host}:{}/{}", self.port, request.path);
            tracing::info!(
                verb = request.verb.as_str(),
                %url,
                body = ?request.redacted_body(),
                timeout = ?request.timeout,
                "backend request"
            );

            let result = match tokio::time::timeout(request.timeout, self.send(&host, &request)).await {
                Ok(result) => result,
                Err(_) => Err(Unreachable::Timeout(request.timeout)),
            };

            match &result {
                Ok(resp) => tracing::info!(verb = request.verb.as_str(), %url, status = resp.status, "backend request succeeded"),
                Err(e) => tracing::error!(verb = request.verb.as_str(), %url, "backend request failed: {e}"),
            }
            result
        })
    }
}

fn method(verb: Verb) -> hyper::Method {
    match verb {
        Verb::Get => hyper::Method::GET,
        Verb::Post => hyper::Method::POST,
        Verb::Put => hyper::Method::PUT,
        Verb::Delete => hyper::Method::DELETE,
    }
}

fn load_ca(path: &Path) -> Result<rustls::RootCertStore, ApiError> {
    let pem = std::fs::read(path).map_err(|source| ApiError::ReadCa {
        path: path.to_path_buf(),
        source,
    })?;

    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
        let cert = cert.map_err(|source| ApiError::ReadCa {
            path: path.to_path_buf(),
            source,
        })?;
        roots.add(cert)?;
    }

    if roots.is_empty() {
        return Err(ApiError::NoCertificate(path.to_path_buf()));
    }
    Ok(roots)
}
