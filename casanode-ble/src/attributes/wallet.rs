use std::sync::Arc;

use casanode_proto::STATUS_SUCCESS;
use casanode_proto::ble::{commands, ids};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;

use super::{Attribute, Flags, FlagsField, send};
use crate::action::{Action, BusyPolicy, InvalidCommandPolicy};
use crate::backend::{Backend, BackendRequest, BackendResponse, WALLET_TIMEOUT};
use crate::chunked::ChunkedTransfer;
use crate::error::RejectReason;

/// `remove` the node wallet. Write only.
pub struct WalletActions;

impl Action for WalletActions {
    type Command = ();

    fn name(&self) -> &'static str {
        ids::WALLET_ACTIONS
    }

    fn decode_command(&self, input: &str) -> Option<()> {
        (input == commands::REMOVE).then_some(())
    }

    fn request(&self, _: &()) -> BackendRequest {
        BackendRequest::delete("api/v1/wallet/remove")
    }

    fn complete(&self, _: &(), _: BackendResponse) -> Result<String, String> {
        Ok(STATUS_SUCCESS.to_string())
    }

    fn on_invalid(&self) -> InvalidCommandPolicy {
        InvalidCommandPolicy::Absorb
    }

    fn on_busy(&self) -> BusyPolicy {
        BusyPolicy::Ignore
    }
}

#[derive(Debug, Deserialize)]
struct WalletCreated {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    mnemonic: Vec<String>,
}

/// Mnemonic transfer in both directions.
///
/// A read cycle creates a new wallet and sends `"<words> <sha256-hex>"`.
/// A write cycle receives the same shape and restores the wallet, but only
/// when the tag matches the words.
pub struct WalletMnemonic {
    backend: Arc<dyn Backend>,
}

impl WalletMnemonic {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    async fn create(&self) -> Option<Vec<u8>> {
        let request = BackendRequest::post("api/v1/wallet/create").with_timeout(WALLET_TIMEOUT);
        let response = self.backend.call(request).await.ok()?;

        let created: WalletCreated = match serde_json::from_slice(&response.body) {
            Ok(created) => created,
            Err(e) => {
                tracing::error!(attribute = ids::WALLET_MNEMONIC, "malformed wallet response: {e}");
                return None;
            }
        };
        if !created.success {
            tracing::error!(attribute = ids::WALLET_MNEMONIC, "wallet creation reported failure");
            return None;
        }
        if created.mnemonic.is_empty() {
            tracing::error!(attribute = ids::WALLET_MNEMONIC, "wallet response has no mnemonic");
            return None;
        }

        tracing::info!(attribute = ids::WALLET_MNEMONIC, "wallet created, mnemonic ready");
        Some(casanode_proto::seal(&created.mnemonic.join(" ")).into_bytes())
    }

    async fn restore(&self, payload: Vec<u8>) {
        let sealed = String::from_utf8_lossy(&payload);
        let mnemonic = match casanode_proto::open(&sealed) {
            Ok(mnemonic) => mnemonic,
            Err(e) => {
                tracing::error!(attribute = ids::WALLET_MNEMONIC, "mnemonic not restored: {e}");
                return;
            }
        };

        tracing::info!(attribute = ids::WALLET_MNEMONIC, "tag valid, restoring wallet");
        let request = BackendRequest::post("api/v1/wallet/restore")
            .with_body(json!({ "mnemonic": mnemonic }))
            .with_timeout(WALLET_TIMEOUT);
        match self.backend.call(request).await {
            Ok(_) => tracing::info!(attribute = ids::WALLET_MNEMONIC, "wallet restored"),
            Err(e) => tracing::error!(attribute = ids::WALLET_MNEMONIC, "wallet restore failed: {e}"),
        }
    }
}

impl ChunkedTransfer for WalletMnemonic {
    fn name(&self) -> &'static str {
        ids::WALLET_MNEMONIC
    }

    fn prepare(&self) -> BoxFuture<'_, Option<Vec<u8>>> {
        Box::pin(self.create())
    }

    fn complete(&self, payload: Vec<u8>) -> BoxFuture<'_, ()> {
        Box::pin(self.restore(payload))
    }
}

/// Keyring passphrase: read reports `required`/`available` flags, write sets it
pub struct WalletPassphrase {
    backend: Arc<dyn Backend>,
    state: FlagsField,
}

const PASSPHRASE: &str = "api/v1/node/passphrase";

impl WalletPassphrase {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            state: FlagsField::new(ids::NODE_PASSPHRASE, Arc::clone(&backend), PASSPHRASE, &["required", "available"]),
            backend,
        }
    }
}

impl Attribute for WalletPassphrase {
    fn id(&self) -> &'static str {
        ids::NODE_PASSPHRASE
    }

    fn flags(&self) -> Flags {
        Flags::READ_WRITE
    }

    fn read(&self) -> BoxFuture<'_, Result<Vec<u8>, RejectReason>> {
        Box::pin(async move { Ok(self.state.fetch().await) })
    }

    fn write(&self, value: Vec<u8>) -> BoxFuture<'_, Result<(), RejectReason>> {
        Box::pin(async move {
            let passphrase = String::from_utf8_lossy(&value).trim().to_string();
            if passphrase.is_empty() {
                tracing::error!(attribute = ids::NODE_PASSPHRASE, "empty passphrase");
                return Err(RejectReason::InvalidValue("empty passphrase".into()));
            }
            let request = BackendRequest::post(PASSPHRASE).with_body(json!({ "passphrase": passphrase }));
            send(&*self.backend, request).await?;
            tracing::info!(attribute = ids::NODE_PASSPHRASE, "passphrase set");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunked::ChunkedAttribute;
    use crate::testing::MockBackend;

    const WORDS: &str = "abandon ability able about above absent absorb abstract absurd abuse access accident";

    async fn read_all(attr: &ChunkedAttribute<WalletMnemonic>) -> Vec<u8> {
        let header = attr.read().await;
        let len = casanode_proto::decode_length(&header).unwrap() as usize;
        let mut payload = Vec::new();
        while payload.len() < len {
            payload.extend(attr.read().await);
        }
        payload
    }

    async fn write_all(attr: &ChunkedAttribute<WalletMnemonic>, payload: &str) {
        for transfer in casanode_proto::frame(payload.as_bytes()) {
            attr.write(&transfer).await.unwrap();
        }
    }

    #[tokio::test]
    async fn read_creates_wallet_and_seals_words() {
        let backend = MockBackend::new();
        let words: Vec<&str> = WORDS.split(' ').collect();
        backend.respond_json("api/v1/wallet/create", json!({"success": true, "mnemonic": words}));
        let attr = ChunkedAttribute::new(WalletMnemonic::new(backend.clone()));

        let payload = String::from_utf8(read_all(&attr).await).unwrap();
        assert_eq!(casanode_proto::open(&payload), Ok(WORDS));
        assert_eq!(backend.call_count("api/v1/wallet/create"), 1);
        assert_eq!(backend.calls()[0].timeout, WALLET_TIMEOUT);
    }

    #[tokio::test]
    async fn failed_creation_sends_sentinel() {
        let backend = MockBackend::new();
        backend.respond_json("api/v1/wallet/create", json!({"success": false}));
        let attr = ChunkedAttribute::new(WalletMnemonic::new(backend));
        assert_eq!(read_all(&attr).await, b"error");
    }

    #[tokio::test]
    async fn restore_with_matching_tag_runs_once() {
        let backend = MockBackend::new();
        backend.respond("api/v1/wallet/restore", 200, "{}");
        let attr = ChunkedAttribute::new(WalletMnemonic::new(backend.clone()));

        write_all(&attr, &casanode_proto::seal(WORDS)).await;

        assert_eq!(backend.call_count("api/v1/wallet/restore"), 1);
        assert_eq!(backend.calls()[0].body, Some(json!({"mnemonic": WORDS})));
    }

    #[tokio::test]
    async fn restore_with_wrong_tag_is_discarded() {
        let backend = MockBackend::new();
        let attr = ChunkedAttribute::new(WalletMnemonic::new(backend.clone()));

        let forged = format!("{WORDS} {}", casanode_proto::tag("something else"));
        write_all(&attr, &forged).await;
        write_all(&attr, "nospaceatall").await;

        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_restore_leaves_writer_ready() {
        let backend = MockBackend::new();
        backend.respond("api/v1/wallet/restore", 500, "");
        let attr = ChunkedAttribute::new(WalletMnemonic::new(backend.clone()));

        write_all(&attr, &casanode_proto::seal(WORDS)).await;
        write_all(&attr, &casanode_proto::seal(WORDS)).await;
        assert_eq!(backend.call_count("api/v1/wallet/restore"), 2);
    }

    #[tokio::test]
    async fn passphrase_state_and_update() {
        let backend = MockBackend::new();
        backend.respond_json(PASSPHRASE, json!({"required": true, "available": false}));
        let attr = WalletPassphrase::new(backend.clone());

        assert_eq!(attr.read().await.unwrap(), b"10");
        assert!(matches!(
            attr.write(b"   ".to_vec()).await,
            Err(RejectReason::InvalidValue(_))
        ));
        attr.write(b"hunter22".to_vec()).await.unwrap();

        let last = backend.calls().pop().unwrap();
        assert_eq!(last.body, Some(json!({"passphrase": "hunter22"})));
        assert_eq!(
            last.redacted_body(),
            Some(json!({"passphrase": "[CENSORED]"}))
        );
    }

    #[tokio::test]
    async fn passphrase_backend_failure() {
        let backend = MockBackend::new();
        let attr = WalletPassphrase::new(backend);
        assert_eq!(attr.read().await.unwrap(), b"error");
        assert_eq!(attr.write(b"secret".to_vec()).await, Err(RejectReason::BackendFailed));
    }
}
