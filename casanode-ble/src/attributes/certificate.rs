use casanode_proto::STATUS_SUCCESS;
use casanode_proto::ble::{commands, ids};

use crate::action::Action;
use crate::backend::{BackendRequest, BackendResponse, LONG_TIMEOUT};

/// `renew` the node's TLS certificate
pub struct CertificateActions;

impl Action for CertificateActions {
    type Command = ();

    fn name(&self) -> &'static str {
        ids::CERTIFICATE_ACTIONS
    }

    fn decode_command(&self, input: &str) -> Option<()> {
        (input == commands::RENEW).then_some(())
    }

    fn request(&self, _: &()) -> BackendRequest {
        BackendRequest::post("api/v1/certificate/renew").with_timeout(LONG_TIMEOUT)
    }

    fn complete(&self, _: &(), _: BackendResponse) -> Result<String, String> {
        Ok(STATUS_SUCCESS.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{ActionAttribute, Attribute, Flags};
    use crate::error::RejectReason;
    use crate::testing::{MockBackend, eventually};

    const RENEW: &str = "api/v1/certificate/renew";

    #[tokio::test]
    async fn renew_scenario() {
        let backend = MockBackend::held();
        backend.respond(RENEW, 200, "");
        let attr = ActionAttribute::new(CertificateActions, backend.clone(), Flags::READ_WRITE_NOTIFY);

        attr.write(b"renew".to_vec()).await.unwrap();
        assert_eq!(attr.read().await.unwrap(), b"1");

        assert_eq!(
            attr.write(b"renew".to_vec()).await,
            Err(RejectReason::AlreadyInProgress)
        );
        assert_eq!(attr.read().await.unwrap(), b"1");

        backend.release(1);
        eventually(|| attr.machine().state().is_terminal()).await;
        assert_eq!(attr.read().await.unwrap(), b"2");
        assert_eq!(backend.call_count(RENEW), 1);
        assert_eq!(backend.calls()[0].timeout, LONG_TIMEOUT);
    }

    #[tokio::test]
    async fn unknown_command_is_refused() {
        let backend = MockBackend::new();
        let attr = ActionAttribute::new(CertificateActions, backend.clone(), Flags::READ_WRITE_NOTIFY);
        assert!(matches!(
            attr.write(b"revoke".to_vec()).await,
            Err(RejectReason::InvalidCommand(_))
        ));
        assert_eq!(attr.read().await.unwrap(), b"0");
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_renewal_reads_error() {
        let backend = MockBackend::new();
        backend.respond(RENEW, 502, "");
        let attr = ActionAttribute::new(CertificateActions, backend, Flags::READ_WRITE_NOTIFY);
        let mut events = attr.gate().unwrap().subscribe();

        attr.write(b"RENEW".to_vec()).await.unwrap();
        assert_eq!(events.recv().await.unwrap(), b"1");
        assert_eq!(events.recv().await.unwrap(), b"-1");
    }
}
