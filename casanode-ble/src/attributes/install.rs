use casanode_proto::STATUS_SUCCESS;
use casanode_proto::ble::{commands, ids};

use crate::action::{Action, BusyPolicy, InvalidCommandPolicy};
use crate::backend::{BackendRequest, BackendResponse, LONG_TIMEOUT};

/// `create` the node and VPN configuration plus certificate.
///
/// Succeeds with three flags: node config, VPN config, certificate.
pub struct InstallConfigs;

impl Action for InstallConfigs {
    type Command = ();

    fn name(&self) -> &'static str {
        ids::INSTALL_CONFIGS
    }

    fn decode_command(&self, input: &str) -> Option<()> {
        (input == commands::CREATE).then_some(())
    }

    fn request(&self, _: &()) -> BackendRequest {
        BackendRequest::post("api/v1/install/configuration").with_timeout(LONG_TIMEOUT)
    }

    fn complete(&self, _: &(), response: BackendResponse) -> Result<String, String> {
        let doc = response.json().map_err(|e| format!("malformed response: {e}"))?;
        let flag = |key: &str| doc.get(key).and_then(serde_json::Value::as_bool).unwrap_or(false);
        Ok(casanode_proto::flags(&[
            flag("nodeConfig"),
            flag("vpnConfig"),
            flag("certificate"),
        ]))
    }
}

/// `install` (pull) the node's docker image
pub struct InstallDockerImage;

impl Action for InstallDockerImage {
    type Command = ();

    fn name(&self) -> &'static str {
        ids::INSTALL_DOCKER_IMAGE
    }

    fn decode_command(&self, input: &str) -> Option<()> {
        (input == commands::INSTALL).then_some(())
    }

    fn request(&self, _: &()) -> BackendRequest {
        BackendRequest::post("api/v1/install/docker-image").with_timeout(LONG_TIMEOUT)
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
