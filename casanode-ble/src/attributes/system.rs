use casanode_proto::STATUS_SUCCESS;
use casanode_proto::ble::{commands, ids};
use serde_json::json;

use crate::action::{Action, InvalidCommandPolicy};
use crate::backend::{BackendRequest, BackendResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCommand {
    UpdateSystem,
    UpdateSentinel,
    Reboot,
    Halt,
    Reset,
}

/// Host maintenance: updates, reboot, shutdown and factory reset
pub struct SystemActions;

impl Action for SystemActions {
    type Command = SystemCommand;

    fn name(&self) -> &'static str {
        ids::SYSTEM_ACTIONS
    }

    fn decode_command(&self, input: &str) -> Option<SystemCommand> {
        match input {
            commands::UPDATE_SYSTEM => Some(SystemCommand::UpdateSystem),
            commands::UPDATE_SENTINEL => Some(SystemCommand::UpdateSentinel),
            commands::REBOOT => Some(SystemCommand::Reboot),
            commands::HALT => Some(SystemCommand::Halt),
            commands::RESET => Some(SystemCommand::Reset),
            _ => None,
        }
    }

    fn request(&self, command: &SystemCommand) -> BackendRequest {
        match command {
            SystemCommand::UpdateSystem => {
                BackendRequest::post("api/v1/system/update").with_body(json!({"target": "system"}))
            }
            SystemCommand::UpdateSentinel => {
                BackendRequest::post("api/v1/system/update").with_body(json!({"target": "sentinel"}))
            }
            SystemCommand::Reboot => BackendRequest::post("api/v1/system/reboot"),
            SystemCommand::Halt => BackendRequest::post("api/v1/system/shutdown"),
            SystemCommand::Reset => BackendRequest::post("api/v1/system/reset"),
        }
    }

    fn complete(&self, _: &SystemCommand, _: BackendResponse) -> Result<String, String> {
        Ok(STATUS_SUCCESS.to_string())
    }

    fn on_invalid(&self) -> InvalidCommandPolicy {
        InvalidCommandPolicy::Absorb
    }
}
