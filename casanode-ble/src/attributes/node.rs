use casanode_proto::ble::{commands, ids};
use casanode_proto::{PORT_CLOSED, PORT_OPEN, STATUS_SUCCESS};

use crate::action::{Action, BusyPolicy, InvalidCommandPolicy};
use crate::backend::{BackendRequest, BackendResponse};

/// Fetch the node's wallet balance, e.g. `12.5 DVPN`
pub struct NodeBalance;

impl Action for NodeBalance {
    type Command = ();

    fn name(&self) -> &'static str {
        ids::NODE_BALANCE
    }

    fn decode_command(&self, input: &str) -> Option<()> {
        (input == commands::UDVPN).then_some(())
    }

    fn request(&self, _: &()) -> BackendRequest {
        BackendRequest::get("api/v1/node/balance")
    }

    fn complete(&self, _: &(), response: BackendResponse) -> Result<String, String> {
        let doc = response.json().map_err(|e| format!("malformed response: {e}"))?;
        match doc.get("balance").and_then(serde_json::Value::as_str) {
            Some(balance) if !balance.is_empty() => Ok(balance.to_string()),
            _ => Err("response carries no balance".to_string()),
        }
    }

    fn on_invalid(&self) -> InvalidCommandPolicy {
        InvalidCommandPolicy::Absorb
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Node,
    Vpn,
}

impl PortKind {
    fn as_str(&self) -> &'static str {
        match self {
            PortKind::Node => commands::PORT_NODE,
            PortKind::Vpn => commands::PORT_VPN,
        }
    }
}

/// Ask the backend whether the node or VPN port is reachable from outside
pub struct CheckPort;

impl Action for CheckPort {
    type Command = PortKind;

    fn name(&self) -> &'static str {
        ids::CHECK_PORT
    }

    fn decode_command(&self, input: &str) -> Option<PortKind> {
        match input {
            commands::PORT_NODE => Some(PortKind::Node),
            commands::PORT_VPN => Some(PortKind::Vpn),
            _ => None,
        }
    }

    fn request(&self, kind: &PortKind) -> BackendRequest {
        BackendRequest::get(format!("api/v1/check/port/{}", kind.as_str()))
    }

    fn complete(&self, _: &PortKind, response: BackendResponse) -> Result<String, String> {
        let doc = response.json().map_err(|e| format!("malformed response: {e}"))?;
        match doc.pointer("/status").and_then(serde_json::Value::as_i64) {
            Some(2) => Ok(PORT_OPEN.to_string()),
            Some(3) => Ok(PORT_CLOSED.to_string()),
            Some(status) => Err(format!("port check reported status {status}")),
            None => Err("response carries no status".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCommand {
    Start,
    Stop,
    Restart,
    Remove,
}

/// Control the node container. Write only.
pub struct NodeActions;

impl Action for NodeActions {
    type Command = NodeCommand;

    fn name(&self) -> &'static str {
        ids::NODE_ACTIONS
    }

    fn decode_command(&self, input: &str) -> Option<NodeCommand> {
        match input {
            commands::START => Some(NodeCommand::Start),
            commands::STOP => Some(NodeCommand::Stop),
            commands::RESTART => Some(NodeCommand::Restart),
            commands::REMOVE => Some(NodeCommand::Remove),
            _ => None,
        }
    }

    fn request(&self, command: &NodeCommand) -> BackendRequest {
        match command {
            NodeCommand::Start => BackendRequest::put("api/v1/node/start"),
            NodeCommand::Stop => BackendRequest::put("api/v1/node/stop"),
            NodeCommand::Restart => BackendRequest::put("api/v1/node/restart"),
            NodeCommand::Remove => BackendRequest::delete("api/v1/node/remove"),
        }
    }

    fn complete(&self, _: &NodeCommand, _: BackendResponse) -> Result<String, String> {
        Ok(STATUS_SUCCESS.to_string())
    }

    fn on_invalid(&self) -> InvalidCommandPolicy {
        InvalidCommandPolicy::Absorb
    }

    fn on_busy(&self) -> BusyPolicy {
        BusyPolicy::Ignore
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionMachine;
    use crate::backend::Verb;
    use crate::testing::{MockBackend, eventually};
    use serde_json::json;

    #[tokio::test]
    async fn balance_is_the_success_payload() {
        let backend = MockBackend::new();
        backend.respond_json("api/v1/node/balance", json!({"balance": "42.7 DVPN"}));
        let m = ActionMachine::new(NodeBalance, backend);
        m.submit(b"udvpn").unwrap();
        eventually(|| m.state().is_terminal()).await;
        assert_eq!(m.read(), b"42.7 DVPN");
    }

    #[tokio::test]
    async fn missing_balance_is_an_error() {
        let backend = MockBackend::new();
        backend.respond_json("api/v1/node/balance", json!({"balance": null}));
        let m = ActionMachine::new(NodeBalance, backend);
        m.submit(b"udvpn").unwrap();
        eventually(|| m.state().is_terminal()).await;
        assert_eq!(m.read(), b"-1");
    }

    #[tokio::test]
    async fn balance_unknown_denom_notifies_error() {
        let backend = MockBackend::new();
        let m = ActionMachine::new(NodeBalance, backend);
        let mut events = m.gate().subscribe();
        m.submit(b"uatom").unwrap();
        assert_eq!(events.try_recv().unwrap(), b"-1");
    }

    #[tokio::test]
    async fn port_open_and_closed() {
        let backend = MockBackend::new();
        backend.respond_json("api/v1/check/port/node", json!({"status": 2}));
        backend.respond_json("api/v1/check/port/vpn", json!({"status": 3}));
        let m = ActionMachine::new(CheckPort, backend.clone());

        m.submit(b"node").unwrap();
        eventually(|| m.state().is_terminal()).await;
        assert_eq!(m.read(), b"2");

        m.submit(b"VPN").unwrap();
        eventually(|| m.state().is_terminal() && backend.calls().len() == 2).await;
        assert_eq!(m.read(), b"3");
    }

    #[tokio::test]
    async fn port_check_error_status_is_an_error() {
        let backend = MockBackend::new();
        backend.respond_json("api/v1/check/port/node", json!({"status": -1}));
        backend.respond("api/v1/check/port/vpn", 200, "open");
        let m = ActionMachine::new(CheckPort, backend.clone());

        m.submit(b"node").unwrap();
        eventually(|| m.state().is_terminal()).await;
        assert_eq!(m.read(), b"-1");

        m.submit(b"vpn").unwrap();
        eventually(|| m.state().is_terminal() && backend.calls().len() == 2).await;
        assert_eq!(m.read(), b"-1");
    }

    #[tokio::test]
    async fn port_check_failure() {
        let backend = MockBackend::new();
        backend.unreachable("api/v1/check/port/node");
        let m = ActionMachine::new(CheckPort, backend);
        m.submit(b"node").unwrap();
        eventually(|| m.state().is_terminal()).await;
        assert_eq!(m.read(), b"-1");
    }

    #[test]
    fn node_commands_map_to_requests() {
        let remove = NodeActions.request(&NodeCommand::Remove);
        assert_eq!((remove.verb, remove.path.as_str()), (Verb::Delete, "api/v1/node/remove"));
        let restart = NodeActions.request(&NodeCommand::Restart);
        assert_eq!((restart.verb, restart.path.as_str()), (Verb::Put, "api/v1/node/restart"));
        assert_eq!(NodeActions.decode_command("reboot"), None);
    }
}
