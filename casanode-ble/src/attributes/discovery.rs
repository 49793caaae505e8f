use std::net::Ipv4Addr;

use casanode_proto::ble::ids;
use futures::future::BoxFuture;
use uuid::Uuid;

use super::{Attribute, Flags};
use crate::config::Config;
use crate::error::RejectReason;
use crate::network;

/// `<local-ip>:<web-port>` so the app can reach the web UI. Lives under the
/// fixed discovery UUID rather than a seeded one.
pub struct Discovery {
    web_port: u16,
}

impl Discovery {
    pub fn new(web_port: u16) -> Self {
        Self { web_port }
    }

    fn address(&self, ip: Ipv4Addr) -> String {
        format!("{ip}:{}", self.web_port)
    }
}

impl Attribute for Discovery {
    fn id(&self) -> &'static str {
        ids::DISCOVERY
    }

    fn flags(&self) -> Flags {
        Flags::READ
    }

    fn uuid(&self, config: &Config) -> Uuid {
        config.discovery_uuid
    }

    fn read(&self) -> BoxFuture<'_, Result<Vec<u8>, RejectReason>> {
        Box::pin(async move {
            let ip = network::local_ipv4().unwrap_or(Ipv4Addr::LOCALHOST);
            let value = self.address(ip);
            tracing::info!(attribute = self.id(), %value, "read");
            Ok(value.into_bytes())
        })
    }
}
