//! BlueZ binding: one primary service carrying every attribute, plus the
//! LE advertisement that makes the device discoverable.

use std::sync::Arc;

use bluer::adv::{Advertisement, AdvertisementHandle};
use bluer::gatt::local::{
    Application, ApplicationHandle, Characteristic, CharacteristicNotifier, CharacteristicNotify,
    CharacteristicNotifyMethod, CharacteristicRead, CharacteristicReadRequest, CharacteristicWrite,
    CharacteristicWriteMethod, CharacteristicWriteRequest, ReqError, Service,
};

use crate::attributes::Attribute;
use crate::config::Config;
use crate::error::RejectReason;

#[derive(Debug, thiserror::Error)]
pub enum GattError {
    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] bluer::Error),
}

/// Registered application and advertisement. Dropping it unregisters both.
pub struct GattServer {
    adapter: bluer::Adapter,
    _app: ApplicationHandle,
    _adv: AdvertisementHandle,
    _session: bluer::Session,
}

impl GattServer {
    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }
}

/// Map a refused operation onto the BlueZ error reply
pub fn reply_error(reason: RejectReason) -> ReqError {
    match reason {
        RejectReason::InvalidLength => ReqError::InvalidValueLength,
        RejectReason::AlreadyInProgress => ReqError::InProgress,
        RejectReason::NotSupported => ReqError::NotSupported,
        RejectReason::InvalidCommand(_) | RejectReason::InvalidValue(_) | RejectReason::BackendFailed => {
            ReqError::Failed
        }
    }
}

/// Power the default adapter, publish all attributes and start advertising
pub async fn serve(config: &Config, attributes: Vec<Arc<dyn Attribute>>) -> Result<GattServer, GattError> {
    let session = bluer::Session::new().await?;
    let adapter = session.default_adapter().await?;
    tracing::info!("using bluetooth adapter {}", adapter.name());

    if !adapter.is_powered().await? {
        tracing::info!("powering on adapter {}", adapter.name());
        adapter.set_powered(true).await?;
    }
    adapter.set_alias(config.device_name.clone()).await?;

    let characteristics: Vec<Characteristic> = attributes
        .into_iter()
        .map(|attr| {
            let uuid = attr.uuid(config);
            tracing::debug!(attribute = attr.id(), %uuid, flags = ?attr.flags(), "registering");
            characteristic(uuid, attr)
        })
        .collect();
    let count = characteristics.len();

    let app = Application {
        services: vec![Service {
            uuid: config.service_uuid,
            primary: true,
            characteristics,
            ..Default::default()
        }],
        ..Default::default()
    };
    let app = adapter.serve_gatt_application(app).await?;
    tracing::info!(service = %config.service_uuid, count, "GATT application registered");

    let adv = Advertisement {
        service_uuids: vec![config.service_uuid].into_iter().collect(),
        discoverable: Some(true),
        local_name: Some(config.device_name.clone()),
        ..Default::default()
    };
    let adv = adapter.advertise(adv).await?;
    tracing::info!(name = %config.device_name, "advertising");

    Ok(GattServer {
        adapter,
        _app: app,
        _adv: adv,
        _session: session,
    })
}

fn characteristic(uuid: bluer::Uuid, attr: Arc<dyn Attribute>) -> Characteristic {
    let flags = attr.flags();

    let read = flags.read.then(|| {
        let attr = Arc::clone(&attr);
        CharacteristicRead {
            read: true,
            fun: Box::new(move |_req: CharacteristicReadRequest| {
                let attr = Arc::clone(&attr);
                Box::pin(async move { attr.read().await.map_err(reply_error) })
            }),
            ..Default::default()
        }
    });

    let write = flags.write.then(|| {
        let attr = Arc::clone(&attr);
        CharacteristicWrite {
            write: true,
            method: CharacteristicWriteMethod::Fun(Box::new(move |value: Vec<u8>, _req: CharacteristicWriteRequest| {
                let attr = Arc::clone(&attr);
                Box::pin(async move {
                    attr.write(value).await.map_err(|reason| {
                        tracing::warn!(attribute = attr.id(), "write refused: {reason}");
                        reply_error(reason)
                    })
                })
            })),
            ..Default::default()
        }
    });

    let notify = flags.notify.then(|| {
        let attr = Arc::clone(&attr);
        CharacteristicNotify {
            notify: true,
            method: CharacteristicNotifyMethod::Fun(Box::new(move |notifier| {
                let attr = Arc::clone(&attr);
                Box::pin(async move { forward_notifications(attr, notifier).await })
            })),
            ..Default::default()
        }
    });

    Characteristic {
        uuid,
        read,
        write,
        notify,
        ..Default::default()
    }
}

/// Runs for one notification session: subscribe the gate and push every
/// event until the central stops listening.
async fn forward_notifications(attr: Arc<dyn Attribute>, mut notifier: CharacteristicNotifier) {
    let Some(gate) = attr.gate() else {
        return;
    };
    let mut events = gate.subscribe();
    tracing::info!(attribute = attr.id(), "notifications started");

    // `None` means a newer session replaced this one and owns the gate now.
    while let Some(value) = events.recv().await {
        if notifier.is_stopped() {
            gate.unsubscribe();
            break;
        }
        if let Err(e) = notifier.notify(value).await {
            tracing::warn!(attribute = attr.id(), "notification failed: {e}");
            gate.unsubscribe();
            break;
        }
    }
    tracing::info!(attribute = attr.id(), "notifications stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_reasons_map_to_bluez_errors() {
        assert!(matches!(reply_error(RejectReason::InvalidLength), ReqError::InvalidValueLength));
        assert!(matches!(reply_error(RejectReason::AlreadyInProgress), ReqError::InProgress));
        assert!(matches!(reply_error(RejectReason::NotSupported), ReqError::NotSupported));
        assert!(matches!(reply_error(RejectReason::BackendFailed), ReqError::Failed));
        assert!(matches!(
            reply_error(RejectReason::InvalidCommand("x".into())),
            ReqError::Failed
        ));
    }
}
