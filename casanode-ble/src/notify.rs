//! Notification gate for one attribute

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

/// Tracks whether a central is subscribed and forwards value changes to it.
///
/// The subscriber is the receiving half returned by [`NotifyGate::subscribe`];
/// dropping it has the same effect as [`NotifyGate::unsubscribe`].
#[derive(Debug, Default)]
pub struct NotifyGate {
    subscriber: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl NotifyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start forwarding changes. Replaces any previous subscriber.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Vec<u8>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.lock() = Some(tx);
        rx
    }

    pub fn unsubscribe(&self) {
        *self.lock() = None;
    }

    pub fn is_subscribed(&self) -> bool {
        self.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Emit `value` if subscribed. Returns whether an event was emitted.
    pub fn maybe_notify(&self, value: Vec<u8>) -> bool {
        let mut subscriber = self.lock();
        let Some(tx) = subscriber.as_ref() else {
            return false;
        };
        if tx.send(value).is_ok() {
            true
        } else {
            *subscriber = None;
            false
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Vec<u8>>>> {
        self.subscriber.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
