//! Broadcast transport for change envelopes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

use super::EventEnvelope;
use crate::errors::{Error, Result};

/// Per-channel push subscription to the backend's change stream.
///
/// Every listener receives every envelope published on its channel after it
/// subscribed (broadcast, not competing consumers). Envelopes on one channel
/// arrive in publication order.
pub trait EventChannel: Send + Sync {
    fn listen(&self, channel: &str) -> Result<broadcast::Receiver<EventEnvelope>>;
}

/// Lightweight broadcast bus with one tokio broadcast channel per name.
#[derive(Clone)]
pub struct EventBus {
    capacity: usize,
    senders: Arc<RwLock<HashMap<String, broadcast::Sender<EventEnvelope>>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            senders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn sender(&self, channel: &str) -> Result<broadcast::Sender<EventEnvelope>> {
        if let Some(sender) = self
            .senders
            .read()
            .map_err(|_| Error::Channel("event bus lock poisoned".to_string()))?
            .get(channel)
        {
            return Ok(sender.clone());
        }

        let mut senders = self
            .senders
            .write()
            .map_err(|_| Error::Channel("event bus lock poisoned".to_string()))?;
        let sender = senders
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Ok(sender.clone())
    }

    /// Publishes on the envelope's channel. Returns how many listeners saw it.
    pub fn publish(&self, envelope: EventEnvelope) -> usize {
        match self.sender(&envelope.event) {
            // No listeners is not an error; lagging listeners are not waited on.
            Ok(sender) => sender.send(envelope).unwrap_or(0),
            Err(e) => {
                log::error!("Failed to publish event: {}", e);
                0
            }
        }
    }

    /// Drops every channel. Current listeners observe the channel as closed;
    /// later `listen` calls start fresh channels.
    pub fn close(&self) {
        match self.senders.write() {
            Ok(mut senders) => senders.clear(),
            Err(_) => log::error!("Failed to close event bus: lock poisoned"),
        }
    }
}

impl EventChannel for EventBus {
    fn listen(&self, channel: &str) -> Result<broadcast::Receiver<EventEnvelope>> {
        Ok(self.sender(channel)?.subscribe())
    }
}
