//! In-process publish/subscribe primitive standing in for the Redis pub/sub
//! channel the orchestrator used in its original deployment.
//!
//! Every channel is backed by a [`tokio::sync::broadcast`] pair created
//! lazily on first publish or subscribe. Slow subscribers that fall behind
//! the broadcast channel's capacity will observe a
//! [`tokio::sync::broadcast::error::RecvError::Lagged`] the next time they
//! poll, exactly as a Redis pub/sub client would see dropped messages if it
//! failed to keep up; we don't attempt to paper over that with unbounded
//! buffering.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, trace};

use crate::error::{BusError, BusResult};

const DEFAULT_CAPACITY: usize = 256;

/// A handle to a single channel's broadcast receiver, along with the name it
/// was created for (useful for logging from a select! loop over several
/// subscriptions).
pub struct Subscription {
    pub channel: String,
    receiver: broadcast::Receiver<Arc<serde_json::Value>>,
}

impl Subscription {
    pub async fn recv(&mut self) -> BusResult<Arc<serde_json::Value>> {
        loop {
            match self.receiver.recv().await {
                Ok(value) => return Ok(value),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(channel = %self.channel, skipped, "subscriber lagged, continuing at head");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Err(BusError::ShuttingDown),
            }
        }
    }
}

/// A lightweight, in-process fan-out bus. One [`EventBus`] is shared (behind
/// an `Arc`) across the orchestrator, the stasis broker, and any HTTP
/// observers that want to stream events to a dashboard.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<Arc<serde_json::Value>>>>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    async fn sender_for(&self, channel: &str) -> broadcast::Sender<Arc<serde_json::Value>> {
        if let Some(sender) = self.channels.read().await.get(channel) {
            return sender.clone();
        }
        let mut channels = self.channels.write().await;
        if let Some(sender) = channels.get(channel) {
            return sender.clone();
        }
        let (sender, _) = broadcast::channel(self.capacity);
        channels.insert(channel.to_string(), sender.clone());
        sender
    }

    /// Publish a value to `channel`. Returns the number of subscribers it was
    /// delivered to, mirroring `PUBLISH`'s return value. Publishing to a
    /// channel with no subscribers is not an error.
    pub async fn publish<T: Serialize>(&self, channel: &str, value: &T) -> BusResult<usize> {
        if channel.is_empty() {
            return Err(BusError::InvalidName(channel.to_string()));
        }
        let payload = Arc::new(serde_json::to_value(value)?);
        let sender = self.sender_for(channel).await;
        let delivered = sender.send(payload).map(|n| n).unwrap_or(0);
        trace!(channel, delivered, "published event");
        Ok(delivered)
    }

    /// Subscribe to `channel`, receiving every event published after this
    /// call (no backlog replay, matching pub/sub semantics).
    pub async fn subscribe(&self, channel: &str) -> BusResult<Subscription> {
        if channel.is_empty() {
            return Err(BusError::InvalidName(channel.to_string()));
        }
        let sender = self.sender_for(channel).await;
        Ok(Subscription {
            channel: channel.to_string(),
            receiver: sender.subscribe(),
        })
    }
}
