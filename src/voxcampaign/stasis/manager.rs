//! Owns the single upstream connection to one organization's ARI instance
//! and republishes whatever it receives as typed [`StasisEvent`]s on the
//! shared bus. Workers never talk to the provider socket directly — they
//! only ever see what a manager has already normalized, which means a
//! worker restart or rebalance doesn't need to touch the provider
//! connection at all.
//!
//! The actual WebSocket I/O loop lives outside this module (wherever the
//! process wiring happens); [`StasisManager`] only owns the
//! classify-and-publish step and the reconnect backoff bookkeeping, so it
//! can be exercised without a live ARI instance.

use std::time::Duration;

use bus::protocol::StasisEvent;
use bus::EventBus;
use chrono::Utc;
use uuid::Uuid;

use crate::error::VoxResult;

pub fn channel_for(org_id: Uuid) -> String {
    format!("stasis:events:{org_id}")
}

/// Exponential backoff for reconnecting a dropped provider WebSocket,
/// doubling on every failure up to a ceiling and resetting on success.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectBackoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl ReconnectBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max, current: base }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

pub struct StasisManager {
    org_id: Uuid,
    bus: EventBus,
}

impl StasisManager {
    pub fn new(org_id: Uuid, bus: EventBus) -> Self {
        Self { org_id, bus }
    }

    /// Classify one raw ARI event payload and publish the corresponding
    /// typed [`StasisEvent`]. Unrecognized event types are preserved as
    /// `ChannelEvent` rather than dropped.
    pub async fn publish_raw_event(&self, raw: serde_json::Value) -> VoxResult<()> {
        let event_type = raw.get("type").and_then(|v| v.as_str()).unwrap_or("Unknown").to_string();
        let channel_id = raw
            .get("channel")
            .and_then(|c| c.get("id"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let event = match event_type.as_str() {
            "StasisStart" => StasisEvent::StasisStart {
                org_id: self.org_id,
                channel_id,
                caller_number: raw
                    .get("channel")
                    .and_then(|c| c.get("caller"))
                    .and_then(|c| c.get("number"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                raw: raw.clone(),
                received_at: Utc::now(),
            },
            "StasisEnd" => StasisEvent::StasisEnd { org_id: self.org_id, channel_id, received_at: Utc::now() },
            other => StasisEvent::ChannelEvent { org_id: self.org_id, channel_id, kind: other.to_string(), raw: raw.clone(), received_at: Utc::now() },
        };

        self.bus.publish(&channel_for(self.org_id), &event).await?;
        Ok(())
    }

    pub async fn mark_disconnected(&self) -> VoxResult<()> {
        self.bus.publish(&channel_for(self.org_id), &StasisEvent::ManagerDisconnected { org_id: self.org_id, at: Utc::now() }).await?;
        Ok(())
    }

    pub async fn mark_reconnected(&self) -> VoxResult<()> {
        self.bus.publish(&channel_for(self.org_id), &StasisEvent::ManagerReconnected { org_id: self.org_id, at: Utc::now() }).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_ceiling_and_resets() {
        let mut backoff = ReconnectBackoff::new(Duration::from_secs(1), Duration::from_secs(8));
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        assert_eq!(backoff.next_delay(), Duration::from_secs(8));
        assert_eq!(backoff.next_delay(), Duration::from_secs(8));
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn stasis_start_event_is_published_with_caller_number() {
        let org_id = Uuid::new_v4();
        let bus = EventBus::default();
        let mut sub = bus.subscribe(&channel_for(org_id)).await.unwrap();
        let manager = StasisManager::new(org_id, bus);

        manager
            .publish_raw_event(serde_json::json!({
                "type": "StasisStart",
                "channel": {"id": "chan-1", "caller": {"number": "+15551234567"}},
            }))
            .await
            .unwrap();

        let value = sub.recv().await.unwrap();
        let event: StasisEvent = serde_json::from_value((*value).clone()).unwrap();
        match event {
            StasisEvent::StasisStart { channel_id, caller_number, .. } => {
                assert_eq!(channel_id, "chan-1");
                assert_eq!(caller_number.as_deref(), Some("+15551234567"));
            }
            other => panic!("expected StasisStart, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unrecognized_event_types_are_preserved_as_channel_events() {
        let org_id = Uuid::new_v4();
        let bus = EventBus::default();
        let mut sub = bus.subscribe(&channel_for(org_id)).await.unwrap();
        let manager = StasisManager::new(org_id, bus);

        manager.publish_raw_event(serde_json::json!({"type": "ChannelHold", "channel": {"id": "chan-2"}})).await.unwrap();

        let value = sub.recv().await.unwrap();
        let event: StasisEvent = serde_json::from_value((*value).clone()).unwrap();
        assert!(matches!(event, StasisEvent::ChannelEvent { kind, .. } if kind == "ChannelHold"));
    }
}
