//! Events fanned out by the distributed stasis broker from a single
//! provider-side WebSocket to many worker processes.
//!
//! A `Manager` owns the one physical connection per organization and
//! republishes everything it receives as these typed events; workers never
//! talk to the provider socket directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum StasisEvent {
    /// A channel entered the stasis application (the point at which the
    /// platform gains control of the call from the provider's dialplan).
    StasisStart {
        org_id: Uuid,
        channel_id: String,
        caller_number: Option<String>,
        raw: Value,
        received_at: DateTime<Utc>,
    },
    /// A channel left the stasis application (call ended, or was handed off
    /// elsewhere by the provider).
    StasisEnd {
        org_id: Uuid,
        channel_id: String,
        received_at: DateTime<Utc>,
    },
    /// A generic provider channel event not otherwise modeled (hold, DTMF,
    /// varset, etc) preserved as raw JSON for forward compatibility.
    ChannelEvent {
        org_id: Uuid,
        channel_id: String,
        kind: String,
        raw: Value,
        received_at: DateTime<Utc>,
    },
    /// The manager's upstream WebSocket to the provider dropped. Workers use
    /// this to flag any calls they believe are still in progress on this
    /// org as suspect until a fresh `StasisStart`/heartbeat is observed.
    ManagerDisconnected { org_id: Uuid, at: DateTime<Utc> },
    /// The manager's upstream WebSocket reconnected.
    ManagerReconnected { org_id: Uuid, at: DateTime<Utc> },
}

impl StasisEvent {
    pub fn org_id(&self) -> Uuid {
        match self {
            StasisEvent::StasisStart { org_id, .. }
            | StasisEvent::StasisEnd { org_id, .. }
            | StasisEvent::ChannelEvent { org_id, .. }
            | StasisEvent::ManagerDisconnected { org_id, .. }
            | StasisEvent::ManagerReconnected { org_id, .. } => *org_id,
        }
    }
}

/// A worker's periodic liveness signal, published with a short TTL so the
/// manager (and other workers performing a rebalance) can detect a worker
/// that vanished without sending `WorkerLeaving`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerHeartbeat {
    pub worker_id: String,
    pub org_ids: Vec<Uuid>,
    pub at: DateTime<Utc>,
    pub ttl_seconds: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_event_round_trips() {
        let event = StasisEvent::ChannelEvent {
            org_id: Uuid::new_v4(),
            channel_id: "PJSIP/1000-00000001".into(),
            kind: "ChannelHold".into(),
            raw: serde_json::json!({"musicclass": "default"}),
            received_at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: StasisEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
