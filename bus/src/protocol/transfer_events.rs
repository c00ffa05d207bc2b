//! Events describing a live call's transfer lifecycle (warm or cold handoff
//! to a human agent or another workflow).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which kind of handoff a [`TransferEvent::TransferRequested`] describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    /// The caller is bridged to the destination while the agent stays on
    /// the line to perform the introduction before dropping off.
    Warm,
    /// The caller is bridged directly to the destination with no
    /// introduction.
    Cold,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum TransferEvent {
    /// The conversational engine (or an operator) requested a transfer.
    TransferRequested {
        call_id: Uuid,
        kind: TransferKind,
        destination: String,
        requested_at: DateTime<Utc>,
    },
    /// The transport layer began dialing the destination leg.
    TransferDialing {
        call_id: Uuid,
        destination: String,
        dialed_at: DateTime<Utc>,
    },
    /// The destination leg answered and is bridged to the caller.
    TransferConnected {
        call_id: Uuid,
        destination: String,
        connected_at: DateTime<Utc>,
    },
    /// The transfer failed to connect (no answer, busy, rejected, provider
    /// error) and the caller remains with the original leg.
    TransferFailed {
        call_id: Uuid,
        destination: String,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    /// The destination leg (or the caller) hung up after a successful
    /// transfer.
    TransferEnded {
        call_id: Uuid,
        destination: String,
        ended_at: DateTime<Utc>,
    },
}

impl TransferEvent {
    pub fn call_id(&self) -> Uuid {
        match self {
            TransferEvent::TransferRequested { call_id, .. }
            | TransferEvent::TransferDialing { call_id, .. }
            | TransferEvent::TransferConnected { call_id, .. }
            | TransferEvent::TransferFailed { call_id, .. }
            | TransferEvent::TransferEnded { call_id, .. } => *call_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let event = TransferEvent::TransferRequested {
            call_id: Uuid::new_v4(),
            kind: TransferKind::Warm,
            destination: "+15551234567".into(),
            requested_at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: TransferEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
