//! Coordinates a call transfer across whichever process is driving the
//! call's pipeline: the engine requests a transfer, the transport dials the
//! destination, and whoever is waiting on the outcome (the tool call that
//! triggered it, or an operator dashboard) is notified over the event bus
//! rather than by polling.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::time::timeout;
use uuid::Uuid;

use bus::protocol::{TransferEvent, TransferKind};
use bus::EventBus;

use crate::error::{VoxError, VoxResult};

fn channel_for(call_id: Uuid) -> String {
    format!("transfer:events:{call_id}")
}

/// Context for a transfer in progress, kept around so a late subscriber (or
/// a retry) can see what's already been requested.
#[derive(Debug, Clone)]
pub struct TransferContext {
    pub call_id: Uuid,
    pub destination: String,
    pub kind: TransferKind,
    pub conference_name: String,
}

#[derive(Clone)]
pub struct TransferCoordinator {
    bus: EventBus,
    contexts: Arc<DashMap<Uuid, TransferContext>>,
}

impl TransferCoordinator {
    pub fn new(bus: EventBus) -> Self {
        Self { bus, contexts: Arc::new(DashMap::new()) }
    }

    pub async fn request_transfer(&self, call_id: Uuid, destination: &str, kind: TransferKind) -> VoxResult<TransferContext> {
        let context = TransferContext {
            call_id,
            destination: destination.to_string(),
            kind,
            conference_name: format!("transfer-{call_id}"),
        };
        self.contexts.insert(call_id, context.clone());
        self.bus
            .publish(
                &channel_for(call_id),
                &TransferEvent::TransferRequested {
                    call_id,
                    kind,
                    destination: destination.to_string(),
                    requested_at: Utc::now(),
                },
            )
            .await?;
        Ok(context)
    }

    pub async fn report_dialing(&self, call_id: Uuid, destination: &str) -> VoxResult<()> {
        self.bus
            .publish(&channel_for(call_id), &TransferEvent::TransferDialing { call_id, destination: destination.to_string(), dialed_at: Utc::now() })
            .await?;
        Ok(())
    }

    pub async fn report_connected(&self, call_id: Uuid, destination: &str) -> VoxResult<()> {
        self.bus
            .publish(&channel_for(call_id), &TransferEvent::TransferConnected { call_id, destination: destination.to_string(), connected_at: Utc::now() })
            .await?;
        Ok(())
    }

    pub async fn report_failed(&self, call_id: Uuid, destination: &str, reason: &str) -> VoxResult<()> {
        self.bus
            .publish(
                &channel_for(call_id),
                &TransferEvent::TransferFailed { call_id, destination: destination.to_string(), reason: reason.to_string(), failed_at: Utc::now() },
            )
            .await?;
        self.contexts.remove(&call_id);
        Ok(())
    }

    pub async fn report_ended(&self, call_id: Uuid, destination: &str) -> VoxResult<()> {
        self.bus
            .publish(&channel_for(call_id), &TransferEvent::TransferEnded { call_id, destination: destination.to_string(), ended_at: Utc::now() })
            .await?;
        self.contexts.remove(&call_id);
        Ok(())
    }

    pub fn context(&self, call_id: Uuid) -> Option<TransferContext> {
        self.contexts.get(&call_id).map(|entry| entry.clone())
    }

    /// Block until the transfer for `call_id` reaches a terminal state
    /// (connected, failed, or ended), or `timeout_duration` elapses.
    pub async fn wait_for_completion(&self, call_id: Uuid, timeout_duration: Duration) -> VoxResult<TransferEvent> {
        let mut sub = self.bus.subscribe(&channel_for(call_id)).await?;
        let wait = async {
            loop {
                let value = sub.recv().await?;
                let event: TransferEvent = serde_json::from_value((*value).clone())?;
                if matches!(event, TransferEvent::TransferConnected { .. } | TransferEvent::TransferFailed { .. } | TransferEvent::TransferEnded { .. }) {
                    return Ok(event);
                }
            }
        };
        match timeout(timeout_duration, wait).await {
            Ok(result) => result,
            Err(_) => Err(VoxError::TransferFailed(format!("timed out waiting for transfer completion on call {call_id}"))),
        }
    }
}
