//! Runs inside every worker process that can host a call's pipeline.
//! Subscribes to one organization's stasis event channel and tracks which
//! channel ids this worker currently owns, without ever touching the
//! provider connection — that's the manager's job. Publishes its own
//! liveness as a [`WorkerHeartbeat`] so a rebalance can tell a worker that
//! vanished uncleanly from one that's merely quiet.

use std::sync::Arc;
use std::time::Duration;

use bus::protocol::WorkerHeartbeat;
use bus::EventBus;
use chrono::Utc;
use dashmap::DashMap;
use tokio::time::sleep;
use uuid::Uuid;

use crate::error::VoxResult;

const HEARTBEAT_TTL_SECONDS: u32 = 30;

pub struct StasisWorker {
    pub worker_id: Uuid,
    bus: EventBus,
    active_channels: Arc<DashMap<String, Uuid>>,
    draining: Arc<std::sync::atomic::AtomicBool>,
}

impl StasisWorker {
    pub fn new(bus: EventBus) -> Self {
        Self {
            worker_id: Uuid::new_v4(),
            bus,
            active_channels: Arc::new(DashMap::new()),
            draining: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Claim a channel for this worker's pipeline, associating it with a
    /// workflow run. Rejects new claims while draining for a graceful
    /// shutdown.
    pub fn claim_channel(&self, channel_id: &str, workflow_run_id: Uuid) -> bool {
        if self.draining.load(std::sync::atomic::Ordering::SeqCst) {
            return false;
        }
        self.active_channels.insert(channel_id.to_string(), workflow_run_id);
        true
    }

    pub fn release_channel(&self, channel_id: &str) {
        self.active_channels.remove(channel_id);
    }

    pub fn active_count(&self) -> usize {
        self.active_channels.len()
    }

    pub async fn publish_heartbeat(&self, org_ids: Vec<Uuid>) -> VoxResult<()> {
        self.bus
            .publish(
                "stasis:workers:heartbeat",
                &WorkerHeartbeat { worker_id: self.worker_id.to_string(), org_ids, at: Utc::now(), ttl_seconds: HEARTBEAT_TTL_SECONDS },
            )
            .await?;
        Ok(())
    }

    /// Run the heartbeat loop until the receiver end of `shutdown` fires.
    pub async fn run_heartbeat_loop(&self, org_ids: Vec<Uuid>, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                _ = sleep(Duration::from_secs(10)) => {
                    if self.publish_heartbeat(org_ids.clone()).await.is_err() {
                        return;
                    }
                }
                _ = &mut shutdown => return,
            }
        }
    }

    /// Stop accepting new channels and wait for existing ones to drain,
    /// giving up after `max_wait`.
    pub async fn graceful_shutdown(&self, max_wait: Duration) {
        self.draining.store(true, std::sync::atomic::Ordering::SeqCst);
        let deadline = tokio::time::Instant::now() + max_wait;
        while self.active_count() > 0 && tokio::time::Instant::now() < deadline {
            sleep(Duration::from_millis(50)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claims_and_releases_update_active_count() {
        let worker = StasisWorker::new(EventBus::default());
        assert!(worker.claim_channel("chan-1", Uuid::new_v4()));
        assert_eq!(worker.active_count(), 1);
        worker.release_channel("chan-1");
        assert_eq!(worker.active_count(), 0);
    }

    #[tokio::test]
    async fn draining_rejects_new_claims() {
        let worker = StasisWorker::new(EventBus::default());
        worker.draining.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(!worker.claim_channel("chan-1", Uuid::new_v4()));
    }

    #[tokio::test]
    async fn graceful_shutdown_returns_once_active_channels_drain() {
        let worker = StasisWorker::new(EventBus::default());
        worker.claim_channel("chan-1", Uuid::new_v4());

        let active_channels = worker.active_channels.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            active_channels.remove("chan-1");
        });

        worker.graceful_shutdown(Duration::from_secs(2)).await;
        assert_eq!(worker.active_count(), 0);
    }

    #[tokio::test]
    async fn heartbeat_is_published_to_the_workers_channel() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe("stasis:workers:heartbeat").await.unwrap();
        let worker = StasisWorker::new(bus);
        worker.publish_heartbeat(vec![Uuid::new_v4()]).await.unwrap();
        let value = sub.recv().await.unwrap();
        let heartbeat: WorkerHeartbeat = serde_json::from_value((*value).clone()).unwrap();
        assert_eq!(heartbeat.worker_id, worker.worker_id.to_string());
    }
}
