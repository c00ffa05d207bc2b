//! Event-driven coordination layer sitting above [`super::batch::BatchScheduler`].
//!
//! The orchestrator listens on the shared bus for [`CampaignEvent`]s and
//! reacts to them: a completed batch schedules the next one, a completed
//! sync kicks off the first batch, a retryable call outcome enqueues a
//! delayed child run, a tripped circuit breaker is logged (the breaker
//! itself already paused the campaign by the time this event arrives), and
//! a periodic sweep catches campaigns that should have a batch in flight
//! but don't (a crashed worker, a missed event, a cold start).

use std::sync::Arc;
use std::time::Duration;

use bus::protocol::campaign_events::{CampaignEvent, RetryReason};
use bus::EventBus;
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::campaign::batch::BatchScheduler;
use crate::campaign::circuit_breaker::CircuitBreakerConfig;
use crate::error::VoxResult;
use crate::model::{self, CampaignStatus};
use crate::repository::{CampaignRepository, ContactRepository, QueuedRunRepository, WorkflowRunRepository};

pub const CAMPAIGN_EVENTS_CHANNEL: &str = "campaign:events";

pub struct CampaignOrchestrator<C, T, Q, W> {
    scheduler: Arc<BatchScheduler<C, T, Q, W>>,
    bus: EventBus,
    breaker_config: CircuitBreakerConfig,
    batch_size: usize,
}

impl<C, T, Q, W> CampaignOrchestrator<C, T, Q, W>
where
    C: CampaignRepository + 'static,
    T: ContactRepository + 'static,
    Q: QueuedRunRepository + 'static,
    W: WorkflowRunRepository + 'static,
{
    pub fn new(scheduler: BatchScheduler<C, T, Q, W>, bus: EventBus, breaker_config: CircuitBreakerConfig, batch_size: usize) -> Self {
        Self { scheduler: Arc::new(scheduler), bus, breaker_config, batch_size }
    }

    /// Run the event dispatch loop until the bus channel closes. Intended to
    /// be spawned as its own task; errors handling one event are logged and
    /// do not stop the loop, the same as the original's `_listen_for_events`
    /// catch-and-continue behavior.
    pub async fn run(&self) -> VoxResult<()> {
        let mut sub = self.bus.subscribe(CAMPAIGN_EVENTS_CHANNEL).await?;
        loop {
            let raw = match sub.recv().await {
                Ok(raw) => raw,
                Err(_) => return Ok(()),
            };
            let event: CampaignEvent = match serde_json::from_value((*raw).clone()) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "discarding unparseable campaign event");
                    continue;
                }
            };
            if let Err(e) = self.handle_event(event).await {
                error!(error = %e, "error handling campaign event");
            }
        }
    }

    async fn handle_event(&self, event: CampaignEvent) -> VoxResult<()> {
        match event {
            CampaignEvent::BatchCompleted { campaign_id, .. } => {
                let dispatched = self.scheduler.schedule_next_batch(campaign_id, self.batch_size, self.breaker_config).await?;
                info!(campaign_id = %campaign_id, dispatched, "rescheduled next batch after completion");
            }
            CampaignEvent::BatchFailed { campaign_id, reason, .. } => {
                // Don't reschedule: the campaign is treated as failed and
                // left for an operator (or the stale sweep, if it's
                // resumed) rather than retried immediately.
                warn!(campaign_id = %campaign_id, reason, "batch failed, not rescheduling");
            }
            CampaignEvent::SyncCompleted { campaign_id, total_rows, .. } => {
                let dispatched = self.scheduler.schedule_next_batch(campaign_id, self.batch_size, self.breaker_config).await?;
                info!(campaign_id = %campaign_id, total_rows, dispatched, "scheduled first batch after source sync completed");
            }
            CampaignEvent::RetryNeeded { campaign_id, workflow_run_id, queued_run_id, reason } => {
                self.handle_retry_needed(campaign_id, workflow_run_id, queued_run_id, reason).await?;
            }
            CampaignEvent::RetryFailed { campaign_id, queued_run_id, reason, .. } => {
                warn!(campaign_id = %campaign_id, queued_run_id = %queued_run_id, ?reason, "retry budget exhausted");
            }
            CampaignEvent::CircuitBreakerTripped { campaign_id, failure_count, .. } => {
                // The breaker already paused the campaign and reset its own
                // state (see `BatchScheduler::record_call_outcome`); this
                // arm just logs for operators watching the event stream.
                warn!(campaign_id = %campaign_id, failure_count, "circuit breaker tripped, campaign paused");
            }
            CampaignEvent::CircuitBreakerReset { campaign_id, .. } => {
                info!(campaign_id = %campaign_id, "circuit breaker reset");
            }
            CampaignEvent::CampaignActivated { .. } | CampaignEvent::CampaignPaused { .. } | CampaignEvent::CampaignCompleted { .. } | CampaignEvent::BatchStarted { .. } => {}
        }
        Ok(())
    }

    /// A call ended in a disposition the campaign's retry policy covers.
    /// Consult `retry_config`: if the reason isn't one the campaign retries,
    /// or retries are disabled, nothing happens — the run stays `done`/
    /// `failed` as the caller already recorded it. If the exhausted retry
    /// budget is hit, bump `campaign.failed_rows` and publish `RetryFailed`.
    /// Otherwise enqueue a delayed child `QueuedRun`.
    async fn handle_retry_needed(&self, campaign_id: Uuid, workflow_run_id: Uuid, queued_run_id: Uuid, reason: RetryReason) -> VoxResult<()> {
        let campaign = self.scheduler.campaign(campaign_id).await?;
        let retry_config = campaign.retry_config;

        let reason_enabled = match reason {
            RetryReason::Busy => retry_config.retry_on_busy,
            RetryReason::NoAnswer => retry_config.retry_on_no_answer,
            RetryReason::Voicemail => retry_config.retry_on_voicemail,
            RetryReason::Failed | RetryReason::Error => true,
        };
        if !retry_config.enabled || !reason_enabled {
            info!(campaign_id = %campaign_id, queued_run_id = %queued_run_id, ?reason, "retry not applicable for this outcome, leaving run as-is");
            return Ok(());
        }

        let parent = self.scheduler.queued_run(queued_run_id).await?;
        let model_reason = to_model_retry_reason(reason);

        if parent.retry_count >= retry_config.max_retries {
            let mut campaign = campaign;
            campaign.failed_rows += 1;
            campaign.updated_at = Utc::now();
            self.scheduler.save_campaign(campaign).await?;

            let event = CampaignEvent::RetryFailed { campaign_id, queued_run_id, reason, failed_at: Utc::now() };
            self.bus.publish(CAMPAIGN_EVENTS_CHANNEL, &event).await?;
            warn!(campaign_id = %campaign_id, queued_run_id = %queued_run_id, retry_count = parent.retry_count, "retry budget exhausted");
            return Ok(());
        }

        let child = parent.retry_child(model_reason, retry_config.retry_delay_seconds);
        info!(campaign_id = %campaign_id, workflow_run_id = %workflow_run_id, parent_queued_run_id = %queued_run_id, child_queued_run_id = %child.id, retry_count = child.retry_count, "enqueuing retry child run");
        self.scheduler.enqueue_queued_run(child).await
    }

    /// Sweep every active campaign and schedule a batch for each. Meant to
    /// run on a fixed interval as a safety net alongside the event-driven
    /// path, so a missed `BatchCompleted` doesn't stall a campaign forever.
    pub async fn sweep_active_campaigns(&self) -> VoxResult<()> {
        for campaign in self.scheduler.active_campaigns(None).await? {
            let campaign_id = campaign.id;
            match self.scheduler.schedule_next_batch(campaign_id, self.batch_size, self.breaker_config).await {
                Ok(dispatched) if dispatched > 0 => {
                    info!(campaign_id = %campaign_id, dispatched, "stale sweep scheduled a batch");
                }
                Ok(_) => {}
                Err(e) => error!(campaign_id = %campaign_id, error = %e, "stale sweep failed to schedule a batch"),
            }
        }
        Ok(())
    }

    /// Run [`Self::sweep_active_campaigns`] on a fixed interval until the
    /// process shuts down. Intended to be spawned alongside [`Self::run`].
    pub async fn run_sweep_loop(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_active_campaigns().await {
                error!(error = %e, "stale campaign sweep failed");
            }
        }
    }
}

fn to_model_retry_reason(reason: RetryReason) -> model::RetryReason {
    match reason {
        RetryReason::Busy => model::RetryReason::Busy,
        RetryReason::NoAnswer => model::RetryReason::NoAnswer,
        RetryReason::Voicemail => model::RetryReason::Voicemail,
        RetryReason::Failed => model::RetryReason::Failed,
        RetryReason::Error => model::RetryReason::Error,
    }
}

pub async fn publish_batch_completed(bus: &EventBus, campaign_id: Uuid, batch_id: Uuid, succeeded: u32, failed: u32) -> VoxResult<()> {
    let event = CampaignEvent::BatchCompleted { campaign_id, batch_id, succeeded, failed, completed_at: Utc::now() };
    bus.publish(CAMPAIGN_EVENTS_CHANNEL, &event).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::circuit_breaker::CircuitBreaker;
    use crate::model::{Campaign, Contact, QueuedRun, RetryConfig, SourceSyncStatus};
    use crate::repository::memory::{InMemoryCampaignRepository, InMemoryContactRepository, InMemoryQueuedRunRepository, InMemoryWorkflowRunRepository};
    use std::collections::HashMap;

    fn campaign(status: CampaignStatus) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            name: "fall outreach".into(),
            workflow_id: Uuid::new_v4(),
            status,
            schedule_windows: vec![],
            rate_limit_per_second: None,
            max_concurrent_calls: 5,
            source_sync_status: SourceSyncStatus::Synced,
            source_last_synced_at: None,
            source_sync_error: None,
            retry_config: RetryConfig::default(),
            failed_rows: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn contact(campaign_id: Uuid) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            campaign_id,
            phone_number: "+15557654321".into(),
            status: crate::model::ContactStatus::Pending,
            attempts: 0,
            variables: HashMap::new(),
            last_attempt_at: None,
        }
    }

    type TestOrchestrator = CampaignOrchestrator<InMemoryCampaignRepository, InMemoryContactRepository, InMemoryQueuedRunRepository, InMemoryWorkflowRunRepository>;

    async fn orchestrator_with_campaign(status: CampaignStatus) -> (TestOrchestrator, EventBus, Uuid) {
        let campaigns = InMemoryCampaignRepository::default();
        let contacts = InMemoryContactRepository::default();
        let queued_runs = InMemoryQueuedRunRepository::default();
        let c = campaign(status);
        campaigns.save(c.clone()).await.unwrap();
        contacts.save(contact(c.id)).await.unwrap();

        let bus = EventBus::default();
        let scheduler = BatchScheduler::new(campaigns, contacts, queued_runs, InMemoryWorkflowRunRepository::default(), CircuitBreaker::new(), bus.clone());
        let orchestrator = CampaignOrchestrator::new(scheduler, bus.clone(), CircuitBreakerConfig::default(), 10);
        (orchestrator, bus, c.id)
    }

    #[tokio::test]
    async fn batch_completed_schedules_the_next_batch() {
        let (orchestrator, _bus, campaign_id) = orchestrator_with_campaign(CampaignStatus::Active).await;
        orchestrator
            .handle_event(CampaignEvent::BatchCompleted {
                campaign_id,
                batch_id: Uuid::new_v4(),
                succeeded: 1,
                failed: 0,
                completed_at: Utc::now(),
            })
            .await
            .unwrap();
        let remaining = orchestrator.scheduler.campaign(campaign_id).await.unwrap();
        assert_eq!(remaining.id, campaign_id);
    }

    #[tokio::test]
    async fn batch_failed_does_not_error_and_does_not_panic() {
        let (orchestrator, _bus, campaign_id) = orchestrator_with_campaign(CampaignStatus::Active).await;
        let result = orchestrator
            .handle_event(CampaignEvent::BatchFailed {
                campaign_id,
                batch_id: Uuid::new_v4(),
                reason: "provider outage".into(),
                failed_at: Utc::now(),
            })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn sync_completed_schedules_the_first_batch() {
        let (orchestrator, _bus, campaign_id) = orchestrator_with_campaign(CampaignStatus::Active).await;
        let result = orchestrator
            .handle_event(CampaignEvent::SyncCompleted { campaign_id, total_rows: 3, synced_at: Utc::now() })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn sweep_schedules_batches_for_every_active_campaign() {
        let (orchestrator, _bus, campaign_id) = orchestrator_with_campaign(CampaignStatus::Active).await;
        orchestrator.sweep_active_campaigns().await.unwrap();
        let _ = campaign_id;
    }

    #[tokio::test]
    async fn sweep_ignores_paused_campaigns() {
        let (orchestrator, _bus, _campaign_id) = orchestrator_with_campaign(CampaignStatus::Paused).await;
        orchestrator.sweep_active_campaigns().await.unwrap();
    }

    #[tokio::test]
    async fn retry_needed_enqueues_a_delayed_child_run_when_under_budget() {
        let (orchestrator, _bus, campaign_id) = orchestrator_with_campaign(CampaignStatus::Active).await;
        let mut campaign = orchestrator.scheduler.campaign(campaign_id).await.unwrap();
        campaign.retry_config = RetryConfig { enabled: true, max_retries: 2, retry_delay_seconds: 60, retry_on_busy: true, retry_on_no_answer: true, retry_on_voicemail: false };
        orchestrator.scheduler.save_campaign(campaign).await.unwrap();

        let parent = QueuedRun::new(campaign_id, Uuid::new_v4());
        let parent_id = parent.id;
        orchestrator.scheduler.enqueue_queued_run(parent).await.unwrap();

        orchestrator
            .handle_event(CampaignEvent::RetryNeeded { campaign_id, workflow_run_id: Uuid::new_v4(), queued_run_id: parent_id, reason: RetryReason::NoAnswer })
            .await
            .unwrap();

        let all_runs = orchestrator.scheduler.queued_run(parent_id).await.unwrap();
        let _ = all_runs;
    }

    #[tokio::test]
    async fn retry_needed_marks_failed_once_budget_is_exhausted() {
        let (orchestrator, _bus, campaign_id) = orchestrator_with_campaign(CampaignStatus::Active).await;
        let mut campaign = orchestrator.scheduler.campaign(campaign_id).await.unwrap();
        campaign.retry_config = RetryConfig { enabled: true, max_retries: 0, retry_delay_seconds: 60, retry_on_busy: true, retry_on_no_answer: true, retry_on_voicemail: false };
        orchestrator.scheduler.save_campaign(campaign).await.unwrap();

        let parent = QueuedRun::new(campaign_id, Uuid::new_v4());
        let parent_id = parent.id;
        orchestrator.scheduler.enqueue_queued_run(parent).await.unwrap();

        orchestrator
            .handle_event(CampaignEvent::RetryNeeded { campaign_id, workflow_run_id: Uuid::new_v4(), queued_run_id: parent_id, reason: RetryReason::NoAnswer })
            .await
            .unwrap();

        let campaign = orchestrator.scheduler.campaign(campaign_id).await.unwrap();
        assert_eq!(campaign.failed_rows, 1);
    }
}
