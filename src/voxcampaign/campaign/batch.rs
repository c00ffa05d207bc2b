//! Selects the next batch of contacts to dial for a campaign, claims queued
//! runs for processing, and dispatches a workflow run per claim, respecting
//! the campaign's schedule window, concurrency cap, and circuit breaker
//! state.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use bus::protocol::campaign_events::CampaignEvent;
use bus::EventBus;

use crate::campaign::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::campaign::orchestrator::CAMPAIGN_EVENTS_CHANNEL;
use crate::campaign::schedule::is_within_schedule;
use crate::error::VoxResult;
use crate::model::{Campaign, CampaignStatus, ContactStatus, QueuedRun, WorkflowRun};
use crate::repository::{CampaignRepository, ContactRepository, QueuedRunRepository, WorkflowRunRepository};

pub struct BatchScheduler<C, T, Q, W> {
    campaigns: C,
    contacts: T,
    queued_runs: Q,
    workflow_runs: W,
    circuit_breaker: CircuitBreaker,
    bus: EventBus,
}

impl<C: CampaignRepository, T: ContactRepository, Q: QueuedRunRepository, W: WorkflowRunRepository> BatchScheduler<C, T, Q, W> {
    pub fn new(campaigns: C, contacts: T, queued_runs: Q, workflow_runs: W, circuit_breaker: CircuitBreaker, bus: EventBus) -> Self {
        Self { campaigns, contacts, queued_runs, workflow_runs, circuit_breaker, bus }
    }

    /// Queue a [`QueuedRun`] per pending contact (up to `batch_size`), then
    /// claim up to `batch_size` queued runs — due retries first, then fresh
    /// attempts — and dispatch a [`WorkflowRun`] for each claim. Returns the
    /// number of workflow runs dispatched — `0` is not an error; it simply
    /// means the campaign is out of schedule, circuit-broken, or has nothing
    /// left to claim.
    pub async fn schedule_next_batch(&self, campaign_id: Uuid, batch_size: usize, breaker_config: CircuitBreakerConfig) -> VoxResult<usize> {
        let campaign = self.campaigns.get(campaign_id).await?;

        if campaign.status != CampaignStatus::Active {
            info!(campaign_id = %campaign_id, status = ?campaign.status, "campaign not active, not scheduling a batch");
            return Ok(0);
        }

        if !is_within_schedule(&campaign.schedule_windows, Utc::now()) {
            info!(campaign_id = %campaign_id, "outside configured schedule window, not scheduling a batch");
            return Ok(0);
        }

        let (open, _) = self.circuit_breaker.is_open(campaign_id, breaker_config).await;
        if open {
            info!(campaign_id = %campaign_id, "circuit breaker open, not scheduling a batch");
            return Ok(0);
        }

        let pending = self.contacts.list_pending(campaign_id, batch_size).await?;
        for mut contact in pending {
            contact.status = ContactStatus::Queued;
            contact.attempts += 1;
            contact.last_attempt_at = Some(Utc::now());
            let contact_id = contact.id;
            self.contacts.save(contact).await?;
            self.queued_runs.enqueue(QueuedRun::new(campaign_id, contact_id)).await?;
        }

        let claimed = self.queued_runs.claim_queued_runs_for_processing(campaign_id, Utc::now(), batch_size).await?;
        let dispatched = claimed.len();
        for mut queued_run in claimed {
            let mut run = WorkflowRun::new(campaign.workflow_id);
            run.campaign_id = Some(campaign_id);
            run.contact_id = Some(queued_run.contact_id);
            let workflow_run_id = run.id;
            self.workflow_runs.enqueue(run).await?;

            queued_run.workflow_run_id = Some(workflow_run_id);
            self.queued_runs.update(queued_run).await?;
        }

        info!(campaign_id = %campaign_id, dispatched, "scheduled batch");
        Ok(dispatched)
    }

    pub async fn campaign(&self, campaign_id: Uuid) -> VoxResult<Campaign> {
        self.campaigns.get(campaign_id).await
    }

    pub async fn save_campaign(&self, campaign: Campaign) -> VoxResult<()> {
        self.campaigns.save(campaign).await
    }

    pub async fn active_campaigns(&self, org_id: Option<Uuid>) -> VoxResult<Vec<Campaign>> {
        self.campaigns.list_active(org_id).await
    }

    pub async fn queued_run(&self, run_id: Uuid) -> VoxResult<QueuedRun> {
        self.queued_runs.get(run_id).await
    }

    pub async fn enqueue_queued_run(&self, run: QueuedRun) -> VoxResult<()> {
        self.queued_runs.enqueue(run).await
    }

    pub async fn workflow_run(&self, run_id: Uuid) -> VoxResult<WorkflowRun> {
        self.workflow_runs.get(run_id).await
    }

    pub async fn save_workflow_run(&self, run: WorkflowRun) -> VoxResult<()> {
        self.workflow_runs.update(run).await
    }

    /// Record a call's terminal outcome against the campaign's circuit
    /// breaker. If this outcome trips the breaker, pause the campaign,
    /// reset the breaker's window, and publish `CircuitBreakerTripped` so
    /// the orchestrator clears any in-memory state it holds for the
    /// campaign. Returns whether the breaker tripped.
    pub async fn record_call_outcome(&self, campaign_id: Uuid, is_failure: bool, config: CircuitBreakerConfig) -> VoxResult<bool> {
        let (tripped, stats) = self.circuit_breaker.record_call_outcome(campaign_id, is_failure, config).await;
        if !tripped {
            return Ok(false);
        }

        let mut campaign = self.campaigns.get(campaign_id).await?;
        campaign.status = CampaignStatus::Paused;
        campaign.updated_at = Utc::now();
        let org_id = campaign.org_id;
        self.campaigns.save(campaign).await?;
        self.circuit_breaker.reset(campaign_id).await;

        let failure_count = stats.map(|s| s.failure_count as u32).unwrap_or(0);
        let event = CampaignEvent::CircuitBreakerTripped {
            campaign_id,
            org_id,
            failure_count,
            window_seconds: config.window.as_secs() as u32,
            tripped_at: Utc::now(),
        };
        self.bus.publish(CAMPAIGN_EVENTS_CHANNEL, &event).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CampaignStatus, Contact, RetryConfig, SourceSyncStatus};
    use crate::repository::memory::{InMemoryCampaignRepository, InMemoryContactRepository, InMemoryQueuedRunRepository, InMemoryWorkflowRunRepository};
    use std::collections::HashMap;

    fn campaign(status: CampaignStatus) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            name: "spring promo".into(),
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
            phone_number: "+15551234567".into(),
            status: ContactStatus::Pending,
            attempts: 0,
            variables: HashMap::new(),
            last_attempt_at: None,
        }
    }

    fn scheduler(
        campaigns: InMemoryCampaignRepository,
        contacts: InMemoryContactRepository,
        queued_runs: InMemoryQueuedRunRepository,
        breaker: CircuitBreaker,
    ) -> BatchScheduler<InMemoryCampaignRepository, InMemoryContactRepository, InMemoryQueuedRunRepository, InMemoryWorkflowRunRepository> {
        BatchScheduler::new(campaigns, contacts, queued_runs, InMemoryWorkflowRunRepository::default(), breaker, EventBus::default())
    }

    #[tokio::test]
    async fn enqueues_a_run_per_pending_contact_up_to_batch_size() {
        let campaigns = InMemoryCampaignRepository::default();
        let contacts = InMemoryContactRepository::default();
        let queued_runs = InMemoryQueuedRunRepository::default();

        let c = campaign(CampaignStatus::Active);
        campaigns.save(c.clone()).await.unwrap();
        for _ in 0..5 {
            contacts.save(contact(c.id)).await.unwrap();
        }

        let scheduler = scheduler(campaigns, contacts, queued_runs, CircuitBreaker::new());
        let dispatched = scheduler.schedule_next_batch(c.id, 3, CircuitBreakerConfig::default()).await.unwrap();
        assert_eq!(dispatched, 3);
    }

    #[tokio::test]
    async fn paused_campaigns_schedule_nothing() {
        let campaigns = InMemoryCampaignRepository::default();
        let contacts = InMemoryContactRepository::default();
        let queued_runs = InMemoryQueuedRunRepository::default();

        let c = campaign(CampaignStatus::Paused);
        campaigns.save(c.clone()).await.unwrap();
        contacts.save(contact(c.id)).await.unwrap();

        let scheduler = scheduler(campaigns, contacts, queued_runs, CircuitBreaker::new());
        let dispatched = scheduler.schedule_next_batch(c.id, 3, CircuitBreakerConfig::default()).await.unwrap();
        assert_eq!(dispatched, 0);
    }

    #[tokio::test]
    async fn an_open_circuit_breaker_blocks_scheduling() {
        let campaigns = InMemoryCampaignRepository::default();
        let contacts = InMemoryContactRepository::default();
        let queued_runs = InMemoryQueuedRunRepository::default();
        let breaker = CircuitBreaker::new();

        let c = campaign(CampaignStatus::Active);
        campaigns.save(c.clone()).await.unwrap();
        contacts.save(contact(c.id)).await.unwrap();

        let mut cfg = CircuitBreakerConfig::default();
        cfg.min_calls_in_window = 1;
        for _ in 0..2 {
            breaker.record_call_outcome(c.id, true, cfg).await;
        }

        let scheduler = scheduler(campaigns, contacts, queued_runs, breaker);
        let dispatched = scheduler.schedule_next_batch(c.id, 3, cfg).await.unwrap();
        assert_eq!(dispatched, 0);
    }

    #[tokio::test]
    async fn tripping_the_breaker_pauses_the_campaign_and_publishes_an_event() {
        let campaigns = InMemoryCampaignRepository::default();
        let contacts = InMemoryContactRepository::default();
        let queued_runs = InMemoryQueuedRunRepository::default();
        let breaker = CircuitBreaker::new();

        let c = campaign(CampaignStatus::Active);
        campaigns.save(c.clone()).await.unwrap();

        let scheduler = scheduler(campaigns, contacts, queued_runs, breaker);
        let mut sub = scheduler.bus.subscribe(CAMPAIGN_EVENTS_CHANNEL).await.unwrap();

        let mut cfg = CircuitBreakerConfig::default();
        cfg.min_calls_in_window = 1;
        let tripped = scheduler.record_call_outcome(c.id, true, cfg).await.unwrap();
        assert!(tripped);

        let paused = scheduler.campaign(c.id).await.unwrap();
        assert_eq!(paused.status, CampaignStatus::Paused);

        let raw = sub.recv().await.unwrap();
        let event: CampaignEvent = serde_json::from_value((*raw).clone()).unwrap();
        assert!(matches!(event, CampaignEvent::CircuitBreakerTripped { campaign_id, .. } if campaign_id == c.id));
    }
}
