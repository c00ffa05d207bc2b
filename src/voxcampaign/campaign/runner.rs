//! Campaign lifecycle operations: starting, pausing, resuming, and
//! reporting status. State transitions are validated here so a caller (the
//! HTTP API) can't, say, resume a campaign that was never paused.

use chrono::Utc;
use uuid::Uuid;

use crate::campaign::circuit_breaker::CircuitBreaker;
use crate::error::{VoxError, VoxResult};
use crate::model::{Campaign, CampaignStatus};
use crate::repository::{CampaignRepository, WorkflowRunRepository};

/// Final statuses a telephony provider's status callback can report that
/// count a run as a failed call, mirroring the original's status string
/// comparison (case-insensitive, Twilio's vocabulary).
pub const FAILED_CALL_STATUSES: &[&str] = &["failed", "busy", "no-answer"];

#[derive(Debug, Clone, serde::Serialize)]
pub struct CampaignStatusReport {
    pub campaign_id: Uuid,
    pub status: CampaignStatus,
    pub failed_calls: u32,
}

pub struct CampaignRunnerService<C, R> {
    campaigns: C,
    runs: R,
    circuit_breaker: CircuitBreaker,
}

impl<C: CampaignRepository, R: WorkflowRunRepository> CampaignRunnerService<C, R> {
    pub fn new(campaigns: C, runs: R, circuit_breaker: CircuitBreaker) -> Self {
        Self { campaigns, runs, circuit_breaker }
    }

    fn require_status(campaign: &Campaign, allowed: &[CampaignStatus]) -> VoxResult<()> {
        if !allowed.contains(&campaign.status) {
            return Err(VoxError::Config(format!(
                "campaign {} must be in one of {:?} to perform this transition, current status: {:?}",
                campaign.id, allowed, campaign.status
            )));
        }
        Ok(())
    }

    pub async fn start_campaign(&self, campaign_id: Uuid) -> VoxResult<()> {
        let mut campaign = self.campaigns.get(campaign_id).await?;
        Self::require_status(&campaign, &[CampaignStatus::Draft, CampaignStatus::Scheduled])?;
        campaign.status = CampaignStatus::Active;
        campaign.updated_at = Utc::now();
        self.campaigns.save(campaign).await
    }

    pub async fn pause_campaign(&self, campaign_id: Uuid) -> VoxResult<()> {
        let mut campaign = self.campaigns.get(campaign_id).await?;
        Self::require_status(&campaign, &[CampaignStatus::Active])?;
        campaign.status = CampaignStatus::Paused;
        campaign.updated_at = Utc::now();
        self.campaigns.save(campaign).await
    }

    /// Resume a paused campaign. Does not schedule a batch itself — the
    /// orchestrator's stale-campaign sweep will pick up any pending
    /// contacts once the campaign is active again.
    pub async fn resume_campaign(&self, campaign_id: Uuid) -> VoxResult<()> {
        let mut campaign = self.campaigns.get(campaign_id).await?;
        Self::require_status(&campaign, &[CampaignStatus::Paused])?;
        campaign.status = CampaignStatus::Active;
        campaign.updated_at = Utc::now();
        self.campaigns.save(campaign).await?;
        self.circuit_breaker.reset(campaign_id).await;
        Ok(())
    }

    pub async fn cancel_campaign(&self, campaign_id: Uuid) -> VoxResult<()> {
        let mut campaign = self.campaigns.get(campaign_id).await?;
        Self::require_status(
            &campaign,
            &[CampaignStatus::Draft, CampaignStatus::Scheduled, CampaignStatus::Active, CampaignStatus::Paused],
        )?;
        campaign.status = CampaignStatus::Cancelled;
        campaign.updated_at = Utc::now();
        self.campaigns.save(campaign).await
    }

    pub async fn get_campaign(&self, campaign_id: Uuid) -> VoxResult<Campaign> {
        self.campaigns.get(campaign_id).await
    }

    /// Detailed status, including a count of calls whose last telephony
    /// status callback reported a terminal failure. A run with no callbacks
    /// yet (still dialing, or never reached the provider) is not counted.
    pub async fn get_campaign_status(&self, campaign_id: Uuid) -> VoxResult<CampaignStatusReport> {
        let campaign = self.campaigns.get(campaign_id).await?;
        let runs = self.runs.list_by_campaign(campaign_id).await?;

        let failed_calls = runs
            .iter()
            .filter(|run| {
                run.logs
                    .get("telephony_status_callbacks")
                    .and_then(|v| v.as_array())
                    .and_then(|callbacks| callbacks.last())
                    .and_then(|last| last.get("status"))
                    .and_then(|s| s.as_str())
                    .map(|status| FAILED_CALL_STATUSES.contains(&status.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .count() as u32;

        Ok(CampaignStatusReport { campaign_id, status: campaign.status, failed_calls })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RetryConfig, SourceSyncStatus, WorkflowRun};
    use crate::repository::memory::{InMemoryCampaignRepository, InMemoryWorkflowRunRepository};

    fn draft_campaign() -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            name: "q3 renewals".into(),
            workflow_id: Uuid::new_v4(),
            status: CampaignStatus::Draft,
            schedule_windows: vec![],
            rate_limit_per_second: None,
            max_concurrent_calls: 10,
            source_sync_status: SourceSyncStatus::NeverSynced,
            source_last_synced_at: None,
            source_sync_error: None,
            retry_config: RetryConfig::default(),
            failed_rows: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn start_moves_a_draft_campaign_to_active() {
        let repo = InMemoryCampaignRepository::default();
        let c = draft_campaign();
        repo.save(c.clone()).await.unwrap();
        let runner = CampaignRunnerService::new(repo, InMemoryWorkflowRunRepository::default(), CircuitBreaker::new());
        runner.start_campaign(c.id).await.unwrap();
        assert_eq!(runner.get_campaign(c.id).await.unwrap().status, CampaignStatus::Active);
    }

    #[tokio::test]
    async fn starting_an_already_active_campaign_is_rejected() {
        let repo = InMemoryCampaignRepository::default();
        let mut c = draft_campaign();
        c.status = CampaignStatus::Active;
        repo.save(c.clone()).await.unwrap();
        let runner = CampaignRunnerService::new(repo, InMemoryWorkflowRunRepository::default(), CircuitBreaker::new());
        assert!(runner.start_campaign(c.id).await.is_err());
    }

    #[tokio::test]
    async fn resume_resets_the_circuit_breaker() {
        let repo = InMemoryCampaignRepository::default();
        let mut c = draft_campaign();
        c.status = CampaignStatus::Paused;
        repo.save(c.clone()).await.unwrap();
        let breaker = CircuitBreaker::new();
        for _ in 0..5 {
            breaker.record_call_outcome(c.id, true, Default::default()).await;
        }
        let runner = CampaignRunnerService::new(repo, InMemoryWorkflowRunRepository::default(), breaker.clone());
        runner.resume_campaign(c.id).await.unwrap();
        let (open, stats) = breaker.is_open(c.id, Default::default()).await;
        assert!(!open);
        assert_eq!(stats.unwrap().failure_count, 0);
    }

    #[tokio::test]
    async fn pausing_a_draft_campaign_is_rejected() {
        let repo = InMemoryCampaignRepository::default();
        let c = draft_campaign();
        repo.save(c.clone()).await.unwrap();
        let runner = CampaignRunnerService::new(repo, InMemoryWorkflowRunRepository::default(), CircuitBreaker::new());
        assert!(runner.pause_campaign(c.id).await.is_err());
    }

    #[tokio::test]
    async fn status_report_counts_only_runs_whose_last_callback_is_terminally_failed() {
        let campaigns = InMemoryCampaignRepository::default();
        let runs_repo = InMemoryWorkflowRunRepository::default();
        let mut c = draft_campaign();
        c.status = CampaignStatus::Active;
        campaigns.save(c.clone()).await.unwrap();

        let mut failed_run = WorkflowRun::new(c.workflow_id);
        failed_run.campaign_id = Some(c.id);
        failed_run.append_telephony_callback(serde_json::json!({"status": "ringing"}));
        failed_run.append_telephony_callback(serde_json::json!({"status": "no-answer"}));
        runs_repo.enqueue(failed_run).await.unwrap();

        let mut ok_run = WorkflowRun::new(c.workflow_id);
        ok_run.campaign_id = Some(c.id);
        ok_run.append_telephony_callback(serde_json::json!({"status": "completed"}));
        runs_repo.enqueue(ok_run).await.unwrap();

        let mut untouched_run = WorkflowRun::new(c.workflow_id);
        untouched_run.campaign_id = Some(c.id);
        runs_repo.enqueue(untouched_run).await.unwrap();

        let runner = CampaignRunnerService::new(campaigns, runs_repo, CircuitBreaker::new());
        let report = runner.get_campaign_status(c.id).await.unwrap();
        assert_eq!(report.failed_calls, 1);
        assert_eq!(report.status, CampaignStatus::Active);
    }
}
