//! Tagged-union events exchanged between campaign orchestrator workers.
//!
//! These mirror the shape of a durable event log: every variant carries the
//! `campaign_id` (and usually `org_id`) needed to route and replay it without
//! consulting anything else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a retry child run was created, mirrored from [`crate::model`]-adjacent
/// call dispositions so the orchestrator can react without depending on the
/// `voxcampaign` crate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetryReason {
    Busy,
    NoAnswer,
    Voicemail,
    Failed,
    Error,
}

/// Events published on the campaign control channel.
///
/// Consumers (the orchestrator's own dispatch loop, and any number of
/// observers such as the HTTP API or a metrics sink) match on `event_type`
/// via serde's internally tagged representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum CampaignEvent {
    /// A campaign has been picked up by the scheduler and moved into the
    /// active set for its organization.
    CampaignActivated {
        campaign_id: Uuid,
        org_id: Uuid,
        activated_at: DateTime<Utc>,
    },
    /// A batch of contacts has been dispatched for dialing.
    BatchStarted {
        campaign_id: Uuid,
        batch_id: Uuid,
        contact_count: u32,
        started_at: DateTime<Utc>,
    },
    /// A batch completed without the campaign being paused or cancelled.
    BatchCompleted {
        campaign_id: Uuid,
        batch_id: Uuid,
        succeeded: u32,
        failed: u32,
        completed_at: DateTime<Utc>,
    },
    /// A batch failed outright (distinct from individual call failures inside
    /// a batch, which are counted in `BatchCompleted.failed`).
    ///
    /// Per the orchestrator's recovery policy this does *not* trigger an
    /// immediate reschedule; the campaign is left for the next scheduler tick
    /// to pick up, the same as if the batch had simply timed out.
    BatchFailed {
        campaign_id: Uuid,
        batch_id: Uuid,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    /// A contact source finished syncing (a CRM export, a dialer list
    /// upload). Lets the orchestrator kick off scheduling for a campaign
    /// whose contacts had not finished loading yet.
    SyncCompleted {
        campaign_id: Uuid,
        total_rows: u32,
        synced_at: DateTime<Utc>,
    },
    /// A call ended in a disposition its campaign's retry policy covers
    /// (busy, no answer, voicemail, or an outright failure) and a retry
    /// child run was enqueued for it.
    RetryNeeded {
        campaign_id: Uuid,
        workflow_run_id: Uuid,
        queued_run_id: Uuid,
        reason: RetryReason,
    },
    /// A queued run exhausted its retry budget (`retry_count >=
    /// max_retries`) and will not be retried again.
    RetryFailed {
        campaign_id: Uuid,
        queued_run_id: Uuid,
        reason: RetryReason,
        failed_at: DateTime<Utc>,
    },
    /// The circuit breaker tripped for this campaign; dialing is paused for
    /// it until an operator resumes it or its window cools down.
    CircuitBreakerTripped {
        campaign_id: Uuid,
        org_id: Uuid,
        failure_count: u32,
        window_seconds: u32,
        tripped_at: DateTime<Utc>,
    },
    /// The circuit breaker reset, either after a cooldown or an operator
    /// resuming the paused campaign.
    CircuitBreakerReset {
        campaign_id: Uuid,
        org_id: Uuid,
        reset_at: DateTime<Utc>,
    },
    /// A campaign was paused, either by an operator or because it ran
    /// outside its configured schedule window.
    CampaignPaused {
        campaign_id: Uuid,
        reason: String,
        paused_at: DateTime<Utc>,
    },
    /// A campaign finished: every contact has a terminal outcome and no more
    /// batches remain to dispatch.
    CampaignCompleted {
        campaign_id: Uuid,
        completed_at: DateTime<Utc>,
    },
}

impl CampaignEvent {
    /// The campaign this event pertains to. Every variant carries one.
    pub fn campaign_id(&self) -> Option<Uuid> {
        match self {
            CampaignEvent::CampaignActivated { campaign_id, .. }
            | CampaignEvent::BatchStarted { campaign_id, .. }
            | CampaignEvent::BatchCompleted { campaign_id, .. }
            | CampaignEvent::BatchFailed { campaign_id, .. }
            | CampaignEvent::SyncCompleted { campaign_id, .. }
            | CampaignEvent::RetryNeeded { campaign_id, .. }
            | CampaignEvent::RetryFailed { campaign_id, .. }
            | CampaignEvent::CircuitBreakerTripped { campaign_id, .. }
            | CampaignEvent::CircuitBreakerReset { campaign_id, .. }
            | CampaignEvent::CampaignPaused { campaign_id, .. }
            | CampaignEvent::CampaignCompleted { campaign_id, .. } => Some(*campaign_id),
        }
    }
}
