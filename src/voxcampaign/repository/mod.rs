//! Repository-pattern trait abstractions over persistent storage.
//!
//! Storage backend drivers are out of scope for this crate; only the trait
//! boundary and an in-memory reference implementation (used throughout the
//! test suite) live here. A real deployment plugs in its own implementation
//! backed by whatever database it runs — the orchestrator and campaign
//! logic depend only on these traits. One trait per aggregate:
//! [`OrganizationRepository`], [`WorkflowRepository`], [`CampaignRepository`],
//! [`ContactRepository`], [`QueuedRunRepository`], [`WorkflowRunRepository`],
//! [`TelephonyConfigRepository`].

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::VoxResult;
use crate::model::{Campaign, Contact, Organization, QueuedRun, TelephonyConfig, Workflow, WorkflowRun};

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> VoxResult<Organization>;
    async fn save(&self, org: Organization) -> VoxResult<()>;
}

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> VoxResult<Workflow>;
    async fn save(&self, workflow: Workflow) -> VoxResult<()>;
}

#[async_trait]
pub trait TelephonyConfigRepository: Send + Sync {
    async fn get(&self, org_id: Uuid) -> VoxResult<TelephonyConfig>;
    async fn save(&self, config: TelephonyConfig) -> VoxResult<()>;
}

#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> VoxResult<Campaign>;
    async fn save(&self, campaign: Campaign) -> VoxResult<()>;
    /// Campaigns in `Active` status for the given organization, or across
    /// all organizations if `org_id` is `None`.
    async fn list_active(&self, org_id: Option<Uuid>) -> VoxResult<Vec<Campaign>>;
}

#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> VoxResult<Contact>;
    async fn save(&self, contact: Contact) -> VoxResult<()>;
    async fn list_pending(&self, campaign_id: Uuid, limit: usize) -> VoxResult<Vec<Contact>>;
}

/// Dial attempts pending dispatch, including retry children.
/// `claim_queued_runs_for_processing` mirrors `SELECT ... FOR UPDATE SKIP
/// LOCKED` in two passes: due retries first (ordered by `scheduled_for`),
/// then unscheduled fresh attempts (ordered by `created_at`) filling
/// whatever slots remain. Two concurrent callers never receive the same
/// run, and a run already claimed by someone else is silently skipped
/// rather than blocking the caller.
#[async_trait]
pub trait QueuedRunRepository: Send + Sync {
    async fn enqueue(&self, run: QueuedRun) -> VoxResult<()>;
    async fn claim_queued_runs_for_processing(&self, campaign_id: Uuid, scheduled_before: DateTime<Utc>, limit: usize) -> VoxResult<Vec<QueuedRun>>;
    async fn update(&self, run: QueuedRun) -> VoxResult<()>;
    async fn get(&self, id: Uuid) -> VoxResult<QueuedRun>;
    /// Every queued run ever created for `campaign_id`, claimed or not.
    async fn list_by_campaign(&self, campaign_id: Uuid) -> VoxResult<Vec<QueuedRun>>;
}

/// The call record produced once a [`QueuedRun`] is claimed and dispatched.
#[async_trait]
pub trait WorkflowRunRepository: Send + Sync {
    async fn enqueue(&self, run: WorkflowRun) -> VoxResult<()>;
    async fn update(&self, run: WorkflowRun) -> VoxResult<()>;
    async fn get(&self, id: Uuid) -> VoxResult<WorkflowRun>;
    /// Every run ever enqueued for `campaign_id`. Used for campaign status
    /// reporting, not the dispatch path.
    async fn list_by_campaign(&self, campaign_id: Uuid) -> VoxResult<Vec<WorkflowRun>>;
}
