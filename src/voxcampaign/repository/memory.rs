//! In-memory reference implementations of the repository traits, used by
//! the test suite and by the load-test harness (which has no durable
//! storage of its own).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{VoxError, VoxResult};
use crate::model::{
    Campaign, CampaignStatus, Contact, ContactStatus, Organization, QueuedRun, QueuedRunState, TelephonyConfig, Workflow, WorkflowRun,
};

use super::{CampaignRepository, ContactRepository, OrganizationRepository, QueuedRunRepository, TelephonyConfigRepository, WorkflowRepository, WorkflowRunRepository};

#[derive(Default, Clone)]
pub struct InMemoryOrganizationRepository {
    orgs: Arc<RwLock<Vec<Organization>>>,
}

#[async_trait]
impl OrganizationRepository for InMemoryOrganizationRepository {
    async fn get(&self, id: Uuid) -> VoxResult<Organization> {
        self.orgs.read().await.iter().find(|o| o.id == id).cloned().ok_or(VoxError::OrganizationNotFound(id))
    }

    async fn save(&self, org: Organization) -> VoxResult<()> {
        let mut orgs = self.orgs.write().await;
        if let Some(existing) = orgs.iter_mut().find(|o| o.id == org.id) {
            *existing = org;
        } else {
            orgs.push(org);
        }
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryWorkflowRepository {
    workflows: Arc<RwLock<Vec<Workflow>>>,
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn get(&self, id: Uuid) -> VoxResult<Workflow> {
        self.workflows.read().await.iter().find(|w| w.id == id).cloned().ok_or(VoxError::WorkflowNotFound(id))
    }

    async fn save(&self, workflow: Workflow) -> VoxResult<()> {
        let mut workflows = self.workflows.write().await;
        if let Some(existing) = workflows.iter_mut().find(|w| w.id == workflow.id) {
            *existing = workflow;
        } else {
            workflows.push(workflow);
        }
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryTelephonyConfigRepository {
    configs: Arc<RwLock<Vec<TelephonyConfig>>>,
}

#[async_trait]
impl TelephonyConfigRepository for InMemoryTelephonyConfigRepository {
    async fn get(&self, org_id: Uuid) -> VoxResult<TelephonyConfig> {
        self.configs
            .read()
            .await
            .iter()
            .find(|c| c.org_id == org_id)
            .cloned()
            .ok_or(VoxError::TelephonyConfigNotFound(org_id))
    }

    async fn save(&self, config: TelephonyConfig) -> VoxResult<()> {
        let mut configs = self.configs.write().await;
        if let Some(existing) = configs.iter_mut().find(|c| c.org_id == config.org_id) {
            *existing = config;
        } else {
            configs.push(config);
        }
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryCampaignRepository {
    campaigns: Arc<RwLock<Vec<Campaign>>>,
}

#[async_trait]
impl CampaignRepository for InMemoryCampaignRepository {
    async fn get(&self, id: Uuid) -> VoxResult<Campaign> {
        self.campaigns
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(VoxError::CampaignNotFound(id))
    }

    async fn save(&self, campaign: Campaign) -> VoxResult<()> {
        let mut campaigns = self.campaigns.write().await;
        if let Some(existing) = campaigns.iter_mut().find(|c| c.id == campaign.id) {
            *existing = campaign;
        } else {
            campaigns.push(campaign);
        }
        Ok(())
    }

    async fn list_active(&self, org_id: Option<Uuid>) -> VoxResult<Vec<Campaign>> {
        Ok(self
            .campaigns
            .read()
            .await
            .iter()
            .filter(|c| c.status == CampaignStatus::Active)
            .filter(|c| org_id.map(|id| id == c.org_id).unwrap_or(true))
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryContactRepository {
    contacts: Arc<RwLock<Vec<Contact>>>,
}

#[async_trait]
impl ContactRepository for InMemoryContactRepository {
    async fn get(&self, id: Uuid) -> VoxResult<Contact> {
        self.contacts
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(VoxError::ContactNotFound(id))
    }

    async fn save(&self, contact: Contact) -> VoxResult<()> {
        let mut contacts = self.contacts.write().await;
        if let Some(existing) = contacts.iter_mut().find(|c| c.id == contact.id) {
            *existing = contact;
        } else {
            contacts.push(contact);
        }
        Ok(())
    }

    async fn list_pending(&self, campaign_id: Uuid, limit: usize) -> VoxResult<Vec<Contact>> {
        Ok(self
            .contacts
            .read()
            .await
            .iter()
            .filter(|c| c.campaign_id == campaign_id && c.status == ContactStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryQueuedRunRepository {
    runs: Arc<RwLock<Vec<QueuedRun>>>,
}

#[async_trait]
impl QueuedRunRepository for InMemoryQueuedRunRepository {
    async fn enqueue(&self, run: QueuedRun) -> VoxResult<()> {
        self.runs.write().await.push(run);
        Ok(())
    }

    /// Due retries first (ordered by `scheduled_for`), then unscheduled
    /// fresh attempts (ordered by `created_at`) filling whatever slots
    /// remain, mirroring a two-pass row-locked claim.
    async fn claim_queued_runs_for_processing(&self, campaign_id: Uuid, scheduled_before: DateTime<Utc>, limit: usize) -> VoxResult<Vec<QueuedRun>> {
        let mut runs = self.runs.write().await;

        let mut due_indices: Vec<usize> = runs
            .iter()
            .enumerate()
            .filter(|(_, r)| r.campaign_id == campaign_id && r.state == QueuedRunState::Queued && r.scheduled_for.map(|s| s <= scheduled_before).unwrap_or(false))
            .map(|(i, _)| i)
            .collect();
        due_indices.sort_by_key(|&i| runs[i].scheduled_for);

        let mut unscheduled_indices: Vec<usize> = runs
            .iter()
            .enumerate()
            .filter(|(_, r)| r.campaign_id == campaign_id && r.state == QueuedRunState::Queued && r.scheduled_for.is_none())
            .map(|(i, _)| i)
            .collect();
        unscheduled_indices.sort_by_key(|&i| runs[i].created_at);

        let mut claimed_indices = due_indices;
        claimed_indices.truncate(limit);
        if claimed_indices.len() < limit {
            let remaining = limit - claimed_indices.len();
            claimed_indices.extend(unscheduled_indices.into_iter().take(remaining));
        }

        let mut claimed = Vec::with_capacity(claimed_indices.len());
        for i in claimed_indices {
            runs[i].state = QueuedRunState::Processing;
            claimed.push(runs[i].clone());
        }
        Ok(claimed)
    }

    async fn update(&self, run: QueuedRun) -> VoxResult<()> {
        let mut runs = self.runs.write().await;
        if let Some(entry) = runs.iter_mut().find(|r| r.id == run.id) {
            *entry = run;
            Ok(())
        } else {
            Err(VoxError::QueuedRunNotFound(run.id))
        }
    }

    async fn get(&self, id: Uuid) -> VoxResult<QueuedRun> {
        self.runs.read().await.iter().find(|r| r.id == id).cloned().ok_or(VoxError::QueuedRunNotFound(id))
    }

    async fn list_by_campaign(&self, campaign_id: Uuid) -> VoxResult<Vec<QueuedRun>> {
        Ok(self.runs.read().await.iter().filter(|r| r.campaign_id == campaign_id).cloned().collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryWorkflowRunRepository {
    runs: Arc<RwLock<Vec<WorkflowRun>>>,
}

#[async_trait]
impl WorkflowRunRepository for InMemoryWorkflowRunRepository {
    async fn enqueue(&self, run: WorkflowRun) -> VoxResult<()> {
        self.runs.write().await.push(run);
        Ok(())
    }

    async fn update(&self, run: WorkflowRun) -> VoxResult<()> {
        let mut runs = self.runs.write().await;
        if let Some(entry) = runs.iter_mut().find(|r| r.id == run.id) {
            *entry = run;
            Ok(())
        } else {
            Err(VoxError::WorkflowRunNotFound(run.id))
        }
    }

    async fn get(&self, id: Uuid) -> VoxResult<WorkflowRun> {
        self.runs.read().await.iter().find(|r| r.id == id).cloned().ok_or(VoxError::WorkflowRunNotFound(id))
    }

    async fn list_by_campaign(&self, campaign_id: Uuid) -> VoxResult<Vec<WorkflowRun>> {
        Ok(self
            .runs
            .read()
            .await
            .iter()
            .filter(|r| r.campaign_id == Some(campaign_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn claim_never_returns_the_same_run_twice() {
        let repo = InMemoryQueuedRunRepository::default();
        let campaign_id = Uuid::new_v4();
        repo.enqueue(QueuedRun::new(campaign_id, Uuid::new_v4())).await.unwrap();
        let first = repo.claim_queued_runs_for_processing(campaign_id, Utc::now(), 10).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = repo.claim_queued_runs_for_processing(campaign_id, Utc::now(), 10).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn due_retries_are_claimed_before_unscheduled_fresh_attempts() {
        let repo = InMemoryQueuedRunRepository::default();
        let campaign_id = Uuid::new_v4();

        let mut fresh = QueuedRun::new(campaign_id, Uuid::new_v4());
        fresh.created_at = Utc::now() - Duration::seconds(10);
        repo.enqueue(fresh).await.unwrap();

        let mut retry = QueuedRun::new(campaign_id, Uuid::new_v4());
        retry.scheduled_for = Some(Utc::now() - Duration::seconds(1));
        let retry_id = retry.id;
        repo.enqueue(retry).await.unwrap();

        let claimed = repo.claim_queued_runs_for_processing(campaign_id, Utc::now(), 1).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, retry_id);
    }

    #[tokio::test]
    async fn a_retry_not_yet_due_is_not_claimed() {
        let repo = InMemoryQueuedRunRepository::default();
        let campaign_id = Uuid::new_v4();
        let mut retry = QueuedRun::new(campaign_id, Uuid::new_v4());
        retry.scheduled_for = Some(Utc::now() + Duration::seconds(300));
        repo.enqueue(retry).await.unwrap();

        let claimed = repo.claim_queued_runs_for_processing(campaign_id, Utc::now(), 10).await.unwrap();
        assert!(claimed.is_empty());
    }

    #[tokio::test]
    async fn contact_repository_filters_pending_by_campaign() {
        let repo = InMemoryContactRepository::default();
        let campaign_id = Uuid::new_v4();
        let mut contact = Contact {
            id: Uuid::new_v4(),
            campaign_id,
            phone_number: "+15551230000".into(),
            status: ContactStatus::Pending,
            attempts: 0,
            variables: Default::default(),
            last_attempt_at: None,
        };
        repo.save(contact.clone()).await.unwrap();
        contact.id = Uuid::new_v4();
        contact.status = ContactStatus::Completed;
        repo.save(contact).await.unwrap();

        let pending = repo.list_pending(campaign_id, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn organization_repository_round_trips() {
        let repo = InMemoryOrganizationRepository::default();
        let org = Organization {
            id: Uuid::new_v4(),
            name: "acme".into(),
            concurrent_call_limit: 20,
            disposition_mapping: Default::default(),
            created_at: Utc::now(),
        };
        repo.save(org.clone()).await.unwrap();
        assert_eq!(repo.get(org.id).await.unwrap().name, "acme");
    }
}
