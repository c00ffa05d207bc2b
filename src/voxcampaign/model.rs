//! Core data model shared across the repository, workflow, engine,
//! pipeline, and campaign modules.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A named window of time within a day, on a set of weekdays, during which a
/// campaign is permitted to dial. Times are evaluated in `timezone`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleWindow {
    pub days: Vec<Weekday>,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub timezone: chrono_tz::Tz,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Active,
    Paused,
    Completed,
    Cancelled,
}

/// How far a campaign's local copy of contacts has drifted from whatever
/// external source feeds it (a CRM export, a dialer list upload). Preserved
/// from the original deployment's database client, whose distillation into
/// the functional spec dropped these fields even though the sync job that
/// populates them is in scope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceSyncStatus {
    NeverSynced,
    Synced,
    Stale,
    Error,
}

/// How a campaign should handle a call that ends without a clean
/// completion — busy signal, no answer, voicemail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    pub enabled: bool,
    pub max_retries: u32,
    pub retry_delay_seconds: u32,
    pub retry_on_busy: bool,
    pub retry_on_no_answer: bool,
    pub retry_on_voicemail: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: 3,
            retry_delay_seconds: 300,
            retry_on_busy: true,
            retry_on_no_answer: true,
            retry_on_voicemail: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub workflow_id: Uuid,
    pub status: CampaignStatus,
    pub schedule_windows: Vec<ScheduleWindow>,
    pub rate_limit_per_second: Option<f64>,
    pub max_concurrent_calls: u32,
    pub source_sync_status: SourceSyncStatus,
    pub source_last_synced_at: Option<DateTime<Utc>>,
    pub source_sync_error: Option<String>,
    pub retry_config: RetryConfig,
    /// Contacts whose queued run exhausted its retry budget. Incremented by
    /// the orchestrator on `RetryNeeded` once `retry_count >= max_retries`,
    /// never decremented.
    pub failed_rows: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    Pending,
    Queued,
    Dialing,
    Completed,
    Failed,
    DoNotCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub phone_number: String,
    pub status: ContactStatus,
    pub attempts: u32,
    pub variables: HashMap<String, serde_json::Value>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowRunStatus {
    Initializing,
    InProgress,
    Completed,
    Failed,
    Transferred,
    Abandoned,
}

/// A single invocation of a workflow against one contact: one phone call
/// (or, for a load test, one simulated one).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub call_id: Option<Uuid>,
    pub status: WorkflowRunStatus,
    pub current_node_id: Option<String>,
    pub gathered_variables: HashMap<String, serde_json::Value>,
    /// Free-form structured logs keyed by concern; always includes
    /// `telephony_status_callbacks`, an array of raw provider webhook
    /// payloads received for this run's call leg, restored from the
    /// original's run logger (the distilled spec only mentions transcript
    /// and variable logs).
    pub logs: HashMap<String, serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    pub fn new(workflow_id: Uuid) -> Self {
        let mut logs = HashMap::new();
        logs.insert("telephony_status_callbacks".to_string(), serde_json::json!([]));
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            campaign_id: None,
            contact_id: None,
            call_id: None,
            status: WorkflowRunStatus::Initializing,
            current_node_id: None,
            gathered_variables: HashMap::new(),
            logs,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn append_telephony_callback(&mut self, payload: serde_json::Value) {
        let entry = self
            .logs
            .entry("telephony_status_callbacks".to_string())
            .or_insert_with(|| serde_json::json!([]));
        if let Some(arr) = entry.as_array_mut() {
            arr.push(payload);
        }
    }
}

/// A tenant: owns campaigns, workflows, and its own telephony configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub concurrent_call_limit: u32,
    /// Maps a call's terminal disposition — whatever the workflow's
    /// `call_disposition` variable held, or the reason `end_call_with_reason`
    /// was given when there was no such variable — onto the label shown in
    /// campaign reporting. A disposition with no entry passes through
    /// unchanged.
    pub disposition_mapping: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn map_disposition(&self, raw: &str) -> String {
        self.disposition_mapping.get(raw).cloned().unwrap_or_else(|| raw.to_string())
    }
}

/// An organization's telephony provider configuration: which provider to
/// place calls through, its credentials, and the caller-id pool to dial
/// from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyConfig {
    pub org_id: Uuid,
    pub provider: String,
    pub credentials: HashMap<String, String>,
    pub from_numbers: Vec<String>,
}

/// A workflow definition: the graph a [`crate::engine::CallEngine`] walks
/// for every call placed against campaigns that reference it. Deliberately
/// not wrapped in a separate versioned "definition" type — see
/// `DESIGN.md`'s Open Question decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub graph: crate::workflow::WorkflowGraph,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueuedRunState {
    Queued,
    Processing,
    Done,
    Failed,
}

/// Why a retry child [`QueuedRun`] was created.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetryReason {
    Busy,
    NoAnswer,
    Voicemail,
    Failed,
    Error,
}

/// A dial attempt waiting to be claimed and turned into a [`WorkflowRun`].
/// Distinct from `WorkflowRun`: a `QueuedRun` is the scheduling unit (one
/// per dial *attempt*, including retries), a `WorkflowRun` is the call
/// record produced once an attempt is claimed and dispatched. A contact
/// that no-answers and is retried twice has one `WorkflowRun` per attempt
/// but a `QueuedRun` retry chain linking them via `parent_queued_run_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedRun {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub contact_id: Uuid,
    pub workflow_run_id: Option<Uuid>,
    pub state: QueuedRunState,
    pub retry_count: u32,
    pub parent_queued_run_id: Option<Uuid>,
    /// `None` means "dispatch as soon as claimed"; `Some` means "not before
    /// this time" (a retry's backoff delay).
    pub scheduled_for: Option<DateTime<Utc>>,
    pub retry_reason: Option<RetryReason>,
    pub created_at: DateTime<Utc>,
}

impl QueuedRun {
    pub fn new(campaign_id: Uuid, contact_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            contact_id,
            workflow_run_id: None,
            state: QueuedRunState::Queued,
            retry_count: 0,
            parent_queued_run_id: None,
            scheduled_for: None,
            retry_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Build the next retry attempt in this run's chain, due `delay_seconds`
    /// from now.
    pub fn retry_child(&self, reason: RetryReason, delay_seconds: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id: self.campaign_id,
            contact_id: self.contact_id,
            workflow_run_id: None,
            state: QueuedRunState::Queued,
            retry_count: self.retry_count + 1,
            parent_queued_run_id: Some(self.id),
            scheduled_for: Some(Utc::now() + chrono::Duration::seconds(delay_seconds as i64)),
            retry_reason: Some(reason),
            created_at: Utc::now(),
        }
    }
}
