//! Crate-wide error taxonomy.
//!
//! Each layer gets its own variant family so a caller several levels up
//! (say, the campaign HTTP API) can match on the kind of failure without
//! needing to know which internal module produced it.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum VoxError {
    #[error("campaign {0} not found")]
    CampaignNotFound(Uuid),

    #[error("workflow {0} not found")]
    WorkflowNotFound(Uuid),

    #[error("workflow run {0} not found")]
    WorkflowRunNotFound(Uuid),

    #[error("contact {0} not found")]
    ContactNotFound(Uuid),

    #[error("invalid schedule window: {0}")]
    InvalidScheduleWindow(String),

    #[error("circuit breaker open for organization {org_id}, retry after {retry_after_seconds}s")]
    CircuitBreakerOpen { org_id: Uuid, retry_after_seconds: u64 },

    #[error("workflow graph invalid: {0}")]
    InvalidWorkflowGraph(String),

    #[error("unknown node {0} referenced by workflow graph")]
    UnknownNode(String),

    #[error("telephony provider error: {0}")]
    TelephonyProvider(String),

    #[error("no provider configured for call {0}")]
    NoProviderConfigured(Uuid),

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("tool '{0}' is not registered")]
    UnknownTool(String),

    #[error("tool '{0}' failed: {1}")]
    ToolFailed(String, String),

    #[error("pipeline stage error: {0}")]
    PipelineStage(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),

    #[error("bus error: {0}")]
    Bus(#[from] bus::BusError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("organization {0} not found")]
    OrganizationNotFound(Uuid),

    #[error("telephony config for organization {0} not found")]
    TelephonyConfigNotFound(Uuid),

    #[error("queued run {0} not found")]
    QueuedRunNotFound(Uuid),

    #[error("object '{0}' not found in storage")]
    ObjectNotFound(String),
}

pub type VoxResult<T> = Result<T, VoxError>;
