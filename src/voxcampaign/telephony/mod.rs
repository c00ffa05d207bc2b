//! Abstracts the outbound calling surface over whichever telephony provider
//! is configured for an organization (Twilio, Asterisk ARI, ...), so the
//! campaign runner and pipeline never need a provider-specific branch.

pub mod http_pool;
pub mod providers;
pub mod transfer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VoxResult;

/// Standardized response from [`TelephonyProvider::initiate_call`] across
/// all providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallInitiationResult {
    /// The provider's own call identifier (a Twilio SID, an ARI channel id).
    pub provider_call_id: String,
    pub status: String,
    pub provider_metadata: serde_json::Value,
}

/// Standardized status-callback payload, after a provider's raw webhook or
/// event has been normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallStatus {
    pub provider_call_id: String,
    pub status: String,
    pub duration_seconds: Option<u64>,
}

#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Place an outbound call to `to_number`, with call events delivered to
    /// `webhook_url`.
    async fn initiate_call(
        &self,
        to_number: &str,
        webhook_url: &str,
        workflow_run_id: Uuid,
        from_number: Option<&str>,
    ) -> VoxResult<CallInitiationResult>;

    async fn get_call_status(&self, provider_call_id: &str) -> VoxResult<CallStatus>;

    async fn get_available_phone_numbers(&self) -> VoxResult<Vec<String>>;

    /// Parse a provider-specific status callback body into the normalized
    /// shape every caller can reason about.
    fn parse_status_callback(&self, payload: &serde_json::Value) -> VoxResult<CallStatus>;

    fn supports_transfers(&self) -> bool;

    /// Begin transferring the live call into a conference with
    /// `destination`. Providers that don't support transfers return
    /// `VoxError::TransferFailed`.
    async fn transfer_call(&self, provider_call_id: &str, destination: &str, conference_name: &str) -> VoxResult<String>;
}
