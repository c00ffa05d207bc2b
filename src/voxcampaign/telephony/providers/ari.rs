//! Asterisk ARI implementation of [`TelephonyProvider`].
//!
//! ARI calls are originated by creating a channel that enters a Stasis
//! application; there is no webhook delivery the way Twilio has one — call
//! lifecycle events arrive over the ARI WebSocket, handled separately by
//! [`crate::stasis`]. `initiate_call`'s `webhook_url` argument is unused for
//! this provider and kept only so it can implement the same trait.

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{VoxError, VoxResult};
use crate::telephony::{http_pool, CallInitiationResult, CallStatus, TelephonyProvider};

#[derive(Debug, Clone)]
pub struct AriConfig {
    pub ari_endpoint: String,
    pub app_name: String,
    pub app_password: String,
}

pub struct AriProvider {
    config: AriConfig,
    base_url: String,
}

impl AriProvider {
    pub fn new(config: AriConfig) -> Self {
        let base_url = format!("{}/ari", config.ari_endpoint.trim_end_matches('/'));
        Self { config, base_url }
    }

    fn sip_endpoint(to_number: &str) -> String {
        if to_number.starts_with("SIP/") || to_number.starts_with("PJSIP/") {
            to_number.to_string()
        } else {
            format!("PJSIP/{to_number}")
        }
    }
}

#[derive(Deserialize)]
struct AriChannel {
    id: String,
    #[serde(default)]
    state: Option<String>,
}

#[async_trait]
impl TelephonyProvider for AriProvider {
    fn name(&self) -> &'static str {
        "ari"
    }

    async fn initiate_call(
        &self,
        to_number: &str,
        _webhook_url: &str,
        workflow_run_id: Uuid,
        from_number: Option<&str>,
    ) -> VoxResult<CallInitiationResult> {
        let client = http_pool::get_or_create_client(&self.base_url);
        let endpoint = Self::sip_endpoint(to_number);
        let app_args = format!("workflow_run_id={workflow_run_id}");

        let mut query = vec![("endpoint", endpoint.as_str()), ("app", self.config.app_name.as_str()), ("appArgs", app_args.as_str())];
        if let Some(caller_id) = from_number {
            query.push(("callerId", caller_id));
        }

        let response = client
            .post(format!("{}/channels", self.base_url))
            .basic_auth(&self.config.app_name, Some(&self.config.app_password))
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoxError::TelephonyProvider(format!("ARI channel creation failed: {body}")));
        }

        let channel: AriChannel = response.json().await?;
        Ok(CallInitiationResult {
            provider_call_id: channel.id.clone(),
            status: channel.state.unwrap_or_else(|| "Down".into()),
            provider_metadata: serde_json::json!({ "channel_id": channel.id }),
        })
    }

    async fn get_call_status(&self, provider_call_id: &str) -> VoxResult<CallStatus> {
        let client = http_pool::get_or_create_client(&self.base_url);
        let response = client
            .get(format!("{}/channels/{provider_call_id}", self.base_url))
            .basic_auth(&self.config.app_name, Some(&self.config.app_password))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(VoxError::TelephonyProvider(format!("channel {provider_call_id} not found")));
        }
        let body: serde_json::Value = response.json().await?;
        self.parse_status_callback(&body)
    }

    async fn get_available_phone_numbers(&self) -> VoxResult<Vec<String>> {
        // ARI dials SIP endpoints directly rather than drawing from a pool
        // of owned numbers.
        Ok(Vec::new())
    }

    fn parse_status_callback(&self, payload: &serde_json::Value) -> VoxResult<CallStatus> {
        let provider_call_id = payload
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| VoxError::TelephonyProvider("ARI event missing channel id".into()))?
            .to_string();
        let status = payload.get("state").and_then(|v| v.as_str()).unwrap_or("Unknown").to_string();
        Ok(CallStatus { provider_call_id, status, duration_seconds: None })
    }

    fn supports_transfers(&self) -> bool {
        true
    }

    async fn transfer_call(&self, provider_call_id: &str, destination: &str, conference_name: &str) -> VoxResult<String> {
        // Move the channel into a mixing bridge alongside a newly originated
        // channel to the destination; the bridge id doubles as the
        // conference name so the caller and transfer target share audio.
        let client = http_pool::get_or_create_client(&self.base_url);
        let bridge_response = client
            .post(format!("{}/bridges", self.base_url))
            .basic_auth(&self.config.app_name, Some(&self.config.app_password))
            .query(&[("type", "mixing"), ("name", conference_name)])
            .send()
            .await?;
        if !bridge_response.status().is_success() {
            return Err(VoxError::TransferFailed(format!("failed to create transfer bridge for {provider_call_id}")));
        }

        let dest_channel = self.initiate_call(destination, "", Uuid::new_v4(), None).await?;

        let client = http_pool::get_or_create_client(&self.base_url);
        let add_response = client
            .post(format!("{}/bridges/{conference_name}/addChannel", self.base_url))
            .basic_auth(&self.config.app_name, Some(&self.config.app_password))
            .query(&[("channel", format!("{provider_call_id},{}", dest_channel.provider_call_id).as_str())])
            .send()
            .await?;
        if !add_response.status().is_success() {
            return Err(VoxError::TransferFailed(format!("failed to bridge {provider_call_id} into {conference_name}")));
        }

        Ok(dest_channel.provider_call_id)
    }
}
