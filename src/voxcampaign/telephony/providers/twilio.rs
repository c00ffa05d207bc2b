//! Twilio implementation of [`TelephonyProvider`]: outbound calls go through
//! the REST `Calls` resource, with status updates delivered to a
//! `StatusCallback` URL we register at call time.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{VoxError, VoxResult};
use crate::telephony::{http_pool, CallInitiationResult, CallStatus, TelephonyProvider};

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_numbers: Vec<String>,
}

pub struct TwilioProvider {
    config: TwilioConfig,
    base_url: String,
}

impl TwilioProvider {
    pub fn new(config: TwilioConfig) -> Self {
        let base_url = format!("https://api.twilio.com/2010-04-01/Accounts/{}", config.account_sid);
        Self { config, base_url }
    }

    fn pick_from_number(&self, requested: Option<&str>) -> VoxResult<String> {
        if let Some(n) = requested {
            return Ok(n.to_string());
        }
        self.config
            .from_numbers
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| VoxError::Config("twilio provider has no from_numbers configured".into()))
    }
}

#[derive(Deserialize)]
struct TwilioCallResponse {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

#[async_trait]
impl TelephonyProvider for TwilioProvider {
    fn name(&self) -> &'static str {
        "twilio"
    }

    async fn initiate_call(
        &self,
        to_number: &str,
        webhook_url: &str,
        workflow_run_id: Uuid,
        from_number: Option<&str>,
    ) -> VoxResult<CallInitiationResult> {
        let from = self.pick_from_number(from_number)?;
        let client = http_pool::get_or_create_client(&self.base_url);

        let callback_url = format!("{webhook_url}/status-callback/{workflow_run_id}");
        let form = [
            ("To", to_number),
            ("From", from.as_str()),
            ("Url", webhook_url),
            ("StatusCallback", callback_url.as_str()),
            ("StatusCallbackMethod", "POST"),
        ];

        let response = client
            .post(format!("{}/Calls.json", self.base_url))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoxError::TelephonyProvider(format!("twilio call creation failed: {body}")));
        }

        let parsed: TwilioCallResponse = response.json().await?;
        Ok(CallInitiationResult {
            provider_call_id: parsed.sid.clone(),
            status: parsed.status.unwrap_or_else(|| "queued".into()),
            provider_metadata: serde_json::json!({ "call_sid": parsed.sid }),
        })
    }

    async fn get_call_status(&self, provider_call_id: &str) -> VoxResult<CallStatus> {
        let client = http_pool::get_or_create_client(&self.base_url);
        let response = client
            .get(format!("{}/Calls/{provider_call_id}.json", self.base_url))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(VoxError::TelephonyProvider(format!("failed to fetch call status for {provider_call_id}")));
        }
        let body: serde_json::Value = response.json().await?;
        self.parse_status_callback(&body)
    }

    async fn get_available_phone_numbers(&self) -> VoxResult<Vec<String>> {
        Ok(self.config.from_numbers.clone())
    }

    fn parse_status_callback(&self, payload: &serde_json::Value) -> VoxResult<CallStatus> {
        let provider_call_id = payload
            .get("CallSid")
            .or_else(|| payload.get("sid"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| VoxError::TelephonyProvider("status callback missing CallSid".into()))?
            .to_string();
        let status = payload
            .get("CallStatus")
            .or_else(|| payload.get("status"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let duration_seconds = payload.get("CallDuration").and_then(|v| v.as_str()).and_then(|s| s.parse().ok());
        Ok(CallStatus { provider_call_id, status, duration_seconds })
    }

    fn supports_transfers(&self) -> bool {
        true
    }

    async fn transfer_call(&self, provider_call_id: &str, destination: &str, conference_name: &str) -> VoxResult<String> {
        // Twilio transfers are implemented by redirecting the live call's
        // TwiML to dial the destination into a named conference; the actual
        // TwiML generation lives with the call's webhook handler, so here we
        // only issue the redirect.
        let client = http_pool::get_or_create_client(&self.base_url);
        let twiml_url = format!("/twiml/conference-transfer?destination={destination}&conference={conference_name}");
        let response = client
            .post(format!("{}/Calls/{provider_call_id}.json", self.base_url))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("Url", twiml_url.as_str()), ("Method", "POST")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(VoxError::TransferFailed(format!("twilio redirect failed for call {provider_call_id}")));
        }
        Ok(provider_call_id.to_string())
    }
}
