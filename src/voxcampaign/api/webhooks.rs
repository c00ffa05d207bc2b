//! Inbound telephony provider status callbacks.
//!
//! Providers are configured to call back to
//! `/webhooks/telephony/:workflow_run_id` with their own status payload
//! shape; the raw JSON is appended to the run's `telephony_status_callbacks`
//! log verbatim; `campaign_routes::get_campaign_progress` derives failure
//! counts from exactly this log, so no provider-specific parsing happens
//! here — that's [`crate::telephony::TelephonyProvider::parse_status_callback`]'s
//! job, run by whatever drives the call, not by this route.
//!
//! The callback's terminal status also feeds the campaign's circuit
//! breaker: a run landing in [`crate::campaign::runner::FAILED_CALL_STATUSES`]
//! counts as a failure, anything else as a success.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use tracing::error;
use uuid::Uuid;

use crate::api::error_response::ApiError;
use crate::api::ApiState;
use crate::campaign::runner::FAILED_CALL_STATUSES;
use crate::repository::{CampaignRepository, ContactRepository, QueuedRunRepository, WorkflowRunRepository};

pub fn router<C, T, Q, W>(state: ApiState<C, T, Q, W>) -> Router
where
    C: CampaignRepository + Clone + 'static,
    T: ContactRepository + Clone + 'static,
    Q: QueuedRunRepository + Clone + 'static,
    W: WorkflowRunRepository + Clone + 'static,
{
    Router::new()
        .route("/webhooks/telephony/:workflow_run_id", post(telephony_status_callback::<C, T, Q, W>))
        .with_state(state)
}

async fn telephony_status_callback<C, T, Q, W>(
    State(state): State<ApiState<C, T, Q, W>>,
    Path(workflow_run_id): Path<Uuid>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse
where
    C: CampaignRepository + Clone + 'static,
    T: ContactRepository + Clone + 'static,
    Q: QueuedRunRepository + Clone + 'static,
    W: WorkflowRunRepository + Clone + 'static,
{
    let mut run = match state.scheduler.workflow_run(workflow_run_id).await {
        Ok(run) => run,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let status = payload.get("status").and_then(|s| s.as_str()).map(|s| s.to_lowercase());
    run.append_telephony_callback(payload);
    let campaign_id = run.campaign_id;

    if let Err(e) = state.scheduler.save_workflow_run(run).await {
        return ApiError::from(e).into_response();
    }

    if let (Some(campaign_id), Some(status)) = (campaign_id, status) {
        let is_failure = FAILED_CALL_STATUSES.contains(&status.as_str());
        if let Err(e) = state.scheduler.record_call_outcome(campaign_id, is_failure, state.breaker_config).await {
            error!(campaign_id = %campaign_id, error = %e, "failed to record circuit breaker outcome for telephony callback");
        }
    }

    StatusCode::NO_CONTENT.into_response()
}
