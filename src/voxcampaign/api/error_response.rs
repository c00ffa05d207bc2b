//! Maps [`VoxError`] onto HTTP status codes and a uniform JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::VoxError;

pub struct ApiError(VoxError);

impl From<VoxError> for ApiError {
    fn from(err: VoxError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            VoxError::CampaignNotFound(_)
            | VoxError::WorkflowNotFound(_)
            | VoxError::WorkflowRunNotFound(_)
            | VoxError::ContactNotFound(_)
            | VoxError::OrganizationNotFound(_)
            | VoxError::TelephonyConfigNotFound(_)
            | VoxError::QueuedRunNotFound(_) => StatusCode::NOT_FOUND,
            VoxError::CircuitBreakerOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            VoxError::Config(_) | VoxError::InvalidScheduleWindow(_) | VoxError::InvalidWorkflowGraph(_) | VoxError::UnknownNode(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}
