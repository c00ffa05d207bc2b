//! `/campaigns/*` lifecycle and status routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::error_response::ApiError;
use crate::api::ApiState;
use crate::repository::{CampaignRepository, ContactRepository, QueuedRunRepository, WorkflowRunRepository};

pub fn router<C, T, Q, W>(state: ApiState<C, T, Q, W>) -> Router
where
    C: CampaignRepository + Clone + 'static,
    T: ContactRepository + Clone + 'static,
    Q: QueuedRunRepository + Clone + 'static,
    W: WorkflowRunRepository + Clone + 'static,
{
    Router::new()
        .route("/campaigns/:campaign_id", get(get_campaign::<C, T, Q, W>))
        .route("/campaigns/:campaign_id/start", post(start_campaign::<C, T, Q, W>))
        .route("/campaigns/:campaign_id/pause", post(pause_campaign::<C, T, Q, W>))
        .route("/campaigns/:campaign_id/resume", post(resume_campaign::<C, T, Q, W>))
        .route("/campaigns/:campaign_id/progress", get(get_campaign_progress::<C, T, Q, W>))
        .with_state(state)
}

async fn get_campaign<C, T, Q, W>(State(state): State<ApiState<C, T, Q, W>>, Path(campaign_id): Path<Uuid>) -> impl IntoResponse
where
    C: CampaignRepository + Clone + 'static,
    T: ContactRepository + Clone + 'static,
    Q: QueuedRunRepository + Clone + 'static,
    W: WorkflowRunRepository + Clone + 'static,
{
    match state.runner.get_campaign(campaign_id).await {
        Ok(campaign) => (StatusCode::OK, Json(serde_json::to_value(campaign).unwrap())).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn start_campaign<C, T, Q, W>(State(state): State<ApiState<C, T, Q, W>>, Path(campaign_id): Path<Uuid>) -> impl IntoResponse
where
    C: CampaignRepository + Clone + 'static,
    T: ContactRepository + Clone + 'static,
    Q: QueuedRunRepository + Clone + 'static,
    W: WorkflowRunRepository + Clone + 'static,
{
    match state.runner.start_campaign(campaign_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn pause_campaign<C, T, Q, W>(State(state): State<ApiState<C, T, Q, W>>, Path(campaign_id): Path<Uuid>) -> impl IntoResponse
where
    C: CampaignRepository + Clone + 'static,
    T: ContactRepository + Clone + 'static,
    Q: QueuedRunRepository + Clone + 'static,
    W: WorkflowRunRepository + Clone + 'static,
{
    match state.runner.pause_campaign(campaign_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn resume_campaign<C, T, Q, W>(State(state): State<ApiState<C, T, Q, W>>, Path(campaign_id): Path<Uuid>) -> impl IntoResponse
where
    C: CampaignRepository + Clone + 'static,
    T: ContactRepository + Clone + 'static,
    Q: QueuedRunRepository + Clone + 'static,
    W: WorkflowRunRepository + Clone + 'static,
{
    match state.runner.resume_campaign(campaign_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn get_campaign_progress<C, T, Q, W>(State(state): State<ApiState<C, T, Q, W>>, Path(campaign_id): Path<Uuid>) -> impl IntoResponse
where
    C: CampaignRepository + Clone + 'static,
    T: ContactRepository + Clone + 'static,
    Q: QueuedRunRepository + Clone + 'static,
    W: WorkflowRunRepository + Clone + 'static,
{
    match state.runner.get_campaign_status(campaign_id).await {
        Ok(report) => (StatusCode::OK, Json(serde_json::to_value(report).unwrap())).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::{BatchScheduler, CampaignRunnerService, CircuitBreaker, CircuitBreakerConfig};
    use crate::model::{Campaign, CampaignStatus, RetryConfig, SourceSyncStatus};
    use crate::repository::memory::{InMemoryCampaignRepository, InMemoryContactRepository, InMemoryQueuedRunRepository, InMemoryWorkflowRunRepository};
    use axum::body::Body;
    use axum::http::Request;
    use bus::EventBus;
    use chrono::Utc;
    use tower::ServiceExt;

    fn draft_campaign() -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            name: "api test".into(),
            workflow_id: Uuid::new_v4(),
            status: CampaignStatus::Draft,
            schedule_windows: vec![],
            rate_limit_per_second: None,
            max_concurrent_calls: 5,
            source_sync_status: SourceSyncStatus::NeverSynced,
            source_last_synced_at: None,
            source_sync_error: None,
            retry_config: RetryConfig::default(),
            failed_rows: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    type TestState = ApiState<InMemoryCampaignRepository, InMemoryContactRepository, InMemoryQueuedRunRepository, InMemoryWorkflowRunRepository>;

    async fn test_state() -> (TestState, Uuid) {
        let campaigns = InMemoryCampaignRepository::default();
        let contacts = InMemoryContactRepository::default();
        let queued_runs = InMemoryQueuedRunRepository::default();
        let workflow_runs = InMemoryWorkflowRunRepository::default();
        let c = draft_campaign();
        campaigns.save(c.clone()).await.unwrap();

        let breaker = CircuitBreaker::new();
        let runner = Arc::new(CampaignRunnerService::new(campaigns.clone(), workflow_runs.clone(), breaker.clone()));
        let scheduler = Arc::new(BatchScheduler::new(campaigns, contacts, queued_runs, workflow_runs, breaker, EventBus::default()));
        (ApiState { runner, scheduler, breaker_config: CircuitBreakerConfig::default() }, c.id)
    }

    #[tokio::test]
    async fn starting_a_draft_campaign_returns_no_content() {
        let (state, campaign_id) = test_state().await;
        let app = router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/campaigns/{campaign_id}/start"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn pausing_a_draft_campaign_returns_an_error_status() {
        let (state, campaign_id) = test_state().await;
        let app = router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/campaigns/{campaign_id}/pause"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn getting_an_unknown_campaign_returns_not_found() {
        let (state, _campaign_id) = test_state().await;
        let app = router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/campaigns/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
