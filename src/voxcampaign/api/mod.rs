//! Campaign HTTP API, gated behind the `server` feature.
//!
//! A thin axum router over the same [`crate::campaign`] services used
//! in-process, mirroring the bus crate's own optional HTTP surface: the
//! router owns clones of its repositories and services, so requests made
//! over HTTP observe exactly the same state as anything driving the
//! campaign logic directly.
//!
//! Authentication/authorization and organization CRUD are out of scope
//! here; routes accept an already-resolved [`OrgContext`] extracted from a
//! request extension, which a real deployment would populate from its own
//! auth middleware upstream of this router.

pub mod campaign_routes;
pub mod error_response;
pub mod webhooks;

use axum::Router;
use uuid::Uuid;

use crate::campaign::{BatchScheduler, CampaignRunnerService, CircuitBreakerConfig};
use crate::repository::{CampaignRepository, ContactRepository, QueuedRunRepository, WorkflowRunRepository};

/// The authenticated caller's organization, resolved upstream of this
/// router. A real deployment replaces this with its own extractor backed
/// by session/JWT validation.
#[derive(Debug, Clone, Copy)]
pub struct OrgContext {
    pub org_id: Uuid,
}

#[derive(Clone)]
pub struct ApiState<C, T, Q, W> {
    pub runner: std::sync::Arc<CampaignRunnerService<C, W>>,
    pub scheduler: std::sync::Arc<BatchScheduler<C, T, Q, W>>,
    pub breaker_config: CircuitBreakerConfig,
}

pub fn router<C, T, Q, W>(state: ApiState<C, T, Q, W>) -> Router
where
    C: CampaignRepository + Clone + 'static,
    T: ContactRepository + Clone + 'static,
    Q: QueuedRunRepository + Clone + 'static,
    W: WorkflowRunRepository + Clone + 'static,
{
    Router::new().merge(campaign_routes::router(state.clone())).merge(webhooks::router(state))
}
