//! API route definitions.

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::handlers::{actions, health, jobs};
use crate::state::AppState;

/// Create the router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness))
        .route("/api/v1/jobs/optimize", post(jobs::trigger_optimization))
        .route(
            "/api/v1/campaigns/{campaign_id}/actions",
            get(actions::list_campaign_actions),
        )
        .with_state(state)
}
