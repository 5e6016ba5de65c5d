//! Action log query handler.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use campaign_core::types::{ActionLogEntry, ActionLogFilter, ActionType};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct ActionsQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub action_type: Option<String>,
    pub variant_id: Option<Uuid>,
    pub since: Option<DateTime<Utc>>,
}

impl ActionsQuery {
    fn into_filter(self, campaign_id: Uuid) -> ApiResult<ActionLogFilter> {
        let mut filter = ActionLogFilter::new()
            .campaign(campaign_id)
            .limit(self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT))
            .offset(self.offset.unwrap_or(0));

        if let Some(raw) = self.action_type {
            let action: ActionType = raw.parse().map_err(ApiError::BadRequest)?;
            filter = filter.action(action);
        }
        if let Some(variant_id) = self.variant_id {
            filter = filter.variant(variant_id);
        }
        if let Some(since) = self.since {
            filter = filter.since(since);
        }
        Ok(filter)
    }
}

/// Audit entries for a campaign, newest first.
pub async fn list_campaign_actions(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
    query: Result<Query<ActionsQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<ActionLogEntry>>> {
    let Query(query) = query?;
    let filter = query.into_filter(campaign_id)?;
    let entries = state.store.query_action_log(&filter).await?;
    Ok(Json(entries))
}
