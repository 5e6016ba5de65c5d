//! Shared application state.

use async_trait::async_trait;
use campaign_core::api::{CreativeTips, TipsGenerator, TipsRequest};
use campaign_core::CampaignStore;
use sqlx::PgPool;
use std::sync::Arc;

use crate::runner::JobRunner;

pub struct AppState {
    pub runner: Arc<JobRunner>,
    pub store: Arc<dyn CampaignStore>,
    /// Present when backed by Postgres; checked by `/ready`.
    pub pool: Option<PgPool>,
}

/// Stand-in when no tips service is configured. Every call fails, so
/// mutations are recorded as failed instead of silently skipped.
pub struct UnavailableTips {
    reason: String,
}

impl UnavailableTips {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl TipsGenerator for UnavailableTips {
    async fn generate_tips(&self, _request: &TipsRequest) -> campaign_core::Result<CreativeTips> {
        Err(campaign_core::Error::Tips {
            message: format!("tips service unavailable: {}", self.reason),
            status: None,
        })
    }
}
