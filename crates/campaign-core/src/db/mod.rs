//! PostgreSQL store for the control loop.

pub mod action_log;
pub mod campaigns;
pub mod metrics;
pub mod variants;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::store::CampaignStore;
use crate::types::{
    ActionLogEntry, ActionLogFilter, Campaign, CampaignUpdate, Creative, NewActionLogEntry,
    NewVariant, RawMetricSums, Variant, VariantUpdate,
};
use crate::{Error, Result};

pub use action_log::ActionLogRepository;
pub use campaigns::CampaignRepository;
pub use metrics::MetricsRepository;
pub use variants::VariantRepository;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;

    Ok(pool)
}

/// Run database migrations from the migrations directory.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let migrator = sqlx::migrate::Migrator::new(Path::new("./migrations")).await?;
    migrator.run(pool).await?;
    Ok(())
}

fn decode_error(message: String) -> Error {
    Error::Database(sqlx::Error::Decode(message.into()))
}

/// `CampaignStore` backed by PostgreSQL.
///
/// Mutations run in one transaction together with their audit entry.
pub struct PgCampaignStore {
    pool: PgPool,
    campaigns: CampaignRepository,
    variants: VariantRepository,
    metrics: MetricsRepository,
    action_log: ActionLogRepository,
}

impl PgCampaignStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            campaigns: CampaignRepository::new(pool.clone()),
            variants: VariantRepository::new(pool.clone()),
            metrics: MetricsRepository::new(pool.clone()),
            action_log: ActionLogRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CampaignStore for PgCampaignStore {
    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>> {
        self.campaigns.get(id).await
    }

    async fn list_active_auto_optimize_campaign_ids(
        &self,
        owner_id: Option<Uuid>,
    ) -> Result<Vec<Uuid>> {
        self.campaigns.list_optimizable_ids(owner_id).await
    }

    async fn list_variants(&self, campaign_id: Uuid) -> Result<Vec<Variant>> {
        self.variants.list_for_campaign(campaign_id).await
    }

    async fn get_creative(&self, id: Uuid) -> Result<Option<Creative>> {
        self.campaigns.get_creative(id).await
    }

    async fn latest_creative(&self, campaign_id: Uuid) -> Result<Option<Creative>> {
        self.campaigns.latest_creative(campaign_id).await
    }

    async fn sum_metrics_by_variant(
        &self,
        variant_ids: &[Uuid],
        since: DateTime<Utc>,
    ) -> Result<HashMap<Uuid, RawMetricSums>> {
        self.metrics.sum_by_variant(variant_ids, since).await
    }

    async fn update_variant(
        &self,
        id: Uuid,
        update: VariantUpdate,
        entry: &NewActionLogEntry,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        if !variants::apply_update(&mut *tx, id, update).await? {
            tx.rollback().await?;
            debug!(variant_id = %id, update = ?update, "Variant guard no longer holds");
            return Ok(false);
        }
        action_log::insert(&mut *tx, entry).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn update_campaign(
        &self,
        id: Uuid,
        update: &CampaignUpdate,
        entry: &NewActionLogEntry,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        if !campaigns::apply_update(&mut *tx, id, update).await? {
            tx.rollback().await?;
            debug!(
                campaign_id = %id,
                expected_version = update.expected_version,
                "Campaign version changed since load"
            );
            return Ok(false);
        }
        action_log::insert(&mut *tx, entry).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn create_variant(
        &self,
        variant: &NewVariant,
        entry: &NewActionLogEntry,
    ) -> Result<Variant> {
        let mut tx = self.pool.begin().await?;

        let created = variants::insert(&mut *tx, variant).await?;
        action_log::insert(&mut *tx, entry).await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn append_action_log(&self, entry: &NewActionLogEntry) -> Result<i64> {
        action_log::insert(&self.pool, entry).await
    }

    async fn query_action_log(&self, filter: &ActionLogFilter) -> Result<Vec<ActionLogEntry>> {
        self.action_log.query(filter).await
    }
}
