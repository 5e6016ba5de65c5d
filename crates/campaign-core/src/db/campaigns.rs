//! Database operations for campaigns and creatives.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::types::{Campaign, CampaignMetadata, CampaignSettings, CampaignUpdate, Creative};
use crate::Result;

use super::decode_error;

#[derive(Debug, sqlx::FromRow)]
struct CampaignRow {
    id: Uuid,
    owner_id: Option<Uuid>,
    name: String,
    status: String,
    auto_optimize: bool,
    started_at: Option<DateTime<Utc>>,
    settings: Json<CampaignSettings>,
    metadata: Json<CampaignMetadata>,
    version: i64,
    created_at: DateTime<Utc>,
}

impl CampaignRow {
    fn into_campaign(self) -> Result<Campaign> {
        Ok(Campaign {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            status: self.status.parse().map_err(decode_error)?,
            auto_optimize: self.auto_optimize,
            started_at: self.started_at,
            settings: self.settings.0,
            metadata: self.metadata.0,
            version: self.version,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CreativeRow {
    id: Uuid,
    campaign_id: Uuid,
    headline: Option<String>,
    caption: Option<String>,
    cta: Option<String>,
    transcript: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CreativeRow> for Creative {
    fn from(row: CreativeRow) -> Self {
        Self {
            id: row.id,
            campaign_id: row.campaign_id,
            headline: row.headline,
            caption: row.caption,
            cta: row.cta,
            transcript: row.transcript,
            created_at: row.created_at,
        }
    }
}

/// Repository for campaign rows.
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a campaign by ID.
    pub async fn get(&self, id: Uuid) -> Result<Option<Campaign>> {
        let row: Option<CampaignRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, name, status, auto_optimize, started_at,
                   settings, metadata, version, created_at
            FROM campaigns
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CampaignRow::into_campaign).transpose()
    }

    /// IDs of campaigns the control loop may act on, oldest first.
    pub async fn list_optimizable_ids(&self, owner_id: Option<Uuid>) -> Result<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id
            FROM campaigns
            WHERE status = 'active'
              AND auto_optimize = true
              AND ($1::uuid IS NULL OR owner_id = $1)
            ORDER BY created_at
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Get a creative by ID.
    pub async fn get_creative(&self, id: Uuid) -> Result<Option<Creative>> {
        let row: Option<CreativeRow> = sqlx::query_as(
            r#"
            SELECT id, campaign_id, headline, caption, cta, transcript, created_at
            FROM creatives
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Creative::from))
    }

    /// Most recently created creative for a campaign.
    pub async fn latest_creative(&self, campaign_id: Uuid) -> Result<Option<Creative>> {
        let row: Option<CreativeRow> = sqlx::query_as(
            r#"
            SELECT id, campaign_id, headline, caption, cta, transcript, created_at
            FROM creatives
            WHERE campaign_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Creative::from))
    }
}

/// Apply a versioned update. Returns `false` on a version mismatch.
pub(crate) async fn apply_update<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    update: &CampaignUpdate,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE campaigns SET
            status = COALESCE($3, status),
            metadata = COALESCE($4, metadata),
            version = version + 1,
            updated_at = NOW()
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(id)
    .bind(update.expected_version)
    .bind(update.status.map(|s| s.to_string()))
    .bind(update.metadata.as_ref().map(Json))
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
