//! Database operations for variants.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::types::{NewVariant, Variant, VariantCopy, VariantStatus, VariantUpdate};
use crate::Result;

use super::decode_error;

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: Uuid,
    campaign_id: Uuid,
    creative_id: Uuid,
    status: String,
    budget_cents: i64,
    test_group: String,
    platform: String,
    targeting: Json<serde_json::Value>,
    metadata: Json<VariantCopy>,
    created_at: DateTime<Utc>,
}

impl VariantRow {
    fn into_variant(self) -> Result<Variant> {
        Ok(Variant {
            id: self.id,
            campaign_id: self.campaign_id,
            creative_id: self.creative_id,
            status: self.status.parse().map_err(decode_error)?,
            budget_cents: self.budget_cents,
            test_group: self.test_group,
            platform: self.platform,
            targeting: self.targeting.0,
            metadata: self.metadata.0,
            created_at: self.created_at,
        })
    }
}

/// Repository for variant rows.
pub struct VariantRepository {
    pool: PgPool,
}

impl VariantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All variants of a campaign, oldest first.
    pub async fn list_for_campaign(&self, campaign_id: Uuid) -> Result<Vec<Variant>> {
        let rows: Vec<VariantRow> = sqlx::query_as(
            r#"
            SELECT id, campaign_id, creative_id, status, budget_cents, test_group,
                   platform, targeting, metadata, created_at
            FROM variants
            WHERE campaign_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(VariantRow::into_variant).collect()
    }
}

/// Apply a guarded update. Returns `false` when the guard no longer holds.
pub(crate) async fn apply_update<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    update: VariantUpdate,
) -> Result<bool> {
    let result = match update {
        VariantUpdate::Pause => {
            sqlx::query(
                r#"
                UPDATE variants SET status = $2, updated_at = NOW()
                WHERE id = $1 AND status = $3
                "#,
            )
            .bind(id)
            .bind(VariantStatus::Paused.to_string())
            .bind(VariantStatus::Active.to_string())
            .execute(executor)
            .await?
        }
        VariantUpdate::SetBudget {
            from_cents,
            to_cents,
        } => {
            sqlx::query(
                r#"
                UPDATE variants SET budget_cents = $2, updated_at = NOW()
                WHERE id = $1 AND budget_cents = $3
                "#,
            )
            .bind(id)
            .bind(to_cents)
            .bind(from_cents)
            .execute(executor)
            .await?
        }
    };

    Ok(result.rows_affected() > 0)
}

/// Insert a new variant and return the stored row.
pub(crate) async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    variant: &NewVariant,
) -> Result<Variant> {
    let row: VariantRow = sqlx::query_as(
        r#"
        INSERT INTO variants (
            id, campaign_id, creative_id, status, budget_cents,
            test_group, platform, targeting, metadata
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, campaign_id, creative_id, status, budget_cents, test_group,
                  platform, targeting, metadata, created_at
        "#,
    )
    .bind(variant.id)
    .bind(variant.campaign_id)
    .bind(variant.creative_id)
    .bind(variant.status.to_string())
    .bind(variant.budget_cents)
    .bind(&variant.test_group)
    .bind(&variant.platform)
    .bind(Json(&variant.targeting))
    .bind(Json(&variant.metadata))
    .fetch_one(executor)
    .await?;

    row.into_variant()
}
