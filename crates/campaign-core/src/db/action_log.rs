//! Append-only storage for the optimization action log.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::types::{ActionLogEntry, ActionLogFilter, NewActionLogEntry};
use crate::Result;

use super::decode_error;

#[derive(Debug, sqlx::FromRow)]
struct ActionLogRow {
    id: i64,
    campaign_id: Uuid,
    variant_id: Option<Uuid>,
    action_type: String,
    details: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl ActionLogRow {
    fn into_entry(self) -> Result<ActionLogEntry> {
        Ok(ActionLogEntry {
            id: self.id,
            campaign_id: self.campaign_id,
            variant_id: self.variant_id,
            action_type: self.action_type.parse().map_err(decode_error)?,
            details: self.details.unwrap_or(serde_json::Value::Null),
            created_at: self.created_at,
        })
    }
}

/// Repository for audit entries.
pub struct ActionLogRepository {
    pool: PgPool,
}

impl ActionLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Query entries, newest first.
    pub async fn query(&self, filter: &ActionLogFilter) -> Result<Vec<ActionLogEntry>> {
        let rows: Vec<ActionLogRow> = sqlx::query_as(
            r#"
            SELECT id, campaign_id, variant_id, action_type, details, created_at
            FROM optimization_action_log
            WHERE ($1::uuid IS NULL OR campaign_id = $1)
              AND ($2::uuid IS NULL OR variant_id = $2)
              AND ($3::text IS NULL OR action_type = $3)
              AND ($4::timestamptz IS NULL OR created_at >= $4)
            ORDER BY created_at DESC, id DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filter.campaign_id)
        .bind(filter.variant_id)
        .bind(filter.action_type.map(|a| a.as_str()))
        .bind(filter.since)
        .bind(i64::from(filter.limit.unwrap_or(100)))
        .bind(i64::from(filter.offset.unwrap_or(0)))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ActionLogRow::into_entry).collect()
    }
}

/// Append one entry and return its ID.
pub(crate) async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    entry: &NewActionLogEntry,
) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO optimization_action_log (campaign_id, variant_id, action_type, details, created_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(entry.campaign_id)
    .bind(entry.variant_id)
    .bind(entry.action_type.as_str())
    .bind(&entry.details)
    .bind(entry.created_at)
    .fetch_one(executor)
    .await?;

    Ok(row.0)
}
