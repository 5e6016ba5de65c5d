//! Read-only aggregation over ingested variant metrics.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::types::RawMetricSums;
use crate::Result;

#[derive(Debug, sqlx::FromRow)]
struct MetricSumRow {
    variant_id: Uuid,
    impressions: i64,
    clicks: i64,
    conversions: i64,
    spend: Decimal,
}

/// Repository for the `variant_metrics` view.
pub struct MetricsRepository {
    pool: PgPool,
}

impl MetricsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Sum counters per variant for samples dated on or after `since`.
    pub async fn sum_by_variant(
        &self,
        variant_ids: &[Uuid],
        since: DateTime<Utc>,
    ) -> Result<HashMap<Uuid, RawMetricSums>> {
        if variant_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<MetricSumRow> = sqlx::query_as(
            r#"
            SELECT variant_id,
                   COALESCE(SUM(impressions), 0)::BIGINT AS impressions,
                   COALESCE(SUM(clicks), 0)::BIGINT AS clicks,
                   COALESCE(SUM(conversions), 0)::BIGINT AS conversions,
                   COALESCE(SUM(spend), 0) AS spend
            FROM variant_metrics
            WHERE variant_id = ANY($1)
              AND date >= $2
            GROUP BY variant_id
            "#,
        )
        .bind(variant_ids)
        .bind(since.date_naive())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.variant_id,
                    RawMetricSums {
                        impressions: r.impressions,
                        clicks: r.clicks,
                        conversions: r.conversions,
                        spend: r.spend,
                    },
                )
            })
            .collect())
    }
}
