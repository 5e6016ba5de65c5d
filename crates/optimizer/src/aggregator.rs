//! Metrics aggregation over a lookback window.
//!
//! One batched store query per pass. Derived ratios are computed here so
//! every downstream stage sees the same numbers.

use campaign_core::types::{Cpa, RawMetricSums};
use campaign_core::CampaignStore;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;

/// Windowed performance of one variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantStats {
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub spend: Decimal,
    /// clicks / impressions, 0 when there are no impressions.
    pub ctr: f64,
    pub cpa: Cpa,
    /// conversions / clicks, 0 when there are no clicks.
    pub conversion_rate: f64,
}

impl VariantStats {
    pub fn from_sums(sums: &RawMetricSums) -> Self {
        Self {
            impressions: sums.impressions,
            clicks: sums.clicks,
            conversions: sums.conversions,
            spend: sums.spend,
            ctr: ratio(sums.clicks, sums.impressions),
            cpa: Cpa::from_totals(sums.spend, sums.conversions),
            conversion_rate: ratio(sums.conversions, sums.clicks),
        }
    }

    /// Stats for a variant with no samples in the window.
    pub fn empty() -> Self {
        Self::from_sums(&RawMetricSums::default())
    }
}

fn ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Stats for every requested variant within one window.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub since: DateTime<Utc>,
    sums: HashMap<Uuid, RawMetricSums>,
    stats: HashMap<Uuid, VariantStats>,
}

impl MetricsSnapshot {
    pub fn from_sums(since: DateTime<Utc>, sums: HashMap<Uuid, RawMetricSums>) -> Self {
        let stats = sums
            .iter()
            .map(|(id, s)| (*id, VariantStats::from_sums(s)))
            .collect();
        Self { since, sums, stats }
    }

    /// Stats for a variant; the zero record when it had no samples.
    pub fn get(&self, variant_id: Uuid) -> VariantStats {
        self.stats
            .get(&variant_id)
            .copied()
            .unwrap_or_else(VariantStats::empty)
    }

    /// Raw counters summed across the given variants.
    pub fn totals<'a>(&self, variant_ids: impl IntoIterator<Item = &'a Uuid>) -> RawMetricSums {
        let mut totals = RawMetricSums::default();
        for id in variant_ids {
            if let Some(sums) = self.sums.get(id) {
                totals.accumulate(sums);
            }
        }
        totals
    }

    /// Campaign CPA over the given variants: total spend / total conversions.
    pub fn campaign_cpa<'a>(&self, variant_ids: impl IntoIterator<Item = &'a Uuid>) -> Cpa {
        let totals = self.totals(variant_ids);
        Cpa::from_totals(totals.spend, totals.conversions)
    }
}

/// Fetch windowed stats for `variant_ids` in a single store query.
pub async fn aggregate(
    store: &dyn CampaignStore,
    variant_ids: &[Uuid],
    since: DateTime<Utc>,
) -> Result<MetricsSnapshot> {
    if variant_ids.is_empty() {
        return Ok(MetricsSnapshot::from_sums(since, HashMap::new()));
    }

    let sums = store.sum_metrics_by_variant(variant_ids, since).await?;
    debug!(
        variants = variant_ids.len(),
        with_samples = sums.len(),
        since = %since,
        "Aggregated variant metrics"
    );

    Ok(MetricsSnapshot::from_sums(since, sums))
}
