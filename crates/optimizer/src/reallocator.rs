//! Budget reallocator: relative ranking of qualifying variants.
//!
//! Planning is pure so it can be benchmarked and tested without a store.

use campaign_core::types::{Variant, VariantStatus};
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use uuid::Uuid;

use crate::aggregator::{MetricsSnapshot, VariantStats};
use crate::config::Thresholds;

/// Per-pass growth step, as a ratio: 12 / 10 = +20%.
const BUDGET_STEP_NUMERATOR: i64 = 12;
const BUDGET_STEP_DENOMINATOR: i64 = 10;
/// Absolute ceiling relative to the pass-start budget.
const BUDGET_CEILING_MULTIPLIER: i64 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetIncrease {
    pub variant_id: Uuid,
    pub from_cents: i64,
    pub to_cents: i64,
    pub cap_cents: i64,
    pub stats: VariantStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelativePause {
    pub variant_id: Uuid,
    pub target_cpa: Decimal,
    pub stats: VariantStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReallocationPlan {
    pub budget_increase: Option<BudgetIncrease>,
    pub relative_pause: Option<RelativePause>,
}

impl ReallocationPlan {
    pub fn is_empty(&self) -> bool {
        self.budget_increase.is_none() && self.relative_pause.is_none()
    }
}

/// Round `value * numerator / denominator` half up, for non-negative values.
fn scale_half_up(value: i64, numerator: i64, denominator: i64) -> i64 {
    let scaled = (value as i128 * numerator as i128 * 2 + denominator as i128)
        / (denominator as i128 * 2);
    i64::try_from(scaled).unwrap_or(i64::MAX)
}

/// `(proposed, cap)` for a budget: +20% rounded half up, never above 2x.
pub fn proposed_budget(budget_cents: i64) -> (i64, i64) {
    let cap = budget_cents.saturating_mul(BUDGET_CEILING_MULTIPLIER);
    let stepped = scale_half_up(budget_cents, BUDGET_STEP_NUMERATOR, BUDGET_STEP_DENOMINATOR);
    (stepped.min(cap), cap)
}

/// Rank best first: conversions desc, then CTR desc. Ties keep input order.
pub fn rank<'a>(candidates: &mut [(&'a Variant, VariantStats)]) {
    candidates.sort_by(|(_, a), (_, b)| {
        b.conversions.cmp(&a.conversions).then_with(|| {
            b.ctr
                .partial_cmp(&a.ctr)
                .unwrap_or(Ordering::Equal)
        })
    });
}

/// Plan reallocation over active variants that meet the impression floor.
///
/// `variants` must reflect evaluator pauses already applied this pass.
pub fn plan(
    variants: &[Variant],
    snapshot: &MetricsSnapshot,
    thresholds: &Thresholds,
) -> ReallocationPlan {
    let mut candidates: Vec<(&Variant, VariantStats)> = variants
        .iter()
        .filter(|v| v.status == VariantStatus::Active)
        .map(|v| (v, snapshot.get(v.id)))
        .filter(|(_, stats)| stats.impressions >= thresholds.min_impressions)
        .collect();

    if candidates.len() < 2 {
        return ReallocationPlan::default();
    }

    rank(&mut candidates);

    let (best, best_stats) = candidates[0];
    let (worst, worst_stats) = candidates[candidates.len() - 1];
    if best.id == worst.id {
        return ReallocationPlan::default();
    }

    let (to_cents, cap_cents) = proposed_budget(best.budget_cents);
    let budget_increase = (to_cents > best.budget_cents).then(|| BudgetIncrease {
        variant_id: best.id,
        from_cents: best.budget_cents,
        to_cents,
        cap_cents,
        stats: best_stats,
    });

    let relative_pause = (worst.status == VariantStatus::Active
        && worst_stats.cpa.exceeds(thresholds.target_cpa))
    .then(|| RelativePause {
        variant_id: worst.id,
        target_cpa: thresholds.target_cpa,
        stats: worst_stats,
    });

    ReallocationPlan {
        budget_increase,
        relative_pause,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use campaign_core::types::{CampaignSettings, Cpa, RawMetricSums, VariantCopy};
    use chrono::{Duration, Utc};
    use std::collections::HashMap;

    fn variant(budget_cents: i64, age_minutes: i64) -> Variant {
        Variant {
            id: Uuid::new_v4(),
            campaign_id: Uuid::nil(),
            creative_id: Uuid::nil(),
            status: VariantStatus::Active,
            budget_cents,
            test_group: "A".to_string(),
            platform: "meta".to_string(),
            targeting: serde_json::json!({}),
            metadata: VariantCopy::default(),
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    fn thresholds() -> Thresholds {
        Thresholds::resolve(&CampaignSettings::default(), &OptimizerConfig::default(), None)
    }

    fn snapshot(entries: &[(Uuid, i64, i64, i64, i64)]) -> MetricsSnapshot {
        let map: HashMap<Uuid, RawMetricSums> = entries
            .iter()
            .map(|(id, impressions, clicks, conversions, spend)| {
                (
                    *id,
                    RawMetricSums {
                        impressions: *impressions,
                        clicks: *clicks,
                        conversions: *conversions,
                        spend: Decimal::new(*spend, 0),
                    },
                )
            })
            .collect();
        MetricsSnapshot::from_sums(Utc::now(), map)
    }

    #[test]
    fn test_proposed_budget_rounding() {
        assert_eq!(proposed_budget(1000), (1200, 2000));
        // 3 * 1.2 = 3.6 -> 4
        assert_eq!(proposed_budget(3), (4, 6));
        // 1 * 1.2 = 1.2 -> 1, no increase
        assert_eq!(proposed_budget(1), (1, 2));
        // 5 * 1.2 = 6.0
        assert_eq!(proposed_budget(5), (6, 10));
        assert_eq!(proposed_budget(0), (0, 0));
    }

    #[test]
    fn test_proposed_budget_never_exceeds_ceiling() {
        for budget in (0..5_000).chain([i64::MAX / 3, i64::MAX]) {
            let (proposed, cap) = proposed_budget(budget);
            assert!(proposed <= cap, "budget {budget}");
            assert!(proposed >= budget, "budget {budget}");
        }
    }

    #[test]
    fn test_two_variant_scenario() {
        let a = variant(1000, 20);
        let b = variant(1000, 10);
        let snap = snapshot(&[(a.id, 500, 50, 1, 100), (b.id, 500, 10, 3, 90)]);

        let plan = plan(&[a.clone(), b.clone()], &snap, &thresholds());

        let increase = plan.budget_increase.unwrap();
        assert_eq!(increase.variant_id, b.id);
        assert_eq!(increase.from_cents, 1000);
        assert_eq!(increase.to_cents, 1200);

        let pause = plan.relative_pause.unwrap();
        assert_eq!(pause.variant_id, a.id);
        assert_eq!(pause.stats.cpa, Cpa::Finite(Decimal::new(100, 0)));
    }

    #[test]
    fn test_single_qualifying_variant_is_untouched() {
        let a = variant(1000, 20);
        let b = variant(1000, 10);
        // b misses the impression floor
        let snap = snapshot(&[(a.id, 500, 50, 0, 500), (b.id, 50, 10, 3, 90)]);

        assert!(plan(&[a, b], &snap, &thresholds()).is_empty());
    }

    #[test]
    fn test_paused_variants_do_not_qualify() {
        let a = variant(1000, 20);
        let mut b = variant(1000, 10);
        b.status = VariantStatus::Paused;
        let snap = snapshot(&[(a.id, 500, 50, 1, 100), (b.id, 500, 10, 3, 90)]);

        assert!(plan(&[a, b], &snap, &thresholds()).is_empty());
    }

    #[test]
    fn test_ctr_breaks_conversion_ties() {
        let a = variant(1000, 20);
        let b = variant(1000, 10);
        let snap = snapshot(&[(a.id, 500, 10, 0, 0), (b.id, 500, 30, 0, 0)]);

        let plan = plan(&[a.clone(), b.clone()], &snap, &thresholds());
        assert_eq!(plan.budget_increase.unwrap().variant_id, b.id);
        // zero conversions is infinite cpa
        assert_eq!(plan.relative_pause.unwrap().variant_id, a.id);
    }

    #[test]
    fn test_worst_within_target_is_kept() {
        let a = variant(1000, 20);
        let b = variant(1000, 10);
        let snap = snapshot(&[(a.id, 500, 50, 2, 100), (b.id, 500, 10, 3, 90)]);

        let plan = plan(&[a, b.clone()], &snap, &thresholds());
        assert_eq!(plan.budget_increase.unwrap().variant_id, b.id);
        assert!(plan.relative_pause.is_none());
    }

    #[test]
    fn test_full_ties_keep_creation_order() {
        let a = variant(1000, 20);
        let b = variant(1000, 10);
        let snap = snapshot(&[(a.id, 500, 10, 1, 50), (b.id, 500, 10, 1, 50)]);

        let plan = plan(&[a.clone(), b.clone()], &snap, &thresholds());
        assert_eq!(plan.budget_increase.unwrap().variant_id, a.id);
        assert!(plan.relative_pause.is_none());
    }
}
