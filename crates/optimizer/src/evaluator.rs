//! Variant evaluator: absolute cost rule and the high-CTR diagnostic.

use campaign_core::types::{Cpa, Variant, VariantStatus};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::aggregator::{MetricsSnapshot, VariantStats};
use crate::config::{Thresholds, HIGH_CTR_THRESHOLD};

/// A per-variant finding from the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariantFinding {
    /// Variant has enough data and costs more per conversion than the target.
    CostTooHigh {
        variant_id: Uuid,
        cpa: Cpa,
        target_cpa: Decimal,
        stats: VariantStats,
    },
    /// Variant attracts clicks but nobody converts.
    HighCtrNoConversions { variant_id: Uuid, stats: VariantStats },
}

impl VariantFinding {
    pub fn variant_id(&self) -> Uuid {
        match self {
            Self::CostTooHigh { variant_id, .. } | Self::HighCtrNoConversions { variant_id, .. } => {
                *variant_id
            }
        }
    }

    /// Operator-facing text for diagnostic findings.
    pub fn insight(&self) -> Option<String> {
        match self {
            Self::HighCtrNoConversions { variant_id, stats } => Some(format!(
                "Variant {} has a {:.1}% click-through rate but no conversions; review the landing page",
                variant_id,
                stats.ctr * 100.0
            )),
            Self::CostTooHigh { .. } => None,
        }
    }
}

/// Evaluate active variants with enough impressions.
///
/// Pending and paused variants are never evaluated. Findings come out in
/// variant order, the cost finding before the diagnostic for the same variant.
pub fn evaluate(
    variants: &[Variant],
    snapshot: &MetricsSnapshot,
    thresholds: &Thresholds,
) -> Vec<VariantFinding> {
    let mut findings = Vec::new();

    for variant in variants {
        if variant.status != VariantStatus::Active {
            continue;
        }

        let stats = snapshot.get(variant.id);
        if stats.impressions < thresholds.min_impressions {
            continue;
        }

        if stats.conversions == 0 && stats.cpa.exceeds(thresholds.target_cpa) {
            findings.push(VariantFinding::CostTooHigh {
                variant_id: variant.id,
                cpa: stats.cpa,
                target_cpa: thresholds.target_cpa,
                stats,
            });
        }

        if stats.ctr > HIGH_CTR_THRESHOLD && stats.conversions < 1 {
            findings.push(VariantFinding::HighCtrNoConversions {
                variant_id: variant.id,
                stats,
            });
        }
    }

    findings
}
