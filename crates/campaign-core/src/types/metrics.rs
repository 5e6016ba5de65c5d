//! Metric samples and derived performance figures.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One day of delivery for one variant, as landed by ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub variant_id: Uuid,
    pub date: NaiveDate,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub spend: Decimal,
}

/// Summed counters for one variant over a lookback window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetricSums {
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub spend: Decimal,
}

impl RawMetricSums {
    /// Add another window's counters into this one.
    pub fn accumulate(&mut self, other: &RawMetricSums) {
        self.impressions += other.impressions;
        self.clicks += other.clicks;
        self.conversions += other.conversions;
        self.spend += other.spend;
    }
}

impl From<&MetricSample> for RawMetricSums {
    fn from(sample: &MetricSample) -> Self {
        Self {
            impressions: sample.impressions,
            clicks: sample.clicks,
            conversions: sample.conversions,
            spend: sample.spend,
        }
    }
}

/// Cost per acquisition.
///
/// `NoConversions` means there is no evidence of acquisition yet. It is not
/// zero, and it exceeds every finite target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cpa {
    Finite(#[serde(serialize_with = "serialize_rounded")] Decimal),
    NoConversions,
}

/// Reported CPAs carry four decimal places; comparisons use the exact quotient.
fn serialize_rounded<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    Serialize::serialize(&value.round_dp(4), serializer)
}

impl Cpa {
    /// Spend divided by conversions.
    pub fn from_totals(spend: Decimal, conversions: i64) -> Self {
        if conversions <= 0 {
            Self::NoConversions
        } else {
            Self::Finite(spend / Decimal::from(conversions))
        }
    }

    /// Whether this CPA is above `target`.
    pub fn exceeds(&self, target: Decimal) -> bool {
        match self {
            Self::Finite(value) => *value > target,
            Self::NoConversions => true,
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            Self::Finite(value) => Some(*value),
            Self::NoConversions => None,
        }
    }
}

impl std::fmt::Display for Cpa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finite(value) => write!(f, "{:.2}", value),
            Self::NoConversions => write!(f, "inf"),
        }
    }
}
