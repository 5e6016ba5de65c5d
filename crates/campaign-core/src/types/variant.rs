//! Variant types: one creative + targeting + budget configuration under test.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Test group tag for variants spawned by the mutation trigger.
pub const MUTATION_TEST_GROUP: &str = "M";

/// Variant lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
    /// Created but not yet funded or launched.
    Pending,
    /// Serving and spending.
    Active,
    /// Stopped; never resumed by the control loop.
    Paused,
}

impl std::fmt::Display for VariantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

impl std::str::FromStr for VariantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            _ => Err(format!("Invalid variant status: {}", s)),
        }
    }
}

/// Creative copy carried in a variant's metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantCopy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A variant under test within a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub creative_id: Uuid,
    pub status: VariantStatus,
    pub budget_cents: i64,
    pub test_group: String,
    pub platform: String,
    pub targeting: serde_json::Value,
    pub metadata: VariantCopy,
    pub created_at: DateTime<Utc>,
}

/// Fields for a variant created by the control loop.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVariant {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub creative_id: Uuid,
    pub status: VariantStatus,
    pub budget_cents: i64,
    pub test_group: String,
    pub platform: String,
    pub targeting: serde_json::Value,
    pub metadata: VariantCopy,
}

/// A guarded change to a single variant.
///
/// The store applies the change only while the guard still holds, so two
/// overlapping passes cannot both pause or both raise the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantUpdate {
    /// ACTIVE -> PAUSED.
    Pause,
    /// Budget change, applied only while the stored budget equals `from_cents`.
    SetBudget { from_cents: i64, to_cents: i64 },
}

impl VariantUpdate {
    /// Whether the update's guard holds against the current row.
    pub fn guard_holds(&self, variant: &Variant) -> bool {
        match self {
            Self::Pause => variant.status == VariantStatus::Active,
            Self::SetBudget { from_cents, .. } => variant.budget_cents == *from_cents,
        }
    }

    /// Apply the update to an in-memory row.
    pub fn apply(&self, variant: &mut Variant) {
        match self {
            Self::Pause => variant.status = VariantStatus::Paused,
            Self::SetBudget { to_cents, .. } => variant.budget_cents = *to_cents,
        }
    }
}
