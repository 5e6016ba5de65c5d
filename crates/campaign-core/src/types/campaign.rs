//! Campaign and creative types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Campaign lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Active,
    Paused,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// Per-campaign optimization overrides.
///
/// Every field is optional; unset fields fall back to the optimizer defaults
/// when thresholds are resolved at the start of a pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSettings {
    /// Target cost per acquisition in currency units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cpa: Option<Decimal>,
    /// Impressions a variant needs before any decision is taken on it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_impressions_for_decision: Option<i64>,
    /// Metrics lookback window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization_window_hours: Option<i64>,
    /// Days a campaign may run unprofitably before it is retired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profitability_window_days: Option<i64>,
    /// Industry hint passed to the tips service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

/// Campaign state written by the control loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignMetadata {
    #[serde(default)]
    pub retargeting_pool_activated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_optimization_suggestion: Option<DateTime<Utc>>,
    /// Keys owned by other subsystems, preserved on every write.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An advertising campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub name: String,
    pub status: CampaignStatus,
    pub auto_optimize: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub settings: CampaignSettings,
    pub metadata: CampaignMetadata,
    /// Optimistic concurrency token, bumped on every update.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Whether the control loop may act on this campaign.
    pub fn is_optimizable(&self) -> bool {
        self.status == CampaignStatus::Active && self.auto_optimize
    }
}

/// Content source for one or more variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creative {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub headline: Option<String>,
    pub caption: Option<String>,
    pub cta: Option<String>,
    pub transcript: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields the control loop may change on a campaign.
///
/// Applied only when the stored version still equals `expected_version`.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignUpdate {
    pub expected_version: i64,
    pub status: Option<CampaignStatus>,
    pub metadata: Option<CampaignMetadata>,
}
