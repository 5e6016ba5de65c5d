//! Audit log entries for automated decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every action type the control loop records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    VariantPausedCpaTooHigh,
    InsightHighCtrLowConv,
    BudgetIncrease,
    VariantPausedLowPerformance,
    VariantMutated,
    VariantMutationFailed,
    CampaignShiftToRetargeting,
}

impl ActionType {
    pub const ALL: [ActionType; 7] = [
        ActionType::VariantPausedCpaTooHigh,
        ActionType::InsightHighCtrLowConv,
        ActionType::BudgetIncrease,
        ActionType::VariantPausedLowPerformance,
        ActionType::VariantMutated,
        ActionType::VariantMutationFailed,
        ActionType::CampaignShiftToRetargeting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VariantPausedCpaTooHigh => "variant_paused_cpa_too_high",
            Self::InsightHighCtrLowConv => "insight_high_ctr_low_conv",
            Self::BudgetIncrease => "budget_increase",
            Self::VariantPausedLowPerformance => "variant_paused_low_performance",
            Self::VariantMutated => "variant_mutated",
            Self::VariantMutationFailed => "variant_mutation_failed",
            Self::CampaignShiftToRetargeting => "campaign_shift_to_retargeting",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|a| a.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Invalid action type: {}", s))
    }
}

/// A persisted audit entry. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub id: i64,
    pub campaign_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub action_type: ActionType,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// An audit entry waiting to be appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewActionLogEntry {
    pub campaign_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub action_type: ActionType,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NewActionLogEntry {
    pub fn new(campaign_id: Uuid, action_type: ActionType) -> Self {
        Self {
            campaign_id,
            variant_id: None,
            action_type,
            details: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn variant(mut self, variant_id: Uuid) -> Self {
        self.variant_id = Some(variant_id);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.created_at = timestamp;
        self
    }
}

/// Filter for querying the action log. Results are newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionLogFilter {
    pub campaign_id: Option<Uuid>,
    pub variant_id: Option<Uuid>,
    pub action_type: Option<ActionType>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ActionLogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn campaign(mut self, campaign_id: Uuid) -> Self {
        self.campaign_id = Some(campaign_id);
        self
    }

    pub fn variant(mut self, variant_id: Uuid) -> Self {
        self.variant_id = Some(variant_id);
        self
    }

    pub fn action(mut self, action_type: ActionType) -> Self {
        self.action_type = Some(action_type);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Whether `entry` passes every criterion except paging.
    pub fn matches(&self, entry: &ActionLogEntry) -> bool {
        if let Some(campaign_id) = self.campaign_id {
            if entry.campaign_id != campaign_id {
                return false;
            }
        }
        if let Some(variant_id) = self.variant_id {
            if entry.variant_id != Some(variant_id) {
                return false;
            }
        }
        if let Some(action_type) = self.action_type {
            if entry.action_type != action_type {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.created_at < since {
                return false;
            }
        }
        true
    }
}
