//! Optimizer defaults and per-pass threshold resolution.

use campaign_core::types::CampaignSettings;
use rust_decimal::Decimal;
use serde::Serialize;

/// Default target cost per acquisition, in currency units.
pub const DEFAULT_TARGET_CPA: i64 = 75;
/// Default impressions a variant needs before decisions are taken on it.
pub const DEFAULT_MIN_IMPRESSIONS: i64 = 100;
/// Default metrics lookback window.
pub const DEFAULT_LOOKBACK_HOURS: i64 = 72;
/// Default days a campaign may run unprofitably before retirement.
pub const DEFAULT_PROFITABILITY_WINDOW_DAYS: i64 = 5;
pub const DEFAULT_INDUSTRY: &str = "general";

/// CTR above which a conversion-less variant is flagged for landing page review.
pub const HIGH_CTR_THRESHOLD: f64 = 0.04;

/// Configuration for the optimizer service.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub default_target_cpa: Decimal,
    pub default_min_impressions: i64,
    pub default_lookback_hours: i64,
    pub default_profitability_window_days: i64,
    pub default_industry: String,
    /// How long a per-campaign lease lives if never released.
    pub lease_ttl_secs: u64,
    /// Campaigns evaluated at once within one job.
    pub campaign_concurrency: usize,
    /// Deadline for one tips service call.
    pub tips_timeout_secs: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            default_target_cpa: Decimal::new(DEFAULT_TARGET_CPA, 0),
            default_min_impressions: DEFAULT_MIN_IMPRESSIONS,
            default_lookback_hours: DEFAULT_LOOKBACK_HOURS,
            default_profitability_window_days: DEFAULT_PROFITABILITY_WINDOW_DAYS,
            default_industry: DEFAULT_INDUSTRY.to_string(),
            lease_ttl_secs: 300,
            campaign_concurrency: 1,
            tips_timeout_secs: 20,
        }
    }
}

impl OptimizerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_target_cpa: std::env::var("OPTIMIZER_DEFAULT_TARGET_CPA")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_target_cpa),
            default_min_impressions: std::env::var("OPTIMIZER_DEFAULT_MIN_IMPRESSIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_min_impressions),
            default_lookback_hours: std::env::var("OPTIMIZER_DEFAULT_LOOKBACK_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_lookback_hours),
            default_profitability_window_days: std::env::var(
                "OPTIMIZER_PROFITABILITY_WINDOW_DAYS",
            )
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.default_profitability_window_days),
            default_industry: std::env::var("OPTIMIZER_DEFAULT_INDUSTRY")
                .unwrap_or(defaults.default_industry),
            lease_ttl_secs: std::env::var("OPTIMIZER_LEASE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.lease_ttl_secs),
            campaign_concurrency: std::env::var("OPTIMIZER_CAMPAIGN_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.campaign_concurrency),
            tips_timeout_secs: std::env::var("TIPS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.tips_timeout_secs),
        }
    }
}

/// Thresholds resolved once at the start of a pass. Never partially set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thresholds {
    pub target_cpa: Decimal,
    pub min_impressions: i64,
    pub lookback_hours: i64,
    pub profitability_window_days: i64,
    pub industry: String,
}

impl Thresholds {
    /// Resolve campaign overrides against the optimizer defaults.
    ///
    /// A job-level lookback wins over the campaign's window. Non-positive
    /// targets and windows, and negative impression floors, are treated as unset.
    pub fn resolve(
        settings: &CampaignSettings,
        config: &OptimizerConfig,
        lookback_override: Option<i64>,
    ) -> Self {
        Self {
            target_cpa: settings
                .target_cpa
                .filter(|t| *t > Decimal::ZERO)
                .unwrap_or(config.default_target_cpa),
            min_impressions: settings
                .min_impressions_for_decision
                .filter(|n| *n >= 0)
                .unwrap_or(config.default_min_impressions),
            lookback_hours: lookback_override
                .filter(|h| *h > 0)
                .or(settings.optimization_window_hours.filter(|h| *h > 0))
                .unwrap_or(config.default_lookback_hours),
            profitability_window_days: settings
                .profitability_window_days
                .filter(|d| *d > 0)
                .unwrap_or(config.default_profitability_window_days),
            industry: settings
                .industry
                .clone()
                .filter(|i| !i.trim().is_empty())
                .unwrap_or_else(|| config.default_industry.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let t = Thresholds::resolve(&CampaignSettings::default(), &OptimizerConfig::default(), None);
        assert_eq!(t.target_cpa, Decimal::new(75, 0));
        assert_eq!(t.min_impressions, 100);
        assert_eq!(t.lookback_hours, 72);
        assert_eq!(t.profitability_window_days, 5);
        assert_eq!(t.industry, "general");
    }

    #[test]
    fn test_campaign_overrides() {
        let settings = CampaignSettings {
            target_cpa: Some(Decimal::new(40, 0)),
            min_impressions_for_decision: Some(0),
            optimization_window_hours: Some(24),
            profitability_window_days: Some(3),
            industry: Some("fitness".to_string()),
        };
        let t = Thresholds::resolve(&settings, &OptimizerConfig::default(), None);
        assert_eq!(t.target_cpa, Decimal::new(40, 0));
        assert_eq!(t.min_impressions, 0);
        assert_eq!(t.lookback_hours, 24);
        assert_eq!(t.profitability_window_days, 3);
        assert_eq!(t.industry, "fitness");
    }

    #[test]
    fn test_job_lookback_wins() {
        let settings = CampaignSettings {
            optimization_window_hours: Some(24),
            ..Default::default()
        };
        let t = Thresholds::resolve(&settings, &OptimizerConfig::default(), Some(168));
        assert_eq!(t.lookback_hours, 168);
    }

    #[test]
    fn test_invalid_overrides_fall_back() {
        let settings = CampaignSettings {
            target_cpa: Some(Decimal::ZERO),
            min_impressions_for_decision: Some(-5),
            optimization_window_hours: Some(0),
            profitability_window_days: Some(-1),
            industry: Some("  ".to_string()),
        };
        let t = Thresholds::resolve(&settings, &OptimizerConfig::default(), Some(-3));
        assert_eq!(t, Thresholds::resolve(&CampaignSettings::default(), &OptimizerConfig::default(), None));
    }
}
