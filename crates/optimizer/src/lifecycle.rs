//! Lifecycle monitor: retire campaigns that stay unprofitable.

use campaign_core::types::{ActionType, Campaign, CampaignStatus, CampaignUpdate, Cpa};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::action_logger::ActionLogger;
use crate::config::Thresholds;
use crate::error::{OptimizerError, Result};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetargetingShift {
    pub duration_days: f64,
    pub profitability_window_days: i64,
    pub campaign_cpa: Cpa,
    pub target_cpa: Decimal,
}

/// Fractional days since the campaign started. `None` if it never started.
pub fn campaign_duration_days(campaign: &Campaign, now: DateTime<Utc>) -> Option<f64> {
    campaign
        .started_at
        .map(|started| (now - started).num_seconds() as f64 / SECONDS_PER_DAY)
}

/// Decide whether the campaign has been unprofitable for the whole window.
pub fn evaluate(
    campaign: &Campaign,
    campaign_cpa: Cpa,
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> Option<RetargetingShift> {
    let duration_days = campaign_duration_days(campaign, now)?;

    if duration_days < thresholds.profitability_window_days as f64
        || !campaign_cpa.exceeds(thresholds.target_cpa)
    {
        return None;
    }

    Some(RetargetingShift {
        duration_days,
        profitability_window_days: thresholds.profitability_window_days,
        campaign_cpa,
        target_cpa: thresholds.target_cpa,
    })
}

/// Pause the campaign and flag it for retargeting, updating `campaign` to match.
///
/// Fails with a conflict when the campaign changed since the pass loaded it.
pub async fn apply(
    logger: &mut ActionLogger,
    campaign: &mut Campaign,
    shift: &RetargetingShift,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut metadata = campaign.metadata.clone();
    metadata.retargeting_pool_activated = true;
    metadata.last_optimization_suggestion = Some(now);

    let update = CampaignUpdate {
        expected_version: campaign.version,
        status: Some(CampaignStatus::Paused),
        metadata: Some(metadata.clone()),
    };
    let details = json!({
        "campaignCpa": shift.campaign_cpa,
        "targetCpa": shift.target_cpa,
        "durationDays": shift.duration_days,
        "profitabilityWindowDays": shift.profitability_window_days,
    });

    if !logger
        .campaign_change(&update, ActionType::CampaignShiftToRetargeting, details)
        .await?
    {
        return Err(OptimizerError::conflict(format!(
            "campaign {} changed during evaluation (expected version {})",
            campaign.id, campaign.version
        )));
    }

    campaign.status = CampaignStatus::Paused;
    campaign.metadata = metadata;
    if !logger.is_dry_run() {
        campaign.version += 1;
    }

    info!(
        campaign_id = %campaign.id,
        campaign_cpa = %shift.campaign_cpa,
        duration_days = shift.duration_days,
        "Campaign shifted to retargeting"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use campaign_core::types::{CampaignMetadata, CampaignSettings};
    use campaign_core::MemoryCampaignStore;
    use chrono::Duration;
    use std::sync::Arc;

    fn campaign(started_days_ago: Option<i64>) -> Campaign {
        let now = Utc::now();
        let mut metadata = CampaignMetadata::default();
        metadata
            .extra
            .insert("audience".to_string(), json!("lookalike"));
        Campaign {
            id: uuid::Uuid::new_v4(),
            owner_id: None,
            name: "Autumn".to_string(),
            status: CampaignStatus::Active,
            auto_optimize: true,
            started_at: started_days_ago.map(|d| now - Duration::days(d)),
            settings: CampaignSettings::default(),
            metadata,
            version: 3,
            created_at: now - Duration::days(30),
        }
    }

    fn thresholds() -> Thresholds {
        Thresholds::resolve(&CampaignSettings::default(), &OptimizerConfig::default(), None)
    }

    #[test]
    fn test_shift_requires_window_and_cost() {
        let now = Utc::now();
        let expensive = Cpa::Finite(Decimal::new(90, 0));
        let cheap = Cpa::Finite(Decimal::new(50, 0));

        assert!(evaluate(&campaign(Some(5)), expensive, &thresholds(), now).is_some());
        assert!(evaluate(&campaign(Some(4)), expensive, &thresholds(), now).is_none());
        assert!(evaluate(&campaign(Some(10)), cheap, &thresholds(), now).is_none());
        assert!(evaluate(&campaign(Some(10)), Cpa::NoConversions, &thresholds(), now).is_some());
        assert!(evaluate(&campaign(None), expensive, &thresholds(), now).is_none());
    }

    #[test]
    fn test_duration_is_fractional() {
        let c = campaign(Some(0));
        let now = c.started_at.unwrap() + Duration::hours(36);
        assert_eq!(campaign_duration_days(&c, now), Some(1.5));
    }

    #[tokio::test]
    async fn test_apply_pauses_and_merges_metadata() {
        let store = Arc::new(MemoryCampaignStore::new());
        let c = campaign(Some(6));
        store.insert_campaign(c.clone()).await;
        let now = Utc::now();

        let shift = evaluate(&c, Cpa::NoConversions, &thresholds(), now).unwrap();
        let mut logger = ActionLogger::new(store.clone(), c.id, false, now);
        let mut local = c.clone();
        apply(&mut logger, &mut local, &shift, now).await.unwrap();
        assert_eq!(local.status, CampaignStatus::Paused);
        assert_eq!(local.version, 4);

        let stored = store.campaign(c.id).await.unwrap();
        assert_eq!(stored.status, CampaignStatus::Paused);
        assert!(stored.metadata.retargeting_pool_activated);
        assert_eq!(stored.metadata.last_optimization_suggestion, Some(now));
        assert_eq!(stored.metadata.extra["audience"], "lookalike");
        assert_eq!(stored.version, 4);

        let log = store.action_log().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action_type, ActionType::CampaignShiftToRetargeting);
    }

    #[tokio::test]
    async fn test_apply_conflicts_on_stale_version() {
        let store = Arc::new(MemoryCampaignStore::new());
        let c = campaign(Some(6));
        let mut newer = c.clone();
        newer.version = 4;
        store.insert_campaign(newer).await;
        let now = Utc::now();

        let shift = evaluate(&c, Cpa::NoConversions, &thresholds(), now).unwrap();
        let mut logger = ActionLogger::new(store.clone(), c.id, false, now);
        let mut local = c.clone();
        let err = apply(&mut logger, &mut local, &shift, now).await.unwrap_err();

        assert!(matches!(
            err,
            OptimizerError::Core(campaign_core::Error::Conflict { .. })
        ));
        assert_eq!(store.campaign(c.id).await.unwrap().status, CampaignStatus::Active);
        assert!(store.action_log().await.is_empty());
    }
}
