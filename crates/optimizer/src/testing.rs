//! Fixtures shared by the orchestrator and batch tests.

use async_trait::async_trait;
use campaign_core::api::{CreativeTips, TipsGenerator, TipsRequest};
use campaign_core::types::{
    Campaign, CampaignMetadata, CampaignSettings, CampaignStatus, Creative, MetricSample,
    Variant, VariantCopy, VariantStatus,
};
use campaign_core::MemoryCampaignStore;
use chrono::{DateTime, Duration, Utc};
use mockall::mock;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

mock! {
    pub Tips {}

    #[async_trait]
    impl TipsGenerator for Tips {
        async fn generate_tips(&self, request: &TipsRequest) -> campaign_core::Result<CreativeTips>;
    }
}

pub fn tips() -> CreativeTips {
    CreativeTips {
        captions: vec!["Your mornings, upgraded".to_string()],
        cta: "Try it free".to_string(),
        headline: "Brew better".to_string(),
    }
}

/// Mock that must never be called.
pub fn silent_tips() -> Arc<MockTips> {
    let mut mock = MockTips::new();
    mock.expect_generate_tips().times(0);
    Arc::new(mock)
}

pub fn campaign(started_days_ago: i64) -> Campaign {
    let now = Utc::now();
    Campaign {
        id: Uuid::new_v4(),
        owner_id: None,
        name: "Coffee launch".to_string(),
        status: CampaignStatus::Active,
        auto_optimize: true,
        started_at: Some(now - Duration::days(started_days_ago)),
        settings: CampaignSettings::default(),
        metadata: CampaignMetadata::default(),
        version: 1,
        created_at: now - Duration::days(started_days_ago + 1),
    }
}

pub fn creative(campaign_id: Uuid) -> Creative {
    Creative {
        id: Uuid::new_v4(),
        campaign_id,
        headline: Some("Brew at home".to_string()),
        caption: Some("Barista taste, no queue".to_string()),
        cta: Some("Order now".to_string()),
        transcript: None,
        created_at: Utc::now() - Duration::days(3),
    }
}

pub fn variant(campaign: &Campaign, creative: &Creative, age_minutes: i64) -> Variant {
    Variant {
        id: Uuid::new_v4(),
        campaign_id: campaign.id,
        creative_id: creative.id,
        status: VariantStatus::Active,
        budget_cents: 1000,
        test_group: "A".to_string(),
        platform: "meta".to_string(),
        targeting: serde_json::json!({ "age": "25-34" }),
        metadata: VariantCopy::default(),
        created_at: Utc::now() - Duration::minutes(age_minutes),
    }
}

pub fn sample(
    variant_id: Uuid,
    date: DateTime<Utc>,
    impressions: i64,
    clicks: i64,
    conversions: i64,
    spend: i64,
) -> MetricSample {
    MetricSample {
        variant_id,
        date: date.date_naive(),
        impressions,
        clicks,
        conversions,
        spend: Decimal::new(spend, 0),
    }
}

/// A campaign with one creative and variants carrying the given
/// `(impressions, clicks, conversions, spend)` totals, recorded today.
pub async fn seeded(
    store: &MemoryCampaignStore,
    campaign: Campaign,
    metrics: &[(i64, i64, i64, i64)],
) -> (Campaign, Vec<Variant>) {
    let creative = creative(campaign.id);
    store.insert_campaign(campaign.clone()).await;
    store.insert_creative(creative.clone()).await;

    let mut variants = Vec::new();
    for (i, (impressions, clicks, conversions, spend)) in metrics.iter().enumerate() {
        let v = variant(&campaign, &creative, 100 - i as i64);
        store.insert_variant(v.clone()).await;
        store
            .insert_sample(sample(v.id, Utc::now(), *impressions, *clicks, *conversions, *spend))
            .await;
        variants.push(v);
    }
    (campaign, variants)
}
