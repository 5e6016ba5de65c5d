//! Integration tests for component interactions.
//!
//! Each test drives full batch jobs through the in-memory store and checks
//! what ends up in the store and the action log.

use async_trait::async_trait;
use campaign_core::api::{CreativeTips, TipsGenerator, TipsRequest};
use campaign_core::types::{
    ActionLogEntry, ActionLogFilter, ActionType, Campaign, CampaignMetadata, CampaignSettings, CampaignStatus,
    Creative, MetricSample, Variant, VariantCopy, VariantStatus,
};
use campaign_core::{CampaignStore, MemoryCampaignStore};
use chrono::{Duration, Utc};
use optimizer::{
    BatchRunner, CampaignOrchestrator, CampaignOutcome, JobPayload, JobReason, MemoryLease,
    OptimizerConfig,
};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Tips service stand-in that counts calls.
#[derive(Default)]
struct FixedTips {
    calls: AtomicUsize,
}

#[async_trait]
impl TipsGenerator for FixedTips {
    async fn generate_tips(&self, _request: &TipsRequest) -> campaign_core::Result<CreativeTips> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CreativeTips {
            captions: vec!["Fresh beans, zero effort".to_string()],
            cta: "Subscribe".to_string(),
            headline: "Coffee on autopilot".to_string(),
        })
    }
}

struct Harness {
    store: Arc<MemoryCampaignStore>,
    tips: Arc<FixedTips>,
    runner: BatchRunner,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryCampaignStore::new());
    let tips = Arc::new(FixedTips::default());
    let orchestrator = CampaignOrchestrator::new(
        store.clone(),
        Arc::new(MemoryLease::new()),
        tips.clone(),
        OptimizerConfig::default(),
    );
    Harness {
        store,
        tips,
        runner: BatchRunner::new(Arc::new(orchestrator)),
    }
}

fn campaign(name: &str, started_days_ago: i64, created_minutes_ago: i64) -> Campaign {
    let now = Utc::now();
    Campaign {
        id: Uuid::new_v4(),
        owner_id: None,
        name: name.to_string(),
        status: CampaignStatus::Active,
        auto_optimize: true,
        started_at: Some(now - Duration::days(started_days_ago)),
        settings: CampaignSettings::default(),
        metadata: CampaignMetadata::default(),
        version: 1,
        created_at: now - Duration::minutes(created_minutes_ago),
    }
}

/// Seed a campaign with one creative and one variant per
/// `(impressions, clicks, conversions, spend)` tuple.
async fn seed(
    store: &MemoryCampaignStore,
    campaign: &Campaign,
    metrics: &[(i64, i64, i64, i64)],
) -> Vec<Variant> {
    let creative = Creative {
        id: Uuid::new_v4(),
        campaign_id: campaign.id,
        headline: Some("Brew at home".to_string()),
        caption: Some("Barista taste, no queue".to_string()),
        cta: Some("Order now".to_string()),
        transcript: None,
        created_at: Utc::now() - Duration::days(2),
    };
    store.insert_campaign(campaign.clone()).await;
    store.insert_creative(creative.clone()).await;

    let mut variants = Vec::new();
    for (i, (impressions, clicks, conversions, spend)) in metrics.iter().enumerate() {
        let variant = Variant {
            id: Uuid::new_v4(),
            campaign_id: campaign.id,
            creative_id: creative.id,
            status: VariantStatus::Active,
            budget_cents: 1000,
            test_group: if i == 0 { "A" } else { "B" }.to_string(),
            platform: "meta".to_string(),
            targeting: serde_json::json!({ "geo": "KE" }),
            metadata: VariantCopy::default(),
            created_at: Utc::now() - Duration::minutes(60 - i as i64),
        };
        store.insert_variant(variant.clone()).await;
        store
            .insert_sample(MetricSample {
                variant_id: variant.id,
                date: Utc::now().date_naive(),
                impressions: *impressions,
                clicks: *clicks,
                conversions: *conversions,
                spend: Decimal::new(*spend, 0),
            })
            .await;
        variants.push(variant);
    }
    variants
}

fn action_types(log: &[ActionLogEntry], campaign_id: Uuid) -> Vec<ActionType> {
    log
        .iter()
        .filter(|e| e.campaign_id == campaign_id)
        .map(|e| e.action_type)
        .collect()
}

/// A scheduled sweep reallocates a healthy A/B test and isolates a failing campaign.
#[tokio::test]
async fn test_scheduled_sweep_reallocates_and_isolates_failures() {
    let h = harness();

    let healthy = campaign("Coffee launch", 2, 120);
    let variants = seed(&h.store, &healthy, &[(500, 10, 1, 100), (500, 10, 3, 90)]).await;

    let broken = campaign("Tea launch", 2, 60);
    seed(&h.store, &broken, &[(500, 10, 1, 100)]).await;
    h.store.fail_campaign_reads(broken.id).await;

    let result = h.runner.run(&JobPayload::scheduled()).await.unwrap();

    assert_eq!(result.campaigns_processed, 2);
    assert_eq!(result.reason, JobReason::Scheduled);
    assert_eq!(result.failed(), 1);

    assert_eq!(result.results[0].campaign_id, healthy.id);
    assert_eq!(result.results[0].outcome, CampaignOutcome::Evaluated);
    assert_eq!(result.results[1].campaign_id, broken.id);
    assert_eq!(result.results[1].outcome, CampaignOutcome::Failed);
    assert!(result.results[1].error.is_some());

    let loser = h.store.variant(variants[0].id).await.unwrap();
    let winner = h.store.variant(variants[1].id).await.unwrap();
    assert_eq!(loser.status, VariantStatus::Paused);
    assert_eq!(winner.budget_cents, 1200);

    let log = h.store.action_log().await;
    assert_eq!(
        action_types(&log, healthy.id),
        vec![ActionType::BudgetIncrease, ActionType::VariantPausedLowPerformance]
    );
    assert!(action_types(&log, broken.id).is_empty());
    assert_eq!(h.tips.calls.load(Ordering::SeqCst), 0);
}

/// A campaign that never converts gets paused variants, a mutation and a
/// retargeting shift, and drops out of the next sweep.
#[tokio::test]
async fn test_unprofitable_campaign_runs_every_stage() {
    let h = harness();

    let stale = campaign("Cold brew", 10, 60);
    let variants = seed(&h.store, &stale, &[(400, 20, 0, 120)]).await;

    let result = h
        .runner
        .run(&JobPayload::for_campaign(stale.id, JobReason::Manual))
        .await
        .unwrap();

    assert_eq!(result.campaigns_processed, 1);
    let report = &result.results[0];
    assert_eq!(report.outcome, CampaignOutcome::Evaluated);
    assert_eq!(report.campaign_status, Some(CampaignStatus::Paused));
    assert!(!report.insights.is_empty());

    let log = h.store.action_log().await;
    let types = action_types(&log, stale.id);
    assert!(types.contains(&ActionType::VariantPausedCpaTooHigh));
    assert!(types.contains(&ActionType::InsightHighCtrLowConv));
    assert!(types.contains(&ActionType::VariantMutated));
    assert_eq!(types.last(), Some(&ActionType::CampaignShiftToRetargeting));
    assert_eq!(h.tips.calls.load(Ordering::SeqCst), 1);

    assert_eq!(
        h.store.variant(variants[0].id).await.unwrap().status,
        VariantStatus::Paused
    );

    let mutated = log
        .iter()
        .find(|e| e.action_type == ActionType::VariantMutated)
        .and_then(|e| e.variant_id)
        .unwrap();
    let created = h.store.variant(mutated).await.unwrap();
    assert_eq!(created.status, VariantStatus::Pending);
    assert_eq!(created.platform, "meta");
    assert_eq!(created.metadata.caption.as_deref(), Some("Fresh beans, zero effort"));

    let stored = h.store.campaign(stale.id).await.unwrap();
    assert_eq!(stored.status, CampaignStatus::Paused);
    assert!(stored.metadata.retargeting_pool_activated);
    assert!(stored.metadata.last_optimization_suggestion.is_some());

    let next = h.runner.run(&JobPayload::scheduled()).await.unwrap();
    assert_eq!(next.campaigns_processed, 0);
}

/// A dry run reports the same plan but leaves the store untouched.
#[tokio::test]
async fn test_dry_run_reports_without_writing() {
    let h = harness();

    let c = campaign("Coffee launch", 10, 60);
    let variants = seed(&h.store, &c, &[(400, 20, 0, 120), (500, 10, 3, 90)]).await;

    let mut payload = JobPayload::for_campaign(c.id, JobReason::Manual);
    payload.dry_run = true;
    let result = h.runner.run(&payload).await.unwrap();

    assert!(result.dry_run);
    assert!(result.action_count() > 0);
    assert_eq!(h.store.writes(), 0);
    assert!(h.store.action_log().await.is_empty());
    assert_eq!(h.tips.calls.load(Ordering::SeqCst), 0);

    for variant in &variants {
        let stored = h.store.variant(variant.id).await.unwrap();
        assert_eq!(stored.status, VariantStatus::Active);
        assert_eq!(stored.budget_cents, 1000);
    }
    assert_eq!(
        h.store.campaign(c.id).await.unwrap().status,
        CampaignStatus::Active
    );
}

/// The audit trail written by a pass can be read back by action type.
#[tokio::test]
async fn test_action_log_query_after_pass() {
    let h = harness();

    let c = campaign("Coffee launch", 2, 60);
    let variants = seed(&h.store, &c, &[(500, 10, 1, 100), (500, 10, 3, 90)]).await;

    h.runner
        .run(&JobPayload::for_campaign(c.id, JobReason::StartTrigger))
        .await
        .unwrap();

    let filter = ActionLogFilter::new()
        .campaign(c.id)
        .action(ActionType::BudgetIncrease);
    let entries = h.store.query_action_log(&filter).await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].variant_id, Some(variants[1].id));
    assert_eq!(entries[0].details["fromCents"], 1000);
    assert_eq!(entries[0].details["toCents"], 1200);
}

/// Campaigns with optimization switched off are left alone.
#[tokio::test]
async fn test_manual_job_on_disabled_campaign_is_not_eligible() {
    let h = harness();

    let mut c = campaign("Hand tuned", 10, 60);
    c.auto_optimize = false;
    seed(&h.store, &c, &[(400, 20, 0, 120)]).await;

    let result = h
        .runner
        .run(&JobPayload::for_campaign(c.id, JobReason::Manual))
        .await
        .unwrap();

    assert_eq!(result.results[0].outcome, CampaignOutcome::NotEligible);
    assert!(result.results[0].actions.is_empty());
    assert_eq!(h.store.writes(), 0);
}
