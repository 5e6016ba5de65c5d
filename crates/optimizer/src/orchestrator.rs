//! Campaign orchestrator: one evaluation pass over one campaign.
//!
//! Stages run in a fixed order over a single metrics snapshot taken at the
//! start of the pass: evaluator, reallocator, mutation trigger, lifecycle.

use campaign_core::api::TipsGenerator;
use campaign_core::types::{
    ActionType, Campaign, Cpa, Variant, VariantStatus, VariantUpdate,
};
use campaign_core::CampaignStore;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::action_logger::{ActionLogger, ActionRecord};
use crate::aggregator;
use crate::config::{OptimizerConfig, Thresholds};
use crate::error::{OptimizerError, Result};
use crate::evaluator::{self, VariantFinding};
use crate::lease::CampaignLease;
use crate::lifecycle;
use crate::mutation::{MutationInput, MutationOutcome, MutationTrigger};
use crate::reallocator;

/// Per-pass options supplied by the job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassOptions {
    /// Overrides the campaign's optimization window.
    pub lookback_hours: Option<i64>,
    /// Base creative for a mutation, if one is triggered.
    pub creative_id: Option<Uuid>,
    /// Plan actions without writing anything.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    Evaluated,
    /// Campaign is paused or has auto-optimization turned off.
    NotEligible,
}

/// Result of one pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignReport {
    /// Campaign as it stands after the pass.
    pub campaign: Campaign,
    pub outcome: PassOutcome,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Thresholds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_cpa: Option<Cpa>,
    pub insights: Vec<String>,
    pub actions: Vec<ActionRecord>,
}

impl CampaignReport {
    fn not_eligible(campaign: Campaign, dry_run: bool) -> Self {
        Self {
            campaign,
            outcome: PassOutcome::NotEligible,
            dry_run,
            thresholds: None,
            campaign_cpa: None,
            insights: Vec::new(),
            actions: Vec::new(),
        }
    }
}

pub struct CampaignOrchestrator {
    store: Arc<dyn CampaignStore>,
    lease: Arc<dyn CampaignLease>,
    mutation: MutationTrigger,
    config: OptimizerConfig,
}

impl CampaignOrchestrator {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        lease: Arc<dyn CampaignLease>,
        tips: Arc<dyn TipsGenerator>,
        config: OptimizerConfig,
    ) -> Self {
        let mutation =
            MutationTrigger::new(tips, StdDuration::from_secs(config.tips_timeout_secs));
        Self {
            store,
            lease,
            mutation,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn CampaignStore> {
        &self.store
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub async fn run_pass(&self, campaign_id: Uuid, options: &PassOptions) -> Result<CampaignReport> {
        self.run_pass_at(campaign_id, options, Utc::now()).await
    }

    /// Run a pass as of `now`.
    ///
    /// Live passes hold the campaign lease for their whole duration and fail
    /// with [`OptimizerError::LeaseHeld`] when another pass owns it. Dry runs
    /// write nothing and take no lease.
    pub async fn run_pass_at(
        &self,
        campaign_id: Uuid,
        options: &PassOptions,
        now: DateTime<Utc>,
    ) -> Result<CampaignReport> {
        if options.dry_run {
            return self.evaluate(campaign_id, options, now).await;
        }

        let ttl = StdDuration::from_secs(self.config.lease_ttl_secs);
        let Some(token) = self.lease.try_acquire(campaign_id, ttl).await? else {
            return Err(OptimizerError::LeaseHeld(campaign_id));
        };

        let result = self.evaluate(campaign_id, options, now).await;

        if let Err(e) = self.lease.release(campaign_id, &token).await {
            warn!(campaign_id = %campaign_id, error = %e, "Failed to release campaign lease");
        }

        result
    }

    async fn evaluate(
        &self,
        campaign_id: Uuid,
        options: &PassOptions,
        now: DateTime<Utc>,
    ) -> Result<CampaignReport> {
        let mut campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or(OptimizerError::CampaignNotFound(campaign_id))?;

        if !campaign.is_optimizable() {
            debug!(
                campaign_id = %campaign_id,
                status = %campaign.status,
                auto_optimize = campaign.auto_optimize,
                "Campaign not eligible for optimization"
            );
            return Ok(CampaignReport::not_eligible(campaign, options.dry_run));
        }

        let thresholds = Thresholds::resolve(&campaign.settings, &self.config, options.lookback_hours);
        let mut variants = self.store.list_variants(campaign_id).await?;
        let variant_ids: Vec<Uuid> = variants.iter().map(|v| v.id).collect();
        let since = now - Duration::hours(thresholds.lookback_hours);
        let snapshot = aggregator::aggregate(self.store.as_ref(), &variant_ids, since).await?;

        let mut logger = ActionLogger::new(self.store.clone(), campaign_id, options.dry_run, now);
        let mut insights = Vec::new();

        // Changes committed before a failure still belong in the result
        let staged = async {
            // Absolute rules, per variant
            for finding in evaluator::evaluate(&variants, &snapshot, &thresholds) {
                match &finding {
                    VariantFinding::CostTooHigh {
                        variant_id,
                        cpa,
                        target_cpa,
                        stats,
                    } => {
                        let details = json!({
                            "cpa": cpa,
                            "targetCpa": target_cpa,
                            "windowHours": thresholds.lookback_hours,
                            "metrics": stats,
                        });
                        logger
                            .variant_change(
                                *variant_id,
                                VariantUpdate::Pause,
                                ActionType::VariantPausedCpaTooHigh,
                                details,
                            )
                            .await?;
                        // Applied or not, the variant is no longer active
                        set_status(&mut variants, *variant_id, VariantStatus::Paused);
                    }
                    VariantFinding::HighCtrNoConversions { variant_id, stats } => {
                        let details = json!({
                            "ctr": stats.ctr,
                            "clicks": stats.clicks,
                            "impressions": stats.impressions,
                            "conversions": stats.conversions,
                            "windowHours": thresholds.lookback_hours,
                        });
                        logger
                            .note(Some(*variant_id), ActionType::InsightHighCtrLowConv, details)
                            .await?;
                        insights.extend(finding.insight());
                    }
                }
            }

            // Relative ranking
            let plan = reallocator::plan(&variants, &snapshot, &thresholds);
            if let Some(increase) = &plan.budget_increase {
                let details = json!({
                    "fromCents": increase.from_cents,
                    "toCents": increase.to_cents,
                    "capCents": increase.cap_cents,
                    "metrics": increase.stats,
                });
                let update = VariantUpdate::SetBudget {
                    from_cents: increase.from_cents,
                    to_cents: increase.to_cents,
                };
                if logger
                    .variant_change(increase.variant_id, update, ActionType::BudgetIncrease, details)
                    .await?
                {
                    if let Some(v) = variants.iter_mut().find(|v| v.id == increase.variant_id) {
                        update.apply(v);
                    }
                }
            }
            if let Some(pause) = &plan.relative_pause {
                let details = json!({
                    "cpa": pause.stats.cpa,
                    "targetCpa": pause.target_cpa,
                    "metrics": pause.stats,
                });
                logger
                    .variant_change(
                        pause.variant_id,
                        VariantUpdate::Pause,
                        ActionType::VariantPausedLowPerformance,
                        details,
                    )
                    .await?;
                set_status(&mut variants, pause.variant_id, VariantStatus::Paused);
            }

            // Campaign-wide figure over every variant, paused ones included
            let campaign_cpa = snapshot.campaign_cpa(variant_ids.iter());

            let mutation = self
                .mutation
                .run(
                    self.store.as_ref(),
                    &mut logger,
                    MutationInput {
                        campaign: &campaign,
                        variants: &variants,
                        campaign_cpa,
                        thresholds: &thresholds,
                        creative_id: options.creative_id,
                    },
                )
                .await;
            if let MutationOutcome::Failed(message) = &mutation {
                insights.push(format!("Creative mutation failed: {}", message));
            }

            if let Some(shift) = lifecycle::evaluate(&campaign, campaign_cpa, &thresholds, now) {
                lifecycle::apply(&mut logger, &mut campaign, &shift, now).await?;
            }

            Ok::<Cpa, OptimizerError>(campaign_cpa)
        }
        .await;
        let campaign_cpa = match staged {
            Ok(cpa) => cpa,
            Err(source) => {
                return Err(OptimizerError::PassInterrupted {
                    source: Box::new(source),
                    actions: logger.into_records(),
                    insights,
                });
            }
        };

        let actions = logger.into_records();
        info!(
            campaign_id = %campaign_id,
            variants = variants.len(),
            campaign_cpa = %campaign_cpa,
            actions = actions.len(),
            insights = insights.len(),
            dry_run = options.dry_run,
            "Campaign evaluation complete"
        );

        Ok(CampaignReport {
            campaign,
            outcome: PassOutcome::Evaluated,
            dry_run: options.dry_run,
            thresholds: Some(thresholds),
            campaign_cpa: Some(campaign_cpa),
            insights,
            actions,
        })
    }
}

fn set_status(variants: &mut [Variant], variant_id: Uuid, status: VariantStatus) {
    if let Some(v) = variants.iter_mut().find(|v| v.id == variant_id) {
        v.status = status;
    }
}
