//! Mutation trigger: spawn a fresh creative angle when the campaign is too expensive.
//!
//! Failures here are never propagated. Anything that goes wrong after the
//! decision to mutate is downgraded to a `variant_mutation_failed` entry so
//! the rest of the pass still runs.

use campaign_core::api::{TipsGenerator, TipsRequest};
use campaign_core::types::{
    ActionType, Campaign, Cpa, Creative, NewVariant, Variant, VariantCopy, VariantStatus,
    MUTATION_TEST_GROUP,
};
use campaign_core::CampaignStore;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::action_logger::ActionLogger;
use crate::config::Thresholds;
use crate::error::Result;

const DEFAULT_TRANSCRIPT: &str =
    "Short-form video ad introducing the product and the main benefit for the viewer.";

/// What the trigger did this pass.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// Campaign CPA is within target.
    NotNeeded,
    /// No creative or variant to mutate from.
    NothingToMutate,
    /// Dry run: a mutation would have been requested.
    Planned,
    Created(Uuid),
    Failed(String),
}

/// Campaign state the trigger decides on.
pub struct MutationInput<'a> {
    pub campaign: &'a Campaign,
    /// Variants as loaded at pass start.
    pub variants: &'a [Variant],
    pub campaign_cpa: Cpa,
    pub thresholds: &'a Thresholds,
    /// Explicit base creative, preferred over the latest one.
    pub creative_id: Option<Uuid>,
}

pub struct MutationTrigger {
    tips: Arc<dyn TipsGenerator>,
    timeout: StdDuration,
}

impl MutationTrigger {
    pub fn new(tips: Arc<dyn TipsGenerator>, timeout: StdDuration) -> Self {
        Self { tips, timeout }
    }

    pub async fn run(
        &self,
        store: &dyn CampaignStore,
        logger: &mut ActionLogger,
        input: MutationInput<'_>,
    ) -> MutationOutcome {
        if !input.campaign_cpa.exceeds(input.thresholds.target_cpa) {
            return MutationOutcome::NotNeeded;
        }

        match self.try_mutate(store, logger, &input).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    campaign_id = %input.campaign.id,
                    error = %e,
                    "Creative mutation failed"
                );
                let details = json!({
                    "error": e.to_string(),
                    "campaignCpa": input.campaign_cpa,
                    "targetCpa": input.thresholds.target_cpa,
                });
                if let Err(log_err) = logger
                    .note(None, ActionType::VariantMutationFailed, details)
                    .await
                {
                    warn!(
                        campaign_id = %input.campaign.id,
                        error = %log_err,
                        "Failed to record mutation failure"
                    );
                }
                MutationOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_mutate(
        &self,
        store: &dyn CampaignStore,
        logger: &mut ActionLogger,
        input: &MutationInput<'_>,
    ) -> Result<MutationOutcome> {
        let campaign_id = input.campaign.id;

        let Some(base_creative) = base_creative(store, campaign_id, input.creative_id).await? else {
            debug!(campaign_id = %campaign_id, "No creative to mutate from");
            return Ok(MutationOutcome::NothingToMutate);
        };
        let Some(base_variant) = base_variant(input.variants, base_creative.id) else {
            debug!(campaign_id = %campaign_id, "No variant to copy placement from");
            return Ok(MutationOutcome::NothingToMutate);
        };

        let mut variant = NewVariant {
            id: Uuid::new_v4(),
            campaign_id,
            creative_id: base_creative.id,
            status: VariantStatus::Pending,
            budget_cents: 0,
            test_group: MUTATION_TEST_GROUP.to_string(),
            platform: base_variant.platform.clone(),
            targeting: base_variant.targeting.clone(),
            metadata: VariantCopy::default(),
        };
        variant
            .metadata
            .extra
            .insert("sourceVariantId".to_string(), json!(base_variant.id));

        if logger.is_dry_run() {
            let details = json!({
                "planned": true,
                "baseCreativeId": base_creative.id,
                "baseVariantId": base_variant.id,
                "campaignCpa": input.campaign_cpa,
                "targetCpa": input.thresholds.target_cpa,
            });
            logger.variant_created(&variant, details).await?;
            return Ok(MutationOutcome::Planned);
        }

        let request = TipsRequest {
            transcript: transcript_for(&base_creative),
            context: context_for(input.campaign_cpa, input.thresholds.target_cpa),
            industry: input.thresholds.industry.clone(),
        };

        let tips = tokio::time::timeout(self.timeout, self.tips.generate_tips(&request))
            .await
            .map_err(|_| campaign_core::Error::Timeout {
                operation: "generate_tips",
                secs: self.timeout.as_secs(),
            })??;

        let caption = tips
            .primary_caption()
            .ok_or_else(|| campaign_core::Error::Tips {
                message: "response contained no caption".to_string(),
                status: None,
            })?
            .to_string();

        variant.metadata.caption = Some(caption.clone());
        variant.metadata.cta = Some(tips.cta.clone());
        variant.metadata.headline = Some(tips.headline.clone());

        let details = json!({
            "baseCreativeId": base_creative.id,
            "baseVariantId": base_variant.id,
            "caption": caption,
            "cta": tips.cta,
            "headline": tips.headline,
            "campaignCpa": input.campaign_cpa,
            "targetCpa": input.thresholds.target_cpa,
        });

        match logger.variant_created(&variant, details).await? {
            Some(created) => Ok(MutationOutcome::Created(created.id)),
            None => Ok(MutationOutcome::Planned),
        }
    }
}

/// Explicit creative when it belongs to the campaign, else the latest one.
async fn base_creative(
    store: &dyn CampaignStore,
    campaign_id: Uuid,
    creative_id: Option<Uuid>,
) -> Result<Option<Creative>> {
    if let Some(id) = creative_id {
        match store.get_creative(id).await? {
            Some(creative) if creative.campaign_id == campaign_id => return Ok(Some(creative)),
            _ => {
                warn!(
                    campaign_id = %campaign_id,
                    creative_id = %id,
                    "Requested creative not found in campaign, using latest"
                );
            }
        }
    }
    Ok(store.latest_creative(campaign_id).await?)
}

/// Newest variant built on `creative_id`, else the newest variant overall.
fn base_variant(variants: &[Variant], creative_id: Uuid) -> Option<&Variant> {
    variants
        .iter()
        .filter(|v| v.creative_id == creative_id)
        .max_by_key(|v| v.created_at)
        .or_else(|| variants.iter().max_by_key(|v| v.created_at))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn transcript_for(creative: &Creative) -> String {
    if let Some(transcript) = non_blank(&creative.transcript) {
        return transcript.to_string();
    }

    let lines: Vec<String> = [
        ("Headline", &creative.headline),
        ("Caption", &creative.caption),
        ("CTA", &creative.cta),
    ]
    .into_iter()
    .filter_map(|(label, value)| non_blank(value).map(|v| format!("{}: {}", label, v)))
    .collect();

    if lines.is_empty() {
        DEFAULT_TRANSCRIPT.to_string()
    } else {
        lines.join("\n")
    }
}

fn context_for(campaign_cpa: Cpa, target_cpa: Decimal) -> String {
    match campaign_cpa {
        Cpa::Finite(cpa) => format!(
            "Campaign cost per acquisition is {:.2} against a target of {:.2}. \
             Suggest a fresh angle that converts at lower cost.",
            cpa, target_cpa
        ),
        Cpa::NoConversions => format!(
            "Campaign has not converted yet against a target cost per acquisition of {:.2}. \
             Suggest a fresh angle that drives the first conversions.",
            target_cpa
        ),
    }
}
