//! Batch runner: one job over one campaign or every eligible campaign.

use campaign_core::types::CampaignStatus;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::action_logger::ActionRecord;
use crate::error::{OptimizerError, Result};
use crate::orchestrator::{CampaignOrchestrator, CampaignReport, PassOptions, PassOutcome};

/// Why a job was enqueued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobReason {
    #[default]
    Manual,
    Scheduled,
    StartTrigger,
}

impl std::fmt::Display for JobReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::StartTrigger => write!(f, "start-trigger"),
        }
    }
}

impl std::str::FromStr for JobReason {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "scheduled" => Ok(Self::Scheduled),
            "start-trigger" => Ok(Self::StartTrigger),
            _ => Err(format!("Invalid job reason: {}", s)),
        }
    }
}

/// Job trigger payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    /// Evaluate only this campaign. Absent means every eligible campaign.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<Uuid>,
    /// Narrow the sweep to one owner's campaigns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookback_hours: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creative_id: Option<Uuid>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub reason: JobReason,
}

impl JobPayload {
    pub fn scheduled() -> Self {
        Self {
            reason: JobReason::Scheduled,
            ..Default::default()
        }
    }

    pub fn for_campaign(campaign_id: Uuid, reason: JobReason) -> Self {
        Self {
            campaign_id: Some(campaign_id),
            reason,
            ..Default::default()
        }
    }

    fn pass_options(&self) -> PassOptions {
        PassOptions {
            lookback_hours: self.lookback_hours,
            creative_id: self.creative_id,
            dry_run: self.dry_run,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignOutcome {
    Evaluated,
    NotEligible,
    /// Another pass held the campaign lease.
    Skipped,
    Failed,
}

/// One campaign's entry in a batch result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignResult {
    pub campaign_id: Uuid,
    pub outcome: CampaignOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_status: Option<CampaignStatus>,
    pub actions: Vec<ActionRecord>,
    pub insights: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CampaignResult {
    fn without_report(campaign_id: Uuid, outcome: CampaignOutcome, error: String) -> Self {
        Self {
            campaign_id,
            outcome,
            campaign_status: None,
            actions: Vec::new(),
            insights: Vec::new(),
            error: Some(error),
        }
    }
}

impl From<CampaignReport> for CampaignResult {
    fn from(report: CampaignReport) -> Self {
        Self {
            campaign_id: report.campaign.id,
            outcome: match report.outcome {
                PassOutcome::Evaluated => CampaignOutcome::Evaluated,
                PassOutcome::NotEligible => CampaignOutcome::NotEligible,
            },
            campaign_status: Some(report.campaign.status),
            actions: report.actions,
            insights: report.insights,
            error: None,
        }
    }
}

/// Job result. Always partial-success shaped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// Campaigns attempted, failures included.
    pub campaigns_processed: usize,
    pub reason: JobReason,
    pub dry_run: bool,
    pub results: Vec<CampaignResult>,
}

impl BatchResult {
    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == CampaignOutcome::Failed)
            .count()
    }

    pub fn action_count(&self) -> usize {
        self.results.iter().map(|r| r.actions.len()).sum()
    }
}

pub struct BatchRunner {
    orchestrator: Arc<CampaignOrchestrator>,
}

impl BatchRunner {
    pub fn new(orchestrator: Arc<CampaignOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Arc<CampaignOrchestrator> {
        &self.orchestrator
    }

    /// Run a job. Only failing to list campaigns fails the whole job.
    pub async fn run(&self, payload: &JobPayload) -> Result<BatchResult> {
        info!(
            reason = %payload.reason,
            campaign_id = ?payload.campaign_id,
            owner_id = ?payload.owner_id,
            dry_run = payload.dry_run,
            "Starting optimization job"
        );

        let campaign_ids = match payload.campaign_id {
            Some(id) => vec![id],
            None => {
                self.orchestrator
                    .store()
                    .list_active_auto_optimize_campaign_ids(payload.owner_id)
                    .await?
            }
        };
        info!(count = campaign_ids.len(), "Found eligible campaigns");

        let options = payload.pass_options();
        let concurrency = self.orchestrator.config().campaign_concurrency.max(1);

        // Results keep campaign order whatever the concurrency
        let results: Vec<CampaignResult> = stream::iter(campaign_ids)
            .map(|id| self.run_campaign(id, &options))
            .buffered(concurrency)
            .collect()
            .await;

        let result = BatchResult {
            campaigns_processed: results.len(),
            reason: payload.reason,
            dry_run: payload.dry_run,
            results,
        };

        info!(
            reason = %payload.reason,
            processed = result.campaigns_processed,
            failed = result.failed(),
            actions = result.action_count(),
            "Optimization job complete"
        );

        Ok(result)
    }

    async fn run_campaign(&self, campaign_id: Uuid, options: &PassOptions) -> CampaignResult {
        match self.orchestrator.run_pass(campaign_id, options).await {
            Ok(report) => CampaignResult::from(report),
            Err(e @ OptimizerError::LeaseHeld(_)) => {
                info!(campaign_id = %campaign_id, "Campaign busy, skipping");
                CampaignResult::without_report(campaign_id, CampaignOutcome::Skipped, e.to_string())
            }
            Err(OptimizerError::PassInterrupted {
                source,
                actions,
                insights,
            }) => {
                warn!(
                    campaign_id = %campaign_id,
                    error = %source,
                    applied = actions.len(),
                    "Campaign pass failed part way"
                );
                CampaignResult {
                    actions,
                    insights,
                    ..CampaignResult::without_report(
                        campaign_id,
                        CampaignOutcome::Failed,
                        source.to_string(),
                    )
                }
            }
            Err(e) => {
                warn!(
                    campaign_id = %campaign_id,
                    error = %e,
                    "Failed to optimize campaign"
                );
                CampaignResult::without_report(campaign_id, CampaignOutcome::Failed, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::lease::{CampaignLease, MemoryLease};
    use crate::testing::{self, MockTips};
    use campaign_core::types::ActionType;
    use campaign_core::MemoryCampaignStore;
    use std::time::Duration as StdDuration;

    fn runner(store: Arc<MemoryCampaignStore>, lease: Arc<MemoryLease>, concurrency: usize) -> BatchRunner {
        let mut tips = MockTips::new();
        tips.expect_generate_tips().returning(|_| Ok(testing::tips()));
        let config = OptimizerConfig {
            campaign_concurrency: concurrency,
            ..Default::default()
        };
        BatchRunner::new(Arc::new(CampaignOrchestrator::new(
            store,
            lease,
            Arc::new(tips),
            config,
        )))
    }

    #[test]
    fn test_payload_wire_format() {
        let payload: JobPayload = serde_json::from_value(serde_json::json!({
            "campaignId": "6f1c2b1e-8d8a-4f43-9a3e-0f5f1c2d3e4f",
            "lookbackHours": 48,
            "reason": "start-trigger"
        }))
        .unwrap();
        assert!(payload.campaign_id.is_some());
        assert_eq!(payload.lookback_hours, Some(48));
        assert_eq!(payload.reason, JobReason::StartTrigger);
        assert!(!payload.dry_run);

        assert!(serde_json::from_value::<JobPayload>(serde_json::json!({ "reason": "hourly" })).is_err());
        assert_eq!("Scheduled".parse::<JobReason>(), Ok(JobReason::Scheduled));
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_batch() {
        let store = Arc::new(MemoryCampaignStore::new());
        let (first, _) =
            testing::seeded(&store, testing::campaign(3), &[(500, 10, 3, 90)]).await;
        let (broken, _) =
            testing::seeded(&store, testing::campaign(2), &[(500, 10, 3, 90)]).await;
        let (last, _) = testing::seeded(
            &store,
            testing::campaign(1),
            &[(500, 50, 1, 100), (500, 10, 3, 90)],
        )
        .await;
        store.fail_campaign_reads(broken.id).await;

        let result = runner(store.clone(), Arc::new(MemoryLease::new()), 1)
            .run(&JobPayload::scheduled())
            .await
            .unwrap();

        assert_eq!(result.campaigns_processed, 3);
        assert_eq!(result.failed(), 1);
        let ids: Vec<Uuid> = result.results.iter().map(|r| r.campaign_id).collect();
        assert_eq!(ids, vec![first.id, broken.id, last.id]);

        let failed = &result.results[1];
        assert_eq!(failed.outcome, CampaignOutcome::Failed);
        assert!(failed.error.as_deref().unwrap().contains("unreachable"));

        let winner = &result.results[2];
        assert_eq!(winner.outcome, CampaignOutcome::Evaluated);
        assert_eq!(winner.actions.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_pass_reports_applied_actions() {
        let store = Arc::new(MemoryCampaignStore::new());
        let (campaign, variants) = testing::seeded(
            &store,
            testing::campaign(6),
            &[(500, 5, 0, 200), (500, 10, 3, 90)],
        )
        .await;
        store.fail_campaign_writes(campaign.id).await;

        let result = runner(store.clone(), Arc::new(MemoryLease::new()), 1)
            .run(&JobPayload::for_campaign(campaign.id, JobReason::Manual))
            .await
            .unwrap();

        let failed = &result.results[0];
        assert_eq!(failed.outcome, CampaignOutcome::Failed);
        assert!(failed.error.as_deref().unwrap().contains("unreachable"));

        let reported: Vec<ActionType> = failed.actions.iter().map(|a| a.action_type).collect();
        assert_eq!(
            reported,
            vec![ActionType::VariantPausedCpaTooHigh, ActionType::VariantMutated]
        );
        assert_eq!(failed.actions[0].variant_id, Some(variants[0].id));

        let logged: Vec<ActionType> = store
            .action_log()
            .await
            .iter()
            .map(|e| e.action_type)
            .collect();
        assert_eq!(logged, reported);
    }

    #[tokio::test]
    async fn test_named_campaign_only() {
        let store = Arc::new(MemoryCampaignStore::new());
        let (target, _) =
            testing::seeded(&store, testing::campaign(1), &[(500, 5, 0, 200)]).await;
        let (other, _) =
            testing::seeded(&store, testing::campaign(1), &[(500, 5, 0, 200)]).await;

        let result = runner(store.clone(), Arc::new(MemoryLease::new()), 1)
            .run(&JobPayload::for_campaign(target.id, JobReason::Manual))
            .await
            .unwrap();

        assert_eq!(result.campaigns_processed, 1);
        assert_eq!(result.results[0].campaign_id, target.id);
        assert!(store
            .action_log()
            .await
            .iter()
            .all(|e| e.campaign_id != other.id));
    }

    #[tokio::test]
    async fn test_owner_scoped_sweep() {
        let store = Arc::new(MemoryCampaignStore::new());
        let owner = Uuid::new_v4();
        let mut mine = testing::campaign(1);
        mine.owner_id = Some(owner);
        let (mine, _) = testing::seeded(&store, mine, &[(500, 10, 3, 90)]).await;
        testing::seeded(&store, testing::campaign(1), &[(500, 10, 3, 90)]).await;

        let payload = JobPayload {
            owner_id: Some(owner),
            ..JobPayload::scheduled()
        };
        let result = runner(store, Arc::new(MemoryLease::new()), 1)
            .run(&payload)
            .await
            .unwrap();

        assert_eq!(result.campaigns_processed, 1);
        assert_eq!(result.results[0].campaign_id, mine.id);
    }

    #[tokio::test]
    async fn test_busy_campaign_is_skipped() {
        let store = Arc::new(MemoryCampaignStore::new());
        let (campaign, _) =
            testing::seeded(&store, testing::campaign(1), &[(500, 5, 0, 200)]).await;
        let lease = Arc::new(MemoryLease::new());
        lease
            .try_acquire(campaign.id, StdDuration::from_secs(60))
            .await
            .unwrap();

        let result = runner(store.clone(), lease, 1)
            .run(&JobPayload::for_campaign(campaign.id, JobReason::Manual))
            .await
            .unwrap();

        assert_eq!(result.results[0].outcome, CampaignOutcome::Skipped);
        assert!(store.action_log().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_sweep_matches_sequential() {
        async fn sweep(concurrency: usize) -> Vec<(CampaignOutcome, Vec<ActionType>)> {
            let store = Arc::new(MemoryCampaignStore::new());
            for days in [1, 2, 3, 7] {
                testing::seeded(
                    &store,
                    testing::campaign(days),
                    &[(500, 50, 1, 100), (500, 10, 3, 90), (500, 5, 0, 60)],
                )
                .await;
            }
            runner(store, Arc::new(MemoryLease::new()), concurrency)
                .run(&JobPayload::scheduled())
                .await
                .unwrap()
                .results
                .into_iter()
                .map(|r| {
                    (
                        r.outcome,
                        r.actions.iter().map(|a| a.action_type).collect(),
                    )
                })
                .collect()
        }

        assert_eq!(sweep(1).await, sweep(4).await);
    }

    #[tokio::test]
    async fn test_result_wire_format() {
        let store = Arc::new(MemoryCampaignStore::new());
        let (campaign, _) =
            testing::seeded(&store, testing::campaign(1), &[(500, 10, 3, 90)]).await;

        let result = runner(store, Arc::new(MemoryLease::new()), 1)
            .run(&JobPayload::for_campaign(campaign.id, JobReason::Manual))
            .await
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["campaignsProcessed"], 1);
        assert_eq!(json["results"][0]["campaignId"], campaign.id.to_string());
        assert!(json["results"][0]["actions"].is_array());
        assert!(json["results"][0]["insights"].is_array());
        assert!(json["results"][0].get("error").is_none());
    }
}
