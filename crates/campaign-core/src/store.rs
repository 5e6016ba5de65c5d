//! Persisted store interface consumed by the control loop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::{
    ActionLogEntry, ActionLogFilter, Campaign, CampaignStatus, CampaignUpdate, Creative,
    MetricSample, NewActionLogEntry, NewVariant, RawMetricSums, Variant, VariantUpdate,
};
use crate::{Error, Result};

/// Storage backend for campaigns, variants, metrics and the action log.
///
/// Every mutating call carries the audit entry describing it; implementations
/// must persist the entry atomically with the change, and persist nothing when
/// the change's guard does not hold.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>>;

    /// Fresh query for campaigns the loop may act on.
    async fn list_active_auto_optimize_campaign_ids(
        &self,
        owner_id: Option<Uuid>,
    ) -> Result<Vec<Uuid>>;

    /// Variants of a campaign, oldest first.
    async fn list_variants(&self, campaign_id: Uuid) -> Result<Vec<Variant>>;

    async fn get_creative(&self, id: Uuid) -> Result<Option<Creative>>;

    /// Most recently created creative of a campaign.
    async fn latest_creative(&self, campaign_id: Uuid) -> Result<Option<Creative>>;

    /// Counters summed per variant over samples dated on or after `since`.
    /// Variants without samples are absent from the map.
    async fn sum_metrics_by_variant(
        &self,
        variant_ids: &[Uuid],
        since: DateTime<Utc>,
    ) -> Result<HashMap<Uuid, RawMetricSums>>;

    /// Returns `false` when the update's guard no longer holds.
    async fn update_variant(
        &self,
        id: Uuid,
        update: VariantUpdate,
        entry: &NewActionLogEntry,
    ) -> Result<bool>;

    /// Returns `false` when the stored version differs from the expected one.
    async fn update_campaign(
        &self,
        id: Uuid,
        update: &CampaignUpdate,
        entry: &NewActionLogEntry,
    ) -> Result<bool>;

    async fn create_variant(
        &self,
        variant: &NewVariant,
        entry: &NewActionLogEntry,
    ) -> Result<Variant>;

    async fn append_action_log(&self, entry: &NewActionLogEntry) -> Result<i64>;

    async fn query_action_log(&self, filter: &ActionLogFilter) -> Result<Vec<ActionLogEntry>>;
}

#[derive(Default)]
struct MemoryState {
    campaigns: HashMap<Uuid, Campaign>,
    creatives: Vec<Creative>,
    variants: Vec<Variant>,
    samples: Vec<MetricSample>,
    action_log: Vec<ActionLogEntry>,
    failing_campaigns: Vec<Uuid>,
    failing_campaign_writes: Vec<Uuid>,
}

/// In-memory store for tests and local dry runs.
pub struct MemoryCampaignStore {
    state: Arc<RwLock<MemoryState>>,
    next_log_id: AtomicI64,
    metrics_queries: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryCampaignStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            next_log_id: AtomicI64::new(1),
            metrics_queries: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub async fn insert_campaign(&self, campaign: Campaign) {
        self.state.write().await.campaigns.insert(campaign.id, campaign);
    }

    pub async fn insert_creative(&self, creative: Creative) {
        self.state.write().await.creatives.push(creative);
    }

    pub async fn insert_variant(&self, variant: Variant) {
        self.state.write().await.variants.push(variant);
    }

    pub async fn insert_sample(&self, sample: MetricSample) {
        self.state.write().await.samples.push(sample);
    }

    /// Make every read for this campaign's variants fail like an unreachable database.
    pub async fn fail_campaign_reads(&self, campaign_id: Uuid) {
        self.state.write().await.failing_campaigns.push(campaign_id);
    }

    /// Make every update to this campaign fail like an unreachable database.
    pub async fn fail_campaign_writes(&self, campaign_id: Uuid) {
        self.state.write().await.failing_campaign_writes.push(campaign_id);
    }

    pub async fn campaign(&self, id: Uuid) -> Option<Campaign> {
        self.state.read().await.campaigns.get(&id).cloned()
    }

    pub async fn variant(&self, id: Uuid) -> Option<Variant> {
        self.state
            .read()
            .await
            .variants
            .iter()
            .find(|v| v.id == id)
            .cloned()
    }

    /// Every audit entry, in append order.
    pub async fn action_log(&self) -> Vec<ActionLogEntry> {
        self.state.read().await.action_log.clone()
    }

    /// Number of metrics aggregation queries served.
    pub fn metrics_queries(&self) -> usize {
        self.metrics_queries.load(Ordering::SeqCst)
    }

    /// Number of successful mutating calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn push_entry(&self, state: &mut MemoryState, entry: &NewActionLogEntry) -> i64 {
        let id = self.next_log_id.fetch_add(1, Ordering::SeqCst);
        state.action_log.push(ActionLogEntry {
            id,
            campaign_id: entry.campaign_id,
            variant_id: entry.variant_id,
            action_type: entry.action_type,
            details: entry.details.clone(),
            created_at: entry.created_at,
        });
        self.writes.fetch_add(1, Ordering::SeqCst);
        id
    }
}

impl Default for MemoryCampaignStore {
    fn default() -> Self {
        Self::new()
    }
}

fn unreachable_store(campaign_id: Uuid) -> Error {
    Error::Database(sqlx::Error::Protocol(format!(
        "store unreachable for campaign {}",
        campaign_id
    )))
}

#[async_trait]
impl CampaignStore for MemoryCampaignStore {
    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>> {
        Ok(self.state.read().await.campaigns.get(&id).cloned())
    }

    async fn list_active_auto_optimize_campaign_ids(
        &self,
        owner_id: Option<Uuid>,
    ) -> Result<Vec<Uuid>> {
        let state = self.state.read().await;
        let mut campaigns: Vec<&Campaign> = state
            .campaigns
            .values()
            .filter(|c| c.status == CampaignStatus::Active && c.auto_optimize)
            .filter(|c| owner_id.is_none() || c.owner_id == owner_id)
            .collect();
        campaigns.sort_by_key(|c| c.created_at);
        Ok(campaigns.into_iter().map(|c| c.id).collect())
    }

    async fn list_variants(&self, campaign_id: Uuid) -> Result<Vec<Variant>> {
        let state = self.state.read().await;
        if state.failing_campaigns.contains(&campaign_id) {
            return Err(unreachable_store(campaign_id));
        }
        let mut variants: Vec<Variant> = state
            .variants
            .iter()
            .filter(|v| v.campaign_id == campaign_id)
            .cloned()
            .collect();
        variants.sort_by_key(|v| v.created_at);
        Ok(variants)
    }

    async fn get_creative(&self, id: Uuid) -> Result<Option<Creative>> {
        Ok(self
            .state
            .read()
            .await
            .creatives
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn latest_creative(&self, campaign_id: Uuid) -> Result<Option<Creative>> {
        Ok(self
            .state
            .read()
            .await
            .creatives
            .iter()
            .filter(|c| c.campaign_id == campaign_id)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn sum_metrics_by_variant(
        &self,
        variant_ids: &[Uuid],
        since: DateTime<Utc>,
    ) -> Result<HashMap<Uuid, RawMetricSums>> {
        self.metrics_queries.fetch_add(1, Ordering::SeqCst);
        let since_date = since.date_naive();
        let state = self.state.read().await;

        let mut sums: HashMap<Uuid, RawMetricSums> = HashMap::new();
        for sample in state
            .samples
            .iter()
            .filter(|s| s.date >= since_date && variant_ids.contains(&s.variant_id))
        {
            sums.entry(sample.variant_id)
                .or_default()
                .accumulate(&RawMetricSums::from(sample));
        }
        Ok(sums)
    }

    async fn update_variant(
        &self,
        id: Uuid,
        update: VariantUpdate,
        entry: &NewActionLogEntry,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let variant = state
            .variants
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| Error::not_found("variant", id))?;

        if !update.guard_holds(variant) {
            return Ok(false);
        }
        update.apply(variant);
        self.push_entry(&mut state, entry);
        Ok(true)
    }

    async fn update_campaign(
        &self,
        id: Uuid,
        update: &CampaignUpdate,
        entry: &NewActionLogEntry,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.failing_campaign_writes.contains(&id) {
            return Err(unreachable_store(id));
        }
        let campaign = state
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("campaign", id))?;

        if campaign.version != update.expected_version {
            return Ok(false);
        }
        if let Some(status) = update.status {
            campaign.status = status;
        }
        if let Some(ref metadata) = update.metadata {
            campaign.metadata = metadata.clone();
        }
        campaign.version += 1;
        self.push_entry(&mut state, entry);
        Ok(true)
    }

    async fn create_variant(
        &self,
        variant: &NewVariant,
        entry: &NewActionLogEntry,
    ) -> Result<Variant> {
        let created = Variant {
            id: variant.id,
            campaign_id: variant.campaign_id,
            creative_id: variant.creative_id,
            status: variant.status,
            budget_cents: variant.budget_cents,
            test_group: variant.test_group.clone(),
            platform: variant.platform.clone(),
            targeting: variant.targeting.clone(),
            metadata: variant.metadata.clone(),
            created_at: Utc::now(),
        };

        let mut state = self.state.write().await;
        state.variants.push(created.clone());
        self.push_entry(&mut state, entry);
        Ok(created)
    }

    async fn append_action_log(&self, entry: &NewActionLogEntry) -> Result<i64> {
        let mut state = self.state.write().await;
        Ok(self.push_entry(&mut state, entry))
    }

    async fn query_action_log(&self, filter: &ActionLogFilter) -> Result<Vec<ActionLogEntry>> {
        let state = self.state.read().await;
        let offset = filter.offset.unwrap_or(0) as usize;
        let limit = filter.limit.unwrap_or(100) as usize;

        Ok(state
            .action_log
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
