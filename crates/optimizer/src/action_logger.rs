//! Action logger: every automated change goes through here.
//!
//! Live passes hand the change and its audit entry to the store together, so
//! an entry exists exactly when the change landed. Dry-run passes only record
//! what would have been done.

use campaign_core::types::{
    ActionType, CampaignUpdate, NewActionLogEntry, NewVariant, Variant, VariantUpdate,
};
use campaign_core::CampaignStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;

/// An action taken (or planned, in dry run) during a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<Uuid>,
    pub details: serde_json::Value,
}

impl From<&NewActionLogEntry> for ActionRecord {
    fn from(entry: &NewActionLogEntry) -> Self {
        Self {
            action_type: entry.action_type,
            variant_id: entry.variant_id,
            details: entry.details.clone(),
        }
    }
}

/// Per-pass logger bound to one campaign.
pub struct ActionLogger {
    store: Arc<dyn CampaignStore>,
    campaign_id: Uuid,
    dry_run: bool,
    now: DateTime<Utc>,
    records: Vec<ActionRecord>,
}

impl ActionLogger {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        campaign_id: Uuid,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            campaign_id,
            dry_run,
            now,
            records: Vec::new(),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn entry(&self, action_type: ActionType, details: serde_json::Value) -> NewActionLogEntry {
        NewActionLogEntry::new(self.campaign_id, action_type)
            .details(details)
            .at(self.now)
    }

    fn record(&mut self, entry: &NewActionLogEntry) {
        info!(
            campaign_id = %entry.campaign_id,
            variant_id = ?entry.variant_id,
            action = %entry.action_type,
            dry_run = self.dry_run,
            "Optimization action"
        );
        self.records.push(ActionRecord::from(entry));
    }

    /// Apply a guarded variant change with its audit entry.
    ///
    /// Returns `false`, and logs nothing, when the guard no longer holds.
    pub async fn variant_change(
        &mut self,
        variant_id: Uuid,
        update: VariantUpdate,
        action_type: ActionType,
        details: serde_json::Value,
    ) -> Result<bool> {
        let entry = self.entry(action_type, details).variant(variant_id);

        if !self.dry_run && !self.store.update_variant(variant_id, update, &entry).await? {
            debug!(
                campaign_id = %self.campaign_id,
                variant_id = %variant_id,
                action = %action_type,
                "Variant changed concurrently, skipping action"
            );
            return Ok(false);
        }

        self.record(&entry);
        Ok(true)
    }

    /// Apply a version-checked campaign change with its audit entry.
    pub async fn campaign_change(
        &mut self,
        update: &CampaignUpdate,
        action_type: ActionType,
        details: serde_json::Value,
    ) -> Result<bool> {
        let entry = self.entry(action_type, details);

        if !self.dry_run
            && !self
                .store
                .update_campaign(self.campaign_id, update, &entry)
                .await?
        {
            debug!(
                campaign_id = %self.campaign_id,
                expected_version = update.expected_version,
                action = %action_type,
                "Campaign version moved, skipping action"
            );
            return Ok(false);
        }

        self.record(&entry);
        Ok(true)
    }

    /// Create a variant with its audit entry. `None` in dry run.
    pub async fn variant_created(
        &mut self,
        variant: &NewVariant,
        details: serde_json::Value,
    ) -> Result<Option<Variant>> {
        let entry = self
            .entry(ActionType::VariantMutated, details)
            .variant(variant.id);

        let created = if self.dry_run {
            None
        } else {
            Some(self.store.create_variant(variant, &entry).await?)
        };

        self.record(&entry);
        Ok(created)
    }

    /// Record a finding that changes no state.
    pub async fn note(
        &mut self,
        variant_id: Option<Uuid>,
        action_type: ActionType,
        details: serde_json::Value,
    ) -> Result<()> {
        let mut entry = self.entry(action_type, details);
        entry.variant_id = variant_id;

        if !self.dry_run {
            self.store.append_action_log(&entry).await?;
        }

        self.record(&entry);
        Ok(())
    }

    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ActionRecord> {
        self.records
    }
}
