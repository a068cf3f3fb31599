//! Persisted and returned sync records.

use chrono::{DateTime, Utc};
use fms_provider::config::ProviderConfig;
use fms_provider::types::ProviderType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ApplyStatus, ChangeType, EntityType, ReviewDecision, SyncLogStatus, SyncStep};

/// Per-facility sync configuration.
///
/// Owned by the configuration UI; the engine only writes the last-sync fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilitySyncConfig {
    pub id: Uuid,
    pub facility_id: Uuid,
    pub provider_type: ProviderType,
    pub enabled: bool,
    /// Provider-specific settings handed to the adapter factory.
    pub provider_settings: serde_json::Value,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_status: Option<SyncLogStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FacilitySyncConfig {
    /// Create an enabled configuration.
    #[must_use]
    pub fn new(facility_id: Uuid, provider: ProviderConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            facility_id,
            provider_type: provider.provider_type,
            enabled: true,
            provider_settings: provider.settings,
            last_sync_at: None,
            last_sync_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Provider configuration for the adapter registry.
    #[must_use]
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(self.provider_type.clone()).with_settings(self.provider_settings.clone())
    }
}

/// Counts of detected changes by type, plus errors and warnings of the attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub tenants_added: u32,
    pub tenants_removed: u32,
    pub tenants_updated: u32,
    pub units_added: u32,
    pub units_removed: u32,
    pub units_updated: u32,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl SyncSummary {
    /// Count detected changes by type.
    #[must_use]
    pub fn from_changes(changes: &[SyncChange]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            let counter = match change.change_type {
                ChangeType::TenantAdded => &mut summary.tenants_added,
                ChangeType::TenantRemoved => &mut summary.tenants_removed,
                ChangeType::TenantUpdated => &mut summary.tenants_updated,
                ChangeType::UnitAdded => &mut summary.units_added,
                ChangeType::UnitRemoved => &mut summary.units_removed,
                ChangeType::UnitUpdated => &mut summary.units_updated,
            };
            *counter += 1;
        }
        summary
    }

    /// Total number of detected changes.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.tenants_added
            + self.tenants_removed
            + self.tenants_updated
            + self.units_added
            + self.units_removed
            + self.units_updated
    }

    /// Record an error.
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Record a warning.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// Persisted record of one sync attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLog {
    pub id: Uuid,
    pub facility_id: Uuid,
    pub config_id: Uuid,
    pub status: SyncLogStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub triggered_by: Option<String>,
    pub changes_detected: i32,
    pub changes_applied: i32,
    pub changes_pending: i32,
    pub changes_rejected: i32,
    /// First unrecoverable error of the attempt.
    pub error_message: Option<String>,
    pub summary: SyncSummary,
}

impl SyncLog {
    /// Create a running log.
    #[must_use]
    pub fn start(facility_id: Uuid, config_id: Uuid, triggered_by: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            facility_id,
            config_id,
            status: SyncLogStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            triggered_by,
            changes_detected: 0,
            changes_applied: 0,
            changes_pending: 0,
            changes_rejected: 0,
            error_message: None,
            summary: SyncSummary::default(),
        }
    }

    /// Check if the log reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `applied + pending + rejected <= detected`.
    #[must_use]
    pub fn counters_consistent(&self) -> bool {
        self.changes_applied + self.changes_pending + self.changes_rejected
            <= self.changes_detected
    }

    /// `applied + pending + rejected == detected`.
    #[must_use]
    pub fn counters_conserved(&self) -> bool {
        self.changes_applied + self.changes_pending + self.changes_rejected
            == self.changes_detected
    }

    /// Copy counters from a tally.
    pub fn set_counts(&mut self, counts: ChangeCounts) {
        self.changes_detected = counts.detected;
        self.changes_applied = counts.applied;
        self.changes_pending = counts.pending;
        self.changes_rejected = counts.rejected;
    }
}

/// One detected discrepancy for a single entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncChange {
    pub id: Uuid,
    pub sync_log_id: Uuid,
    /// Detection order within the log.
    pub position: i32,
    pub change_type: ChangeType,
    pub entity_type: EntityType,
    /// FMS identifier, when the record carries one.
    pub external_id: Option<String>,
    /// Key of the record the change is applied to.
    pub entity_key: String,
    pub before_data: Option<serde_json::Value>,
    pub after_data: serde_json::Value,
    pub impact_summary: String,
    pub required_actions: Vec<String>,
    pub requires_review: bool,
    pub is_reviewed: bool,
    pub decision: Option<ReviewDecision>,
    /// `None` for auto-approved changes.
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub apply_status: ApplyStatus,
    pub apply_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SyncChange {
    /// Waiting on a human decision.
    #[must_use]
    pub fn is_pending_review(&self) -> bool {
        !self.is_reviewed
    }

    /// Reviewed and approved.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.is_reviewed && self.decision == Some(ReviewDecision::Approved)
    }

    /// Reviewed and rejected.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.is_reviewed && self.decision == Some(ReviewDecision::Rejected)
    }

    /// Approved but not yet written.
    #[must_use]
    pub fn is_ready_to_apply(&self) -> bool {
        self.is_approved() && self.apply_status == ApplyStatus::NotApplied
    }
}

/// Counters derived from change rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    pub detected: i32,
    pub applied: i32,
    pub pending: i32,
    pub rejected: i32,
}

impl ChangeCounts {
    /// Tally change rows.
    ///
    /// Every change that is neither applied nor rejected counts as pending:
    /// undecided reviews, approved changes not yet written, and failed applies.
    #[must_use]
    pub fn tally(changes: &[SyncChange]) -> Self {
        let mut counts = Self::default();
        for change in changes {
            counts.detected += 1;
            if change.apply_status == ApplyStatus::Applied {
                counts.applied += 1;
            } else if change.is_rejected() {
                counts.rejected += 1;
            } else {
                counts.pending += 1;
            }
        }
        counts
    }
}

/// Result of [`trigger_sync`](crate::orchestrator::SyncOrchestrator::trigger_sync).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerSyncResult {
    /// False when the attempt ended failed or cancelled.
    pub success: bool,
    pub sync_log_id: Uuid,
    pub status: SyncLogStatus,
    pub changes_detected: Vec<SyncChange>,
    pub summary: SyncSummary,
    pub requires_review: bool,
}

/// Live view of an active sync session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatusView {
    pub facility_id: Uuid,
    pub sync_log_id: Uuid,
    pub step: SyncStep,
    pub progress_percentage: u8,
    pub started_at: DateTime<Utc>,
    pub cancel_requested: bool,
    pub changes_detected: u32,
    pub changes_pending: u32,
}

/// Page of sync history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncHistory {
    pub logs: Vec<SyncLog>,
    /// Total logs for the facility, ignoring paging.
    pub total: i64,
}
