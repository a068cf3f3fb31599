//! Common types for facility synchronization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Step of the sync state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStep {
    /// No sync in progress.
    Idle,
    /// Building the provider and probing the connection.
    Connecting,
    /// Fetching the external snapshot.
    Fetching,
    /// Diffing external against internal state.
    Detecting,
    /// Classifying and persisting changes.
    Preparing,
    /// Waiting for review decisions.
    ReviewNeeded,
    /// Applying approved changes.
    Applying,
    /// Every change resolved.
    Completed,
    /// Cancelled by a caller.
    Cancelled,
    /// Unrecoverable error.
    Failed,
}

impl SyncStep {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStep::Idle => "idle",
            SyncStep::Connecting => "connecting",
            SyncStep::Fetching => "fetching",
            SyncStep::Detecting => "detecting",
            SyncStep::Preparing => "preparing",
            SyncStep::ReviewNeeded => "review_needed",
            SyncStep::Applying => "applying",
            SyncStep::Completed => "completed",
            SyncStep::Cancelled => "cancelled",
            SyncStep::Failed => "failed",
        }
    }

    /// Check if this is a terminal step.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncStep::Completed | SyncStep::Cancelled | SyncStep::Failed
        )
    }

    /// Check if a cancel request is still meaningful.
    #[must_use]
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal() && *self != SyncStep::Idle
    }

    /// Check if the attempt has written nothing besides its log yet.
    #[must_use]
    pub fn is_before_persist(&self) -> bool {
        matches!(self, SyncStep::Connecting | SyncStep::Fetching)
    }
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a persisted sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncLogStatus {
    /// Sync is in progress.
    Running,
    /// Paused until pending changes are decided.
    ReviewNeeded,
    /// Every change resolved.
    Completed,
    /// Cancelled by a caller.
    Cancelled,
    /// Unrecoverable error.
    Failed,
}

impl SyncLogStatus {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncLogStatus::Running => "running",
            SyncLogStatus::ReviewNeeded => "review_needed",
            SyncLogStatus::Completed => "completed",
            SyncLogStatus::Cancelled => "cancelled",
            SyncLogStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncLogStatus::Completed | SyncLogStatus::Cancelled | SyncLogStatus::Failed
        )
    }

    /// Log status matching a terminal step.
    #[must_use]
    pub fn from_terminal_step(step: SyncStep) -> Option<Self> {
        match step {
            SyncStep::Completed => Some(SyncLogStatus::Completed),
            SyncStep::Cancelled => Some(SyncLogStatus::Cancelled),
            SyncStep::Failed => Some(SyncLogStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for SyncLogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SyncLogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "running" => Ok(SyncLogStatus::Running),
            "review_needed" => Ok(SyncLogStatus::ReviewNeeded),
            "completed" => Ok(SyncLogStatus::Completed),
            "cancelled" => Ok(SyncLogStatus::Cancelled),
            "failed" => Ok(SyncLogStatus::Failed),
            _ => Err(format!("Unknown sync log status: {s}")),
        }
    }
}

/// Kind of record a change targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A tenant.
    Tenant,
    /// A storage unit.
    Unit,
}

impl EntityType {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Tenant => "tenant",
            EntityType::Unit => "unit",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tenant" => Ok(EntityType::Tenant),
            "unit" => Ok(EntityType::Unit),
            _ => Err(format!("Unknown entity type: {s}")),
        }
    }
}

/// Type of change detected between the FMS and internal records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Tenant exists only in the FMS.
    TenantAdded,
    /// Linked tenant no longer in the FMS.
    TenantRemoved,
    /// Tracked tenant fields differ.
    TenantUpdated,
    /// Unit exists only in the FMS.
    UnitAdded,
    /// Linked unit no longer in the FMS.
    UnitRemoved,
    /// Tracked unit fields differ.
    UnitUpdated,
}

impl ChangeType {
    /// All change types in detection order.
    pub const ALL: [ChangeType; 6] = [
        ChangeType::TenantAdded,
        ChangeType::TenantRemoved,
        ChangeType::TenantUpdated,
        ChangeType::UnitAdded,
        ChangeType::UnitRemoved,
        ChangeType::UnitUpdated,
    ];

    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::TenantAdded => "tenant_added",
            ChangeType::TenantRemoved => "tenant_removed",
            ChangeType::TenantUpdated => "tenant_updated",
            ChangeType::UnitAdded => "unit_added",
            ChangeType::UnitRemoved => "unit_removed",
            ChangeType::UnitUpdated => "unit_updated",
        }
    }

    /// Entity the change targets.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        match self {
            ChangeType::TenantAdded | ChangeType::TenantRemoved | ChangeType::TenantUpdated => {
                EntityType::Tenant
            }
            ChangeType::UnitAdded | ChangeType::UnitRemoved | ChangeType::UnitUpdated => {
                EntityType::Unit
            }
        }
    }

    /// Check if this is an addition.
    #[must_use]
    pub fn is_addition(&self) -> bool {
        matches!(self, ChangeType::TenantAdded | ChangeType::UnitAdded)
    }

    /// Check if this is a removal.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        matches!(self, ChangeType::TenantRemoved | ChangeType::UnitRemoved)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChangeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown change type: {s}"))
    }
}

/// Reviewer decision on a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Change may be applied.
    Approved,
    /// Change is discarded.
    Rejected,
}

impl ReviewDecision {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Approved => "approved",
            ReviewDecision::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReviewDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approved" | "approve" => Ok(ReviewDecision::Approved),
            "rejected" | "reject" => Ok(ReviewDecision::Rejected),
            _ => Err(format!("Unknown review decision: {s}")),
        }
    }
}

/// What the review gate does with a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    /// Apply without human review.
    AutoApply,
    /// Hold until a reviewer decides.
    RequiresReview,
}

impl ReviewAction {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::AutoApply => "auto_apply",
            ReviewAction::RequiresReview => "requires_review",
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Apply outcome recorded on a change row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    /// Not applied (yet, or ever).
    NotApplied,
    /// Written to internal records.
    Applied,
    /// Apply attempted and failed.
    Failed,
}

impl ApplyStatus {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyStatus::NotApplied => "not_applied",
            ApplyStatus::Applied => "applied",
            ApplyStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ApplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ApplyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_applied" => Ok(ApplyStatus::NotApplied),
            "applied" => Ok(ApplyStatus::Applied),
            "failed" => Ok(ApplyStatus::Failed),
            _ => Err(format!("Unknown apply status: {s}")),
        }
    }
}
