//! Persistence for sync configuration, logs and changes.
//!
//! - [`memory::MemorySyncStore`] keeps everything in process memory
//! - [`postgres::PgSyncStore`] persists to PostgreSQL via `sqlx`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::SyncResult;
use crate::model::{FacilitySyncConfig, SyncChange, SyncLog};
use crate::types::{ApplyStatus, ReviewDecision, SyncLogStatus};

pub mod memory;
pub mod postgres;

pub use memory::MemorySyncStore;
pub use postgres::PgSyncStore;

/// Result type for store operations.
pub type StoreResult<T> = SyncResult<T>;

/// Facility sync configuration, owned by the configuration UI.
#[async_trait]
pub trait FacilityConfigStore: Send + Sync {
    /// Configuration for a facility.
    async fn get_config(&self, facility_id: Uuid) -> StoreResult<Option<FacilitySyncConfig>>;

    /// Create or replace a configuration.
    async fn save_config(&self, config: &FacilitySyncConfig) -> StoreResult<()>;

    /// Record the outcome of the latest finished sync.
    async fn update_last_sync(
        &self,
        facility_id: Uuid,
        at: DateTime<Utc>,
        status: SyncLogStatus,
    ) -> StoreResult<()>;
}

/// Audit trail of sync attempts and their changes.
#[async_trait]
pub trait SyncHistoryStore: Send + Sync {
    /// Insert a new log.
    ///
    /// Fails with [`SyncError::AlreadyRunning`](crate::error::SyncError::AlreadyRunning)
    /// when the facility already has a non-terminal log.
    async fn create_log(&self, log: &SyncLog) -> StoreResult<()>;

    /// Persist status, counters and summary.
    ///
    /// Terminal logs are append-only; updating one is an invalid transition.
    async fn update_log(&self, log: &SyncLog) -> StoreResult<()>;

    async fn get_log(&self, id: Uuid) -> StoreResult<Option<SyncLog>>;

    /// The facility's non-terminal log, if any.
    async fn find_active_log(&self, facility_id: Uuid) -> StoreResult<Option<SyncLog>>;

    /// Logs for a facility, newest first, with the unpaged total.
    async fn list_logs(
        &self,
        facility_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<SyncLog>, i64)>;

    /// Logs in a status across all facilities.
    async fn list_logs_by_status(&self, status: SyncLogStatus) -> StoreResult<Vec<SyncLog>>;

    async fn insert_changes(&self, changes: &[SyncChange]) -> StoreResult<()>;

    async fn get_change(&self, id: Uuid) -> StoreResult<Option<SyncChange>>;

    /// Changes of one log in detection order.
    async fn list_changes(&self, sync_log_id: Uuid) -> StoreResult<Vec<SyncChange>>;

    /// Record a reviewer decision; fails if one was already recorded.
    async fn record_decision(
        &self,
        change_id: Uuid,
        decision: ReviewDecision,
        reviewer: Option<&str>,
    ) -> StoreResult<SyncChange>;

    /// Record the applier's outcome for a change.
    async fn record_apply_outcome(
        &self,
        change_id: Uuid,
        status: ApplyStatus,
        error: Option<&str>,
    ) -> StoreResult<()>;
}
