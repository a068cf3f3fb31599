//! In-memory store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{FacilityConfigStore, StoreResult, SyncHistoryStore};
use crate::error::SyncError;
use crate::model::{FacilitySyncConfig, SyncChange, SyncLog};
use crate::types::{ApplyStatus, ReviewDecision, SyncLogStatus};

#[derive(Debug, Default)]
struct Inner {
    configs: HashMap<Uuid, FacilitySyncConfig>,
    logs: HashMap<Uuid, SyncLog>,
    changes: HashMap<Uuid, SyncChange>,
}

/// Store backed by process memory.
///
/// Implements both [`FacilityConfigStore`] and [`SyncHistoryStore`]. All
/// state lives behind one lock so the one-active-log check and the insert
/// happen atomically.
#[derive(Debug, Default)]
pub struct MemorySyncStore {
    inner: RwLock<Inner>,
}

impl MemorySyncStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of change rows across all logs.
    pub async fn change_count(&self) -> usize {
        self.inner.read().await.changes.len()
    }
}

#[async_trait]
impl FacilityConfigStore for MemorySyncStore {
    async fn get_config(&self, facility_id: Uuid) -> StoreResult<Option<FacilitySyncConfig>> {
        Ok(self.inner.read().await.configs.get(&facility_id).cloned())
    }

    async fn save_config(&self, config: &FacilitySyncConfig) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .configs
            .insert(config.facility_id, config.clone());
        Ok(())
    }

    async fn update_last_sync(
        &self,
        facility_id: Uuid,
        at: DateTime<Utc>,
        status: SyncLogStatus,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let config = inner
            .configs
            .get_mut(&facility_id)
            .ok_or_else(|| SyncError::config_not_found(facility_id))?;
        config.last_sync_at = Some(at);
        config.last_sync_status = Some(status);
        config.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl SyncHistoryStore for MemorySyncStore {
    async fn create_log(&self, log: &SyncLog) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(active) = inner
            .logs
            .values()
            .find(|l| l.facility_id == log.facility_id && !l.is_terminal())
        {
            return Err(SyncError::already_running(log.facility_id, Some(active.id)));
        }
        inner.logs.insert(log.id, log.clone());
        Ok(())
    }

    async fn update_log(&self, log: &SyncLog) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .logs
            .get_mut(&log.id)
            .ok_or_else(|| SyncError::not_found("SyncLog", log.id))?;
        if existing.is_terminal() {
            return Err(SyncError::invalid_state_transition(
                existing.status.as_str(),
                log.status.as_str(),
            ));
        }
        *existing = log.clone();
        Ok(())
    }

    async fn get_log(&self, id: Uuid) -> StoreResult<Option<SyncLog>> {
        Ok(self.inner.read().await.logs.get(&id).cloned())
    }

    async fn find_active_log(&self, facility_id: Uuid) -> StoreResult<Option<SyncLog>> {
        Ok(self
            .inner
            .read()
            .await
            .logs
            .values()
            .find(|l| l.facility_id == facility_id && !l.is_terminal())
            .cloned())
    }

    async fn list_logs(
        &self,
        facility_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<SyncLog>, i64)> {
        let inner = self.inner.read().await;
        let mut logs: Vec<SyncLog> = inner
            .logs
            .values()
            .filter(|l| l.facility_id == facility_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));

        let total = i64::try_from(logs.len()).unwrap_or(i64::MAX);
        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let page = logs.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn list_logs_by_status(&self, status: SyncLogStatus) -> StoreResult<Vec<SyncLog>> {
        let inner = self.inner.read().await;
        let mut logs: Vec<SyncLog> = inner
            .logs
            .values()
            .filter(|l| l.status == status)
            .cloned()
            .collect();
        logs.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(logs)
    }

    async fn insert_changes(&self, changes: &[SyncChange]) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        for change in changes {
            if !inner.logs.contains_key(&change.sync_log_id) {
                return Err(SyncError::not_found("SyncLog", change.sync_log_id));
            }
        }
        for change in changes {
            inner.changes.insert(change.id, change.clone());
        }
        Ok(())
    }

    async fn get_change(&self, id: Uuid) -> StoreResult<Option<SyncChange>> {
        Ok(self.inner.read().await.changes.get(&id).cloned())
    }

    async fn list_changes(&self, sync_log_id: Uuid) -> StoreResult<Vec<SyncChange>> {
        let inner = self.inner.read().await;
        let mut changes: Vec<SyncChange> = inner
            .changes
            .values()
            .filter(|c| c.sync_log_id == sync_log_id)
            .cloned()
            .collect();
        changes.sort_by_key(|c| c.position);
        Ok(changes)
    }

    async fn record_decision(
        &self,
        change_id: Uuid,
        decision: ReviewDecision,
        reviewer: Option<&str>,
    ) -> StoreResult<SyncChange> {
        let mut inner = self.inner.write().await;
        let change = inner
            .changes
            .get_mut(&change_id)
            .ok_or_else(|| SyncError::not_found("SyncChange", change_id))?;
        if change.is_reviewed {
            return Err(SyncError::AlreadyReviewed { change_id });
        }
        change.is_reviewed = true;
        change.decision = Some(decision);
        change.reviewed_by = reviewer.map(str::to_string);
        change.reviewed_at = Some(Utc::now());
        Ok(change.clone())
    }

    async fn record_apply_outcome(
        &self,
        change_id: Uuid,
        status: ApplyStatus,
        error: Option<&str>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let change = inner
            .changes
            .get_mut(&change_id)
            .ok_or_else(|| SyncError::not_found("SyncChange", change_id))?;
        change.apply_status = status;
        change.apply_error = error.map(str::to_string);
        Ok(())
    }
}
