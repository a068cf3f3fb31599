//! In-memory sync sessions.
//!
//! A session exists for every facility with a non-terminal sync. It carries
//! the live step and progress that status queries read, and the flags other
//! callers use to steer the driving task.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::model::SyncStatusView;
use crate::types::SyncStep;

/// Live state of one sync attempt.
#[derive(Debug)]
pub struct SyncSession {
    facility_id: Uuid,
    sync_log_id: Uuid,
    started_at: DateTime<Utc>,
    step: RwLock<SyncStep>,
    progress: AtomicU8,
    cancel_requested: AtomicBool,
    changes_detected: AtomicU32,
    changes_pending: AtomicU32,
    driver: Arc<Mutex<()>>,
}

impl SyncSession {
    /// Create a session in the connecting step.
    #[must_use]
    pub fn new(facility_id: Uuid, sync_log_id: Uuid) -> Self {
        Self::with_step(facility_id, sync_log_id, SyncStep::Connecting, 0)
    }

    /// Create a session at a given step, e.g. when restoring a paused review.
    #[must_use]
    pub fn with_step(facility_id: Uuid, sync_log_id: Uuid, step: SyncStep, progress: u8) -> Self {
        Self {
            facility_id,
            sync_log_id,
            started_at: Utc::now(),
            step: RwLock::new(step),
            progress: AtomicU8::new(progress.min(100)),
            cancel_requested: AtomicBool::new(false),
            changes_detected: AtomicU32::new(0),
            changes_pending: AtomicU32::new(0),
            driver: Arc::new(Mutex::new(())),
        }
    }

    pub fn facility_id(&self) -> Uuid {
        self.facility_id
    }

    pub fn sync_log_id(&self) -> Uuid {
        self.sync_log_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Current step.
    pub async fn step(&self) -> SyncStep {
        *self.step.read().await
    }

    /// Published progress percentage.
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }

    /// Move to `step` and raise progress to at least `progress`.
    ///
    /// Progress never decreases; the returned value is the progress actually
    /// published. A terminal step is never left.
    pub async fn advance(&self, step: SyncStep, progress: u8) -> u8 {
        let mut current = self.step.write().await;
        if !current.is_terminal() {
            *current = step;
        }
        let previous = self.progress.fetch_max(progress.min(100), Ordering::SeqCst);
        previous.max(progress.min(100))
    }

    /// Move to a terminal step unless the session already reached one.
    ///
    /// Returns the published progress, or `None` when another caller
    /// finished the session first.
    pub async fn finish(&self, step: SyncStep, progress: u8) -> Option<u8> {
        let mut current = self.step.write().await;
        if current.is_terminal() {
            return None;
        }
        *current = step;
        let previous = self.progress.fetch_max(progress.min(100), Ordering::SeqCst);
        Some(previous.max(progress.min(100)))
    }

    /// Ask the driving task to stop. Returns false if already requested.
    pub fn request_cancel(&self) -> bool {
        !self.cancel_requested.swap(true, Ordering::SeqCst)
    }

    /// Check whether cancellation was requested.
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Record change counters for status queries.
    pub fn set_counts(&self, detected: u32, pending: u32) {
        self.changes_detected.store(detected, Ordering::SeqCst);
        self.changes_pending.store(pending, Ordering::SeqCst);
    }

    /// Wait for exclusive right to drive the session.
    pub async fn drive(&self) -> OwnedMutexGuard<()> {
        self.driver.clone().lock_owned().await
    }

    /// Take the right to drive the session if nobody holds it.
    pub fn try_drive(&self) -> Option<OwnedMutexGuard<()>> {
        self.driver.clone().try_lock_owned().ok()
    }

    /// Snapshot for status queries.
    pub async fn view(&self) -> SyncStatusView {
        SyncStatusView {
            facility_id: self.facility_id,
            sync_log_id: self.sync_log_id,
            step: self.step().await,
            progress_percentage: self.progress(),
            started_at: self.started_at,
            cancel_requested: self.is_cancel_requested(),
            changes_detected: self.changes_detected.load(Ordering::SeqCst),
            changes_pending: self.changes_pending.load(Ordering::SeqCst),
        }
    }
}

/// At most one session per facility.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<SyncSession>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session unless the facility already has one.
    ///
    /// On conflict the existing session is returned as the error.
    pub async fn insert(&self, session: Arc<SyncSession>) -> Result<(), Arc<SyncSession>> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&session.facility_id()) {
            return Err(existing.clone());
        }
        sessions.insert(session.facility_id(), session);
        Ok(())
    }

    /// Active session for a facility.
    pub async fn get(&self, facility_id: Uuid) -> Option<Arc<SyncSession>> {
        self.sessions.read().await.get(&facility_id).cloned()
    }

    /// Active session driving a given log.
    pub async fn find_by_log(&self, sync_log_id: Uuid) -> Option<Arc<SyncSession>> {
        self.sessions
            .read()
            .await
            .values()
            .find(|s| s.sync_log_id() == sync_log_id)
            .cloned()
    }

    /// Check if a facility has an active session.
    pub async fn contains(&self, facility_id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&facility_id)
    }

    /// Remove the facility's session if it still belongs to `sync_log_id`.
    pub async fn remove(&self, facility_id: Uuid, sync_log_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&facility_id) {
            Some(s) if s.sync_log_id() == sync_log_id => {
                sessions.remove(&facility_id);
                true
            }
            _ => false,
        }
    }

    /// Number of active sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Check if no session is active.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
