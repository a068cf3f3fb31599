//! Sync orchestrator.
//!
//! Drives one facility sync through its state machine:
//!
//! ```text
//! connecting -> fetching -> detecting -> preparing -> [review_needed] -> applying
//!            -> completed | cancelled | failed
//! ```
//!
//! The orchestrator owns per-facility exclusivity through the
//! [`SessionRegistry`], publishes every step and progress change on the
//! [`SyncEventPublisher`], and records each attempt in the history store.
//! Provider failures and cancellation end the attempt without surfacing as an
//! `Err`; callers only see errors for requests that could not start or were
//! invalid.

use chrono::Utc;
use fms_provider::config::ProviderConfig;
use fms_provider::error::ProviderError;
use fms_provider::registry::ProviderRegistry;
use fms_provider::resilience::RetryExecutor;
use fms_provider::traits::FmsProvider;
use fms_provider::types::FacilitySnapshot;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::applier::{ApplyOutcome, ChangeApplier};
use crate::config::EngineConfig;
use crate::detector::{detect_changes, DetectedChange};
use crate::error::{SyncError, SyncResult};
use crate::events::{SyncEvent, SyncEventKind, SyncEventPublisher};
use crate::model::{
    ChangeCounts, FacilitySyncConfig, SyncChange, SyncHistory, SyncLog, SyncStatusView,
    SyncSummary, TriggerSyncResult,
};
use crate::records::FacilityRecords;
use crate::review::{partition, GatedChange};
use crate::session::{SessionRegistry, SyncSession};
use crate::store::{FacilityConfigStore, SyncHistoryStore};
use crate::types::{ApplyStatus, ReviewDecision, SyncLogStatus, SyncStep};

/// Maximum bytes of a malformed payload written to the log.
const RAW_PAYLOAD_LOG_LIMIT: usize = 2048;

/// Default page size for history queries.
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;

/// Largest page size for history queries.
pub const MAX_HISTORY_LIMIT: i64 = 100;

/// Published progress for each point of the state machine.
mod progress {
    pub const CONNECTING: u8 = 5;
    pub const CONNECTED: u8 = 10;
    pub const FETCHING: u8 = 15;
    pub const FETCHED: u8 = 40;
    pub const DETECTING: u8 = 50;
    pub const PREPARING: u8 = 60;
    pub const PREPARED: u8 = 70;
    pub const REVIEW_NEEDED: u8 = 75;
    pub const APPLYING: u8 = 80;
    pub const APPLIED: u8 = 99;
    pub const COMPLETED: u8 = 100;
}

/// Why a pipeline stopped before completing.
enum Halt {
    Cancelled,
    Failed(SyncError),
}

impl From<SyncError> for Halt {
    fn from(e: SyncError) -> Self {
        Halt::Failed(e)
    }
}

impl From<ProviderError> for Halt {
    fn from(e: ProviderError) -> Self {
        Halt::Failed(SyncError::Provider(e))
    }
}

/// Where the pipeline left the attempt.
enum Stage {
    AwaitingReview,
    Completed,
}

/// Outcome of [`SyncOrchestrator::recover`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Logs left running by a previous process, now failed.
    pub interrupted: usize,
    /// Paused reviews whose sessions were restored.
    pub reviews_restored: usize,
}

struct Inner {
    config: EngineConfig,
    providers: ProviderRegistry,
    configs: Arc<dyn FacilityConfigStore>,
    history: Arc<dyn SyncHistoryStore>,
    records: Arc<dyn FacilityRecords>,
    applier: ChangeApplier,
    retry: RetryExecutor,
    sessions: SessionRegistry,
    events: SyncEventPublisher,
}

/// Facility sync engine.
///
/// Cheap to clone; clones share sessions, stores and the event channel.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

impl SyncOrchestrator {
    /// Create an orchestrator.
    pub fn new(
        config: EngineConfig,
        providers: ProviderRegistry,
        configs: Arc<dyn FacilityConfigStore>,
        history: Arc<dyn SyncHistoryStore>,
        records: Arc<dyn FacilityRecords>,
    ) -> SyncResult<Self> {
        config.validate()?;
        let events = SyncEventPublisher::new(config.event_capacity);
        let retry = RetryExecutor::new(config.retry.clone());
        let applier = ChangeApplier::new(records.clone());
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                providers,
                configs,
                history,
                records,
                applier,
                retry,
                sessions: SessionRegistry::new(),
                events,
            }),
        })
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Subscribe to sync events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Start a sync for a facility and drive it as far as it can go.
    ///
    /// Returns once the attempt is terminal or paused for review. Fails fast
    /// with [`SyncError::AlreadyRunning`] when the facility has an active
    /// session; no log is created in that case.
    #[instrument(skip(self, triggered_by))]
    pub async fn trigger_sync(
        &self,
        facility_id: Uuid,
        triggered_by: Option<String>,
    ) -> SyncResult<TriggerSyncResult> {
        let inner = &self.inner;

        if let Some(existing) = inner.sessions.get(facility_id).await {
            return Err(SyncError::already_running(
                facility_id,
                Some(existing.sync_log_id()),
            ));
        }

        let config = inner
            .configs
            .get_config(facility_id)
            .await?
            .ok_or_else(|| SyncError::config_not_found(facility_id))?;
        if !config.enabled {
            return Err(SyncError::disabled(facility_id));
        }

        let mut log = SyncLog::start(facility_id, config.id, triggered_by);
        let session = Arc::new(SyncSession::new(facility_id, log.id));
        let guard = session
            .try_drive()
            .ok_or_else(|| SyncError::internal("new session is already being driven"))?;

        if let Err(existing) = inner.sessions.insert(session.clone()).await {
            return Err(SyncError::already_running(
                facility_id,
                Some(existing.sync_log_id()),
            ));
        }

        if let Err(e) = inner.history.create_log(&log).await {
            inner.sessions.remove(facility_id, log.id).await;
            return Err(e);
        }

        info!(sync_log_id = %log.id, provider_type = %config.provider_type, "Sync started");

        let stage = self.run_pipeline(&session, &config, &mut log).await;
        let outcome = match stage {
            Ok(Stage::AwaitingReview) => Ok(()),
            Ok(Stage::Completed) => {
                self.finalize(&session, &mut log, SyncLogStatus::Completed, None)
                    .await
            }
            Err(Halt::Cancelled) => {
                self.finalize(&session, &mut log, SyncLogStatus::Cancelled, None)
                    .await
            }
            Err(Halt::Failed(e)) => {
                warn!(sync_log_id = %log.id, error_code = e.error_code(), error = %e, "Sync failed");
                self.finalize(&session, &mut log, SyncLogStatus::Failed, Some(e.to_string()))
                    .await
            }
        };
        drop(guard);
        outcome?;

        // A cancel that raced the pause found the driver busy; honour it now.
        if session.is_cancel_requested() {
            self.cancel_now(&session).await?;
        }

        self.get_sync_result(log.id).await
    }

    /// Live status of the facility's sync, `None` when idle.
    pub async fn get_sync_status(&self, facility_id: Uuid) -> Option<SyncStatusView> {
        match self.inner.sessions.get(facility_id).await {
            Some(session) => Some(session.view().await),
            None => None,
        }
    }

    /// Check whether a sync could start now.
    pub async fn can_start_new_sync(&self, facility_id: Uuid) -> SyncResult<bool> {
        if self.inner.sessions.contains(facility_id).await {
            return Ok(false);
        }
        Ok(self
            .inner
            .history
            .find_active_log(facility_id)
            .await?
            .is_none())
    }

    /// Request cancellation of the facility's sync.
    ///
    /// A sync paused for review or still waiting on the provider is cancelled
    /// right away and the facility is free again when this returns; a late
    /// provider result is discarded. Once changes are being persisted the
    /// driver stops at its next check. Returns false when there is nothing to
    /// cancel.
    #[instrument(skip(self))]
    pub async fn cancel_sync(&self, facility_id: Uuid) -> SyncResult<bool> {
        let Some(session) = self.inner.sessions.get(facility_id).await else {
            return Ok(false);
        };
        if !session.step().await.can_cancel() {
            return Ok(false);
        }

        if session.request_cancel() {
            info!(sync_log_id = %session.sync_log_id(), "Sync cancellation requested");
        }
        self.cancel_now(&session).await?;
        Ok(true)
    }

    /// Page through a facility's sync history, newest first.
    #[instrument(skip(self))]
    pub async fn get_sync_history(
        &self,
        facility_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> SyncResult<SyncHistory> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        let offset = offset.unwrap_or(0).max(0);
        let (logs, total) = self
            .inner
            .history
            .list_logs(facility_id, limit, offset)
            .await?;
        Ok(SyncHistory { logs, total })
    }

    /// Changes detected by one sync attempt, in detection order.
    pub async fn get_sync_changes(&self, sync_log_id: Uuid) -> SyncResult<Vec<SyncChange>> {
        if self.inner.history.get_log(sync_log_id).await?.is_none() {
            return Err(SyncError::not_found("SyncLog", sync_log_id));
        }
        self.inner.history.list_changes(sync_log_id).await
    }

    /// Record a reviewer decision and resume the sync once nothing is undecided.
    ///
    /// When the last pending change is decided, approved changes are applied
    /// before this call returns.
    #[instrument(skip(self, reviewer))]
    pub async fn review_change(
        &self,
        change_id: Uuid,
        decision: ReviewDecision,
        reviewer: Option<String>,
    ) -> SyncResult<SyncChange> {
        let inner = &self.inner;

        let change = inner
            .history
            .get_change(change_id)
            .await?
            .ok_or_else(|| SyncError::not_found("SyncChange", change_id))?;
        if change.is_reviewed {
            return Err(SyncError::AlreadyReviewed { change_id });
        }

        let mut log = inner
            .history
            .get_log(change.sync_log_id)
            .await?
            .ok_or_else(|| SyncError::not_found("SyncLog", change.sync_log_id))?;
        if log.status != SyncLogStatus::ReviewNeeded {
            return Err(SyncError::invalid_state_transition(
                log.status.as_str(),
                "reviewed",
            ));
        }

        let session = self.session_for_review(&log).await?;
        let guard = session.drive().await;
        if session.step().await.is_terminal() {
            return Err(SyncError::invalid_state_transition(
                session.step().await.as_str(),
                "reviewed",
            ));
        }

        inner
            .history
            .record_decision(change_id, decision, reviewer.as_deref())
            .await?;
        info!(
            sync_log_id = %log.id,
            change_id = %change_id,
            decision = %decision,
            "Change reviewed"
        );
        self.publish(
            &session,
            SyncEventKind::ChangeReviewed {
                change_id,
                decision,
            },
        );

        let changes = inner.history.list_changes(log.id).await?;
        let undecided = changes.iter().filter(|c| c.is_pending_review()).count();
        log.set_counts(ChangeCounts::tally(&changes));
        inner.history.update_log(&log).await?;
        session.set_counts(count_u32(changes.len()), count_u32(undecided));

        if session.is_cancel_requested() {
            self.finalize(&session, &mut log, SyncLogStatus::Cancelled, None)
                .await?;
        } else if undecided == 0 {
            info!(sync_log_id = %log.id, "All changes reviewed, resuming sync");
            match self.apply_approved(&session, &mut log).await {
                Ok(()) => {
                    self.finalize(&session, &mut log, SyncLogStatus::Completed, None)
                        .await?;
                }
                Err(Halt::Cancelled) => {
                    self.finalize(&session, &mut log, SyncLogStatus::Cancelled, None)
                        .await?;
                }
                Err(Halt::Failed(e)) => {
                    self.finalize(&session, &mut log, SyncLogStatus::Failed, Some(e.to_string()))
                        .await?;
                }
            }
        }
        drop(guard);

        inner
            .history
            .get_change(change_id)
            .await?
            .ok_or_else(|| SyncError::not_found("SyncChange", change_id))
    }

    /// Probe a provider configuration outside of any session.
    pub async fn test_connection(&self, config: &ProviderConfig) -> bool {
        let probe = self.inner.providers.test_connection(config);
        tokio::time::timeout(self.inner.config.connect_timeout(), probe)
            .await
            .unwrap_or_else(|_| {
                warn!(provider_type = %config.provider_type, "FMS connection test timed out");
                false
            })
    }

    /// Reconcile persisted state after a restart.
    ///
    /// Logs still `running` without a live session were interrupted and are
    /// marked failed. Logs paused in `review_needed` get their sessions back so
    /// reviews can continue; they never expire.
    #[instrument(skip(self))]
    pub async fn recover(&self) -> SyncResult<RecoveryReport> {
        let inner = &self.inner;
        let mut report = RecoveryReport::default();

        for mut log in inner
            .history
            .list_logs_by_status(SyncLogStatus::Running)
            .await?
        {
            if inner.sessions.contains(log.facility_id).await {
                continue;
            }
            let changes = inner.history.list_changes(log.id).await?;
            log.set_counts(ChangeCounts::tally(&changes));
            log.status = SyncLogStatus::Failed;
            log.completed_at = Some(Utc::now());
            let message = "interrupted: sync was still running when the engine stopped";
            log.error_message = Some(message.to_string());
            log.summary.add_error(message);
            inner.history.update_log(&log).await?;
            self.record_last_sync(&log).await;
            warn!(sync_log_id = %log.id, facility_id = %log.facility_id, "Interrupted sync marked failed");
            report.interrupted += 1;
        }

        for log in inner
            .history
            .list_logs_by_status(SyncLogStatus::ReviewNeeded)
            .await?
        {
            if inner.sessions.contains(log.facility_id).await {
                continue;
            }
            self.session_for_review(&log).await?;
            report.reviews_restored += 1;
        }

        info!(
            interrupted = report.interrupted,
            reviews_restored = report.reviews_restored,
            "Sync recovery finished"
        );
        Ok(report)
    }

    async fn run_pipeline(
        &self,
        session: &SyncSession,
        config: &FacilitySyncConfig,
        log: &mut SyncLog,
    ) -> Result<Stage, Halt> {
        let provider = self.connect(session, &config.provider_config()).await?;
        let external = self.fetch(session, provider.as_ref()).await?;

        self.advance(session, SyncStep::Detecting, progress::DETECTING)
            .await;
        let internal = self
            .inner
            .records
            .load_snapshot(session.facility_id())
            .await
            .map_err(|e| SyncError::store(format!("cannot load facility records: {e}")))?;
        let detection = detect_changes(&external, &internal);
        debug!(
            sync_log_id = %log.id,
            changes = detection.changes.len(),
            "Changes detected"
        );
        check_cancel(session)?;

        self.advance(session, SyncStep::Preparing, progress::PREPARING)
            .await;
        let gated = partition(&self.inner.config.review_policy, detection.changes);
        let requires_review = gated.iter().any(GatedChange::requires_review);
        let rows = gated
            .into_iter()
            .enumerate()
            .map(|(position, gated)| change_row(log.id, position, gated))
            .collect::<SyncResult<Vec<_>>>()?;

        self.inner.history.insert_changes(&rows).await?;

        let mut summary = SyncSummary::from_changes(&rows);
        for warning in detection.warnings {
            summary.add_warning(warning);
        }
        log.summary = summary;
        log.set_counts(ChangeCounts::tally(&rows));
        self.inner.history.update_log(log).await?;

        let undecided = rows.iter().filter(|c| c.is_pending_review()).count();
        session.set_counts(count_u32(rows.len()), count_u32(undecided));
        self.publish(
            session,
            SyncEventKind::ChangesDetected {
                count: rows.len(),
                requires_review,
            },
        );
        self.advance(session, SyncStep::Preparing, progress::PREPARED)
            .await;
        check_cancel(session)?;

        if requires_review {
            log.status = SyncLogStatus::ReviewNeeded;
            self.inner.history.update_log(log).await?;
            self.advance(session, SyncStep::ReviewNeeded, progress::REVIEW_NEEDED)
                .await;
            info!(
                sync_log_id = %log.id,
                pending = undecided,
                "Sync paused for review"
            );
            return Ok(Stage::AwaitingReview);
        }

        self.apply_approved(session, log).await?;
        Ok(Stage::Completed)
    }

    async fn connect(
        &self,
        session: &SyncSession,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn FmsProvider>, Halt> {
        check_cancel(session)?;
        self.advance(session, SyncStep::Connecting, progress::CONNECTING)
            .await;

        let timeout = self.inner.config.connect_timeout();
        let attempt = async {
            let provider = self.inner.providers.create(config)?;
            self.inner
                .retry
                .execute_until(|| provider.test_connection(), || session.is_cancel_requested())
                .await?;
            Ok::<_, ProviderError>(provider)
        };

        let result = tokio::time::timeout(timeout, attempt).await.unwrap_or(Err(
            ProviderError::Timeout {
                timeout_secs: self.inner.config.connect_timeout_secs,
            },
        ));
        check_cancel(session)?;
        let provider = result?;

        self.advance(session, SyncStep::Connecting, progress::CONNECTED)
            .await;
        debug!(provider = provider.display_name(), "FMS connection established");
        Ok(provider)
    }

    async fn fetch(
        &self,
        session: &SyncSession,
        provider: &dyn FmsProvider,
    ) -> Result<FacilitySnapshot, Halt> {
        check_cancel(session)?;
        self.advance(session, SyncStep::Fetching, progress::FETCHING)
            .await;

        let facility_id = session.facility_id();
        let fetch = self.inner.retry.execute_until(
            || provider.fetch_snapshot(facility_id),
            || session.is_cancel_requested(),
        );
        let result = tokio::time::timeout(self.inner.config.fetch_timeout(), fetch).await;

        // The in-flight call is never aborted; its result is dropped instead.
        check_cancel(session)?;

        let snapshot = match result {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                if let Some(raw) = e.raw_payload_preview(RAW_PAYLOAD_LOG_LIMIT) {
                    warn!(
                        sync_log_id = %session.sync_log_id(),
                        raw_payload = raw,
                        error = %e,
                        "FMS returned a malformed snapshot"
                    );
                }
                return Err(e.into());
            }
            Err(_) => {
                return Err(Halt::Failed(SyncError::FetchTimeout {
                    timeout_secs: self.inner.config.fetch_timeout_secs,
                }));
            }
        };

        self.advance(session, SyncStep::Fetching, progress::FETCHED)
            .await;
        debug!(
            tenants = snapshot.tenants.len(),
            units = snapshot.units.len(),
            "FMS snapshot fetched"
        );
        Ok(snapshot)
    }

    /// Apply every reviewed change that has not been handled yet.
    async fn apply_approved(&self, session: &SyncSession, log: &mut SyncLog) -> Result<(), Halt> {
        check_cancel(session)?;
        self.advance(session, SyncStep::Applying, progress::APPLYING)
            .await;

        let changes = self.inner.history.list_changes(log.id).await?;
        let ready: Vec<&SyncChange> = changes
            .iter()
            .filter(|c| c.is_reviewed && c.apply_status == ApplyStatus::NotApplied)
            .collect();
        let total = ready.len();

        for (done, change) in ready.into_iter().enumerate() {
            check_cancel(session)?;

            let outcome = self
                .inner
                .applier
                .apply(session.facility_id(), change)
                .await;
            match &outcome {
                ApplyOutcome::Applied => {
                    self.inner
                        .history
                        .record_apply_outcome(change.id, ApplyStatus::Applied, None)
                        .await?;
                }
                ApplyOutcome::Error(message) => {
                    self.inner
                        .history
                        .record_apply_outcome(change.id, ApplyStatus::Failed, Some(message.as_str()))
                        .await?;
                    log.summary.add_error(format!(
                        "{} {}: {message}",
                        change.change_type, change.entity_key
                    ));
                }
                ApplyOutcome::Rejected => {}
            }
            self.publish(
                session,
                SyncEventKind::ChangeApplied {
                    change_id: change.id,
                    outcome,
                },
            );

            self.advance(session, SyncStep::Applying, applying_progress(done + 1, total))
                .await;
        }
        Ok(())
    }

    /// Record a terminal status and tear the session down.
    ///
    /// Only the first caller to finish a session records anything. The
    /// session is removed even when persisting fails.
    async fn finalize(
        &self,
        session: &SyncSession,
        log: &mut SyncLog,
        status: SyncLogStatus,
        error: Option<String>,
    ) -> SyncResult<()> {
        let inner = &self.inner;
        let (step, progress) = match status {
            SyncLogStatus::Completed => (SyncStep::Completed, progress::COMPLETED),
            SyncLogStatus::Cancelled => (SyncStep::Cancelled, session.progress()),
            _ => (SyncStep::Failed, session.progress()),
        };
        let Some(published) = session.finish(step, progress).await else {
            debug!(sync_log_id = %log.id, "Sync already finished");
            return Ok(());
        };
        self.publish(
            session,
            SyncEventKind::StepChanged {
                step,
                progress: published,
            },
        );

        let persisted = async {
            let changes = inner.history.list_changes(log.id).await?;
            log.set_counts(ChangeCounts::tally(&changes));
            log.status = status;
            log.completed_at = Some(Utc::now());
            if let Some(error) = error {
                log.summary.add_error(error.clone());
                log.error_message = Some(error);
            }
            inner.history.update_log(log).await
        }
        .await;

        if persisted.is_ok() {
            self.record_last_sync(log).await;
        }
        inner.sessions.remove(log.facility_id, log.id).await;

        info!(
            sync_log_id = %log.id,
            status = %status,
            detected = log.changes_detected,
            applied = log.changes_applied,
            pending = log.changes_pending,
            rejected = log.changes_rejected,
            "Sync finished"
        );
        self.publish(
            session,
            SyncEventKind::Finished {
                status,
                summary: log.summary.clone(),
            },
        );
        persisted
    }

    /// Finalize a cancelled session unless its driver is about to.
    ///
    /// Must run after the cancel flag is set, so a driver that is still
    /// before the persist step halts at its next check.
    async fn cancel_now(&self, session: &SyncSession) -> SyncResult<()> {
        let guard = session.try_drive();
        let step = session.step().await;
        if step.is_terminal() || (guard.is_none() && !step.is_before_persist()) {
            return Ok(());
        }
        let mut log = self
            .inner
            .history
            .get_log(session.sync_log_id())
            .await?
            .ok_or_else(|| SyncError::not_found("SyncLog", session.sync_log_id()))?;
        let result = self
            .finalize(session, &mut log, SyncLogStatus::Cancelled, None)
            .await;
        drop(guard);
        result
    }

    async fn session_for_review(&self, log: &SyncLog) -> SyncResult<Arc<SyncSession>> {
        if let Some(session) = self.inner.sessions.find_by_log(log.id).await {
            return Ok(session);
        }

        let session = Arc::new(SyncSession::with_step(
            log.facility_id,
            log.id,
            SyncStep::ReviewNeeded,
            progress::REVIEW_NEEDED,
        ));
        let changes = self.inner.history.list_changes(log.id).await?;
        let undecided = changes.iter().filter(|c| c.is_pending_review()).count();
        session.set_counts(count_u32(changes.len()), count_u32(undecided));

        match self.inner.sessions.insert(session.clone()).await {
            Ok(()) => {
                info!(sync_log_id = %log.id, "Review session restored");
                Ok(session)
            }
            Err(existing) if existing.sync_log_id() == log.id => Ok(existing),
            Err(existing) => Err(SyncError::already_running(
                log.facility_id,
                Some(existing.sync_log_id()),
            )),
        }
    }

    async fn record_last_sync(&self, log: &SyncLog) {
        let at = log.completed_at.unwrap_or_else(Utc::now);
        if let Err(e) = self
            .inner
            .configs
            .update_last_sync(log.facility_id, at, log.status)
            .await
        {
            warn!(
                facility_id = %log.facility_id,
                error = %e,
                "Failed to update last sync fields"
            );
        }
    }

    /// Current outcome of a sync attempt, in the shape `trigger_sync` returns.
    pub async fn get_sync_result(&self, sync_log_id: Uuid) -> SyncResult<TriggerSyncResult> {
        let log = self
            .inner
            .history
            .get_log(sync_log_id)
            .await?
            .ok_or_else(|| SyncError::not_found("SyncLog", sync_log_id))?;
        let changes = self.inner.history.list_changes(sync_log_id).await?;
        Ok(TriggerSyncResult {
            success: !matches!(log.status, SyncLogStatus::Failed | SyncLogStatus::Cancelled),
            sync_log_id,
            status: log.status,
            requires_review: changes.iter().any(|c| c.requires_review),
            summary: log.summary,
            changes_detected: changes,
        })
    }

    async fn advance(&self, session: &SyncSession, step: SyncStep, progress: u8) {
        let published = session.advance(step, progress).await;
        self.publish(
            session,
            SyncEventKind::StepChanged {
                step: session.step().await,
                progress: published,
            },
        );
    }

    fn publish(&self, session: &SyncSession, kind: SyncEventKind) {
        self.inner.events.publish(SyncEvent::new(
            session.facility_id(),
            session.sync_log_id(),
            kind,
        ));
    }
}

fn check_cancel(session: &SyncSession) -> Result<(), Halt> {
    if session.is_cancel_requested() {
        return Err(Halt::Cancelled);
    }
    Ok(())
}

fn applying_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return progress::APPLIED;
    }
    let span = usize::from(progress::APPLIED - progress::APPLYING);
    let step = span * done.min(total) / total;
    progress::APPLYING + u8::try_from(step).unwrap_or(0)
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn change_row(sync_log_id: Uuid, position: usize, gated: GatedChange) -> SyncResult<SyncChange> {
    let requires_review = gated.requires_review();
    let DetectedChange {
        change_type,
        external_id,
        entity_key,
        before,
        after,
        impact_summary,
        required_actions,
        ..
    } = gated.change;

    let before_data = before.map(serde_json::to_value).transpose()?;
    let after_data = match after {
        Some(record) => serde_json::to_value(record)?,
        None => serde_json::Value::Null,
    };

    Ok(SyncChange {
        id: Uuid::new_v4(),
        sync_log_id,
        position: i32::try_from(position).unwrap_or(i32::MAX),
        change_type,
        entity_type: change_type.entity_type(),
        external_id,
        entity_key,
        before_data,
        after_data,
        impact_summary,
        required_actions,
        requires_review,
        // Auto-apply changes are persisted as already approved.
        is_reviewed: !requires_review,
        decision: (!requires_review).then_some(ReviewDecision::Approved),
        reviewed_by: None,
        reviewed_at: None,
        apply_status: ApplyStatus::NotApplied,
        apply_error: None,
        created_at: Utc::now(),
    })
}
