//! Sync Failure Tests
//!
//! How the orchestrator behaves when things go wrong:
//! - Cancellation mid-fetch and during review
//! - Per-facility exclusivity under concurrent triggers
//! - Provider failures, retries and the fetch timeout
//! - Apply failures that must not block sibling changes
//! - Recovery after a restart

mod common;

use common::*;
use fms_provider::prelude::*;
use fms_sync::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_fetch_discards_result() {
    let provider =
        Arc::new(SimulatedProvider::new(jane_in_b12()).with_latency(Duration::from_secs(5)));
    let h = Harness::new(provider, vacant_b12(), fast_config()).await;

    let orchestrator = h.orchestrator.clone();
    let facility_id = h.facility_id;
    let task = tokio::spawn(async move { orchestrator.trigger_sync(facility_id, None).await });

    h.wait_for_step(SyncStep::Fetching).await;
    assert!(h.orchestrator.cancel_sync(h.facility_id).await.unwrap());

    let result = task.await.unwrap().unwrap();
    assert!(!result.success);
    assert_eq!(result.status, SyncLogStatus::Cancelled);
    assert!(result.changes_detected.is_empty());
    assert_eq!(h.store.change_count().await, 0);
    assert!(h.orchestrator.get_sync_status(h.facility_id).await.is_none());

    let log = h.log(result.sync_log_id).await;
    assert_eq!(log.status, SyncLogStatus::Cancelled);
    assert!(log.counters_conserved());
    assert!(h.internal().await.tenant("T-1001").is_none());

    let next = h.trigger().await.unwrap();
    assert_eq!(next.status, SyncLogStatus::Completed);
    assert_ne!(next.sync_log_id, result.sync_log_id);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_fetch_frees_facility_immediately() {
    let provider =
        Arc::new(SimulatedProvider::new(jane_in_b12()).with_latency(Duration::from_secs(5)));
    let h = Harness::new(provider, vacant_b12(), fast_config()).await;

    let orchestrator = h.orchestrator.clone();
    let facility_id = h.facility_id;
    let task = tokio::spawn(async move { orchestrator.trigger_sync(facility_id, None).await });

    h.wait_for_step(SyncStep::Fetching).await;
    let cancelled_log_id = h
        .orchestrator
        .get_sync_status(h.facility_id)
        .await
        .unwrap()
        .sync_log_id;
    assert!(h.orchestrator.cancel_sync(h.facility_id).await.unwrap());

    // The first fetch is still sleeping; nothing waits on it.
    assert!(h.orchestrator.get_sync_status(h.facility_id).await.is_none());
    assert!(h.orchestrator.can_start_new_sync(h.facility_id).await.unwrap());
    let log = h.log(cancelled_log_id).await;
    assert_eq!(log.status, SyncLogStatus::Cancelled);
    assert!(log.completed_at.is_some());

    let next = h.trigger().await.unwrap();
    assert_eq!(next.status, SyncLogStatus::Completed);
    assert_ne!(next.sync_log_id, cancelled_log_id);
    assert!(h.internal().await.tenant("T-1001").is_some());

    // The late fetch result is dropped without touching the cancelled log.
    let first = task.await.unwrap().unwrap();
    assert_eq!(first.sync_log_id, cancelled_log_id);
    assert_eq!(first.status, SyncLogStatus::Cancelled);
    assert!(first.changes_detected.is_empty());
    assert!(h
        .store
        .list_changes(cancelled_log_id)
        .await
        .unwrap()
        .is_empty());
    assert!(h.orchestrator.get_sync_status(h.facility_id).await.is_none());
}

#[tokio::test]
async fn test_cancel_during_review() {
    let h = Harness::new(simulated(a3_vacated()), john_in_a3(), fast_config()).await;
    let result = h.trigger().await.unwrap();

    assert!(h.orchestrator.cancel_sync(h.facility_id).await.unwrap());

    let log = h.log(result.sync_log_id).await;
    assert_eq!(log.status, SyncLogStatus::Cancelled);
    assert_eq!(log.changes_pending, 1);
    assert!(log.counters_conserved());
    assert!(h.orchestrator.get_sync_status(h.facility_id).await.is_none());
    assert!(h.internal().await.tenant("T-2001").is_some());

    // The undecided change stays for audit but can no longer be reviewed.
    let err = h
        .orchestrator
        .review_change(result.changes_detected[0].id, ReviewDecision::Approved, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidStateTransition { .. }));

    assert!(h.orchestrator.can_start_new_sync(h.facility_id).await.unwrap());
}

#[tokio::test]
async fn test_cancel_when_idle() {
    let h = Harness::new(simulated(jane_in_b12()), vacant_b12(), fast_config()).await;

    assert!(!h.orchestrator.cancel_sync(h.facility_id).await.unwrap());
}

// =============================================================================
// Exclusivity
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_triggers_start_one_sync() {
    let provider =
        Arc::new(SimulatedProvider::new(jane_in_b12()).with_latency(Duration::from_secs(1)));
    let h = Harness::new(provider, vacant_b12(), fast_config()).await;

    let (first, second) = tokio::join!(h.trigger(), h.trigger());

    let (ok, err) = match (first, second) {
        (Ok(ok), Err(err)) | (Err(err), Ok(ok)) => (ok, err),
        other => panic!("expected exactly one sync to start, got {other:?}"),
    };
    assert!(ok.success);
    assert!(err.is_already_running());

    let history = h
        .orchestrator
        .get_sync_history(h.facility_id, None, None)
        .await
        .unwrap();
    assert_eq!(history.total, 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_reports_running_sync() {
    let provider =
        Arc::new(SimulatedProvider::new(jane_in_b12()).with_latency(Duration::from_secs(5)));
    let h = Harness::new(provider, vacant_b12(), fast_config()).await;

    let orchestrator = h.orchestrator.clone();
    let facility_id = h.facility_id;
    let task = tokio::spawn(async move { orchestrator.trigger_sync(facility_id, None).await });

    h.wait_for_step(SyncStep::Fetching).await;
    let status = h.orchestrator.get_sync_status(h.facility_id).await.unwrap();
    assert_eq!(status.progress_percentage, 15);
    assert!(!status.cancel_requested);
    assert!(!h.orchestrator.can_start_new_sync(h.facility_id).await.unwrap());

    let err = h.trigger().await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::AlreadyRunning { sync_log_id: Some(id), .. } if id == status.sync_log_id
    ));

    let result = task.await.unwrap().unwrap();
    assert!(result.success);
}

// =============================================================================
// Provider failures
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_fetch_timeout_fails_sync() {
    let provider =
        Arc::new(SimulatedProvider::new(jane_in_b12()).with_latency(Duration::from_secs(120)));
    let config = EngineConfig {
        fetch_timeout_secs: 1,
        ..fast_config()
    };
    let h = Harness::new(provider, vacant_b12(), config).await;

    let result = h.trigger().await.unwrap();

    assert!(!result.success);
    assert_eq!(result.status, SyncLogStatus::Failed);
    assert_eq!(h.store.change_count().await, 0);
    let log = h.log(result.sync_log_id).await;
    assert!(log.error_message.unwrap().contains("timed out"));
    assert!(h.orchestrator.can_start_new_sync(h.facility_id).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let provider = Arc::new(
        SimulatedProvider::new(jane_in_b12()).with_failures(2, FailureMode::Connection),
    );
    let h = Harness::new(provider.clone(), vacant_b12(), fast_config()).await;

    let result = h.trigger().await.unwrap();

    assert_eq!(result.status, SyncLogStatus::Completed);
    assert_eq!(provider.fetch_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_is_retried() {
    let provider = Arc::new(
        SimulatedProvider::new(jane_in_b12()).with_failures(1, FailureMode::RateLimited),
    );
    let h = Harness::new(provider.clone(), vacant_b12(), fast_config()).await;

    assert!(h.trigger().await.unwrap().success);
    assert_eq!(provider.fetch_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted_fails_sync() {
    let provider =
        Arc::new(SimulatedProvider::new(jane_in_b12()).failing_always(FailureMode::Connection));
    let h = Harness::new(provider.clone(), vacant_b12(), fast_config()).await;

    let result = h.trigger().await.unwrap();

    assert_eq!(result.status, SyncLogStatus::Failed);
    assert_eq!(provider.fetch_calls(), 4);
    assert_eq!(result.summary.errors.len(), 1);
    let config = h.store.get_config(h.facility_id).await.unwrap().unwrap();
    assert_eq!(config.last_sync_status, Some(SyncLogStatus::Failed));
}

#[tokio::test]
async fn test_malformed_snapshot_is_not_retried() {
    let provider = Arc::new(SimulatedProvider::from_raw("<html>502 Bad Gateway</html>"));
    let h = Harness::new(provider.clone(), vacant_b12(), fast_config()).await;

    let result = h.trigger().await.unwrap();

    assert_eq!(result.status, SyncLogStatus::Failed);
    assert_eq!(provider.fetch_calls(), 1);
    let log = h.log(result.sync_log_id).await;
    assert!(log.error_message.is_some());
    assert_eq!(h.store.change_count().await, 0);
}

#[tokio::test]
async fn test_rejected_credentials_fail_before_fetch() {
    let provider = Arc::new(SimulatedProvider::new(jane_in_b12()).rejecting_connections());
    let h = Harness::new(provider.clone(), vacant_b12(), fast_config()).await;

    let result = h.trigger().await.unwrap();

    assert_eq!(result.status, SyncLogStatus::Failed);
    assert_eq!(provider.fetch_calls(), 0);
}

#[tokio::test]
async fn test_unregistered_provider_fails_sync() {
    let h = Harness::new(simulated(jane_in_b12()), vacant_b12(), fast_config()).await;
    h.store
        .save_config(&FacilitySyncConfig::new(
            h.facility_id,
            ProviderConfig::new(ProviderType::SiteLink),
        ))
        .await
        .unwrap();

    let result = h.trigger().await.unwrap();

    assert_eq!(result.status, SyncLogStatus::Failed);
    assert!(h.log(result.sync_log_id).await.error_message.is_some());
}

#[tokio::test]
async fn test_test_connection() {
    let h = Harness::new(simulated(jane_in_b12()), vacant_b12(), fast_config()).await;
    assert!(h.orchestrator.test_connection(&ProviderConfig::simulated()).await);
    assert!(
        !h.orchestrator
            .test_connection(&ProviderConfig::new(ProviderType::StorEdge))
            .await
    );

    let rejecting = Arc::new(SimulatedProvider::demo().rejecting_connections());
    let h = Harness::new(rejecting, vacant_b12(), fast_config()).await;
    assert!(!h.orchestrator.test_connection(&ProviderConfig::simulated()).await);
}

// =============================================================================
// Configuration
// =============================================================================

#[tokio::test]
async fn test_disabled_facility_is_refused() {
    let h = Harness::new(simulated(jane_in_b12()), vacant_b12(), fast_config()).await;
    h.store
        .save_config(
            &FacilitySyncConfig::new(h.facility_id, ProviderConfig::simulated())
                .with_enabled(false),
        )
        .await
        .unwrap();

    let err = h.trigger().await.unwrap_err();

    assert!(matches!(err, SyncError::Disabled { .. }));
    let history = h
        .orchestrator
        .get_sync_history(h.facility_id, None, None)
        .await
        .unwrap();
    assert_eq!(history.total, 0);
}

#[tokio::test]
async fn test_unknown_facility_is_refused() {
    let h = Harness::new(simulated(jane_in_b12()), vacant_b12(), fast_config()).await;

    let err = h
        .orchestrator
        .trigger_sync(Uuid::new_v4(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::ConfigNotFound { .. }));
}

// =============================================================================
// Apply failures
// =============================================================================

#[tokio::test]
async fn test_apply_failure_does_not_block_siblings() {
    let mut external = jane_in_b12();
    external
        .tenants
        .push(TenantRecord::new("Bob Stone").with_external_id("T-1003"));

    let seeded = Arc::new(InMemoryFacilityRecords::new());
    let flaky = Arc::new(FlakyRecords::new(seeded.clone(), "Bob Stone"));
    let h = Harness::with_records(
        simulated(external),
        vacant_b12(),
        fast_config(),
        seeded,
        flaky.clone(),
    )
    .await;

    let result = h.trigger().await.unwrap();

    assert!(result.success);
    assert_eq!(result.status, SyncLogStatus::Completed);
    assert_eq!(flaky.refused(), 1);

    let log = h.log(result.sync_log_id).await;
    assert_eq!(log.changes_detected, 2);
    assert_eq!(log.changes_applied, 1);
    assert_eq!(log.changes_pending, 1);
    assert!(log.counters_conserved());
    assert_eq!(log.summary.errors.len(), 1);
    assert!(log.error_message.is_none());

    let bob = result
        .changes_detected
        .iter()
        .find(|c| c.entity_key == "T-1003")
        .unwrap();
    assert_eq!(bob.apply_status, ApplyStatus::Failed);
    assert!(bob.apply_error.is_some());

    assert!(h.internal().await.tenant("T-1001").is_some());
    assert!(h.internal().await.tenant("T-1003").is_none());
}

// =============================================================================
// Recovery
// =============================================================================

#[tokio::test]
async fn test_recover_fails_interrupted_sync() {
    let h = Harness::new(simulated(jane_in_b12()), vacant_b12(), fast_config()).await;
    let config = h.store.get_config(h.facility_id).await.unwrap().unwrap();
    let stale = SyncLog::start(h.facility_id, config.id, None);
    h.store.create_log(&stale).await.unwrap();
    assert!(!h.orchestrator.can_start_new_sync(h.facility_id).await.unwrap());

    let report = h.orchestrator.recover().await.unwrap();

    assert_eq!(report.interrupted, 1);
    assert_eq!(report.reviews_restored, 0);
    let log = h.log(stale.id).await;
    assert_eq!(log.status, SyncLogStatus::Failed);
    assert!(log.error_message.unwrap().contains("interrupted"));
    assert!(h.orchestrator.can_start_new_sync(h.facility_id).await.unwrap());
}

#[tokio::test]
async fn test_recover_restores_review_session() {
    let provider = simulated(a3_vacated());
    let h = Harness::new(provider.clone(), john_in_a3(), fast_config()).await;
    let result = h.trigger().await.unwrap();

    let restarted = h.restarted(provider);
    assert!(restarted.get_sync_status(h.facility_id).await.is_none());

    let report = restarted.recover().await.unwrap();
    assert_eq!(report.reviews_restored, 1);

    let status = restarted.get_sync_status(h.facility_id).await.unwrap();
    assert_eq!(status.step, SyncStep::ReviewNeeded);
    assert_eq!(status.progress_percentage, 75);
    assert_eq!(status.changes_pending, 1);

    restarted
        .review_change(result.changes_detected[0].id, ReviewDecision::Approved, None)
        .await
        .unwrap();
    assert_eq!(
        h.log(result.sync_log_id).await.status,
        SyncLogStatus::Completed
    );
}

#[tokio::test]
async fn test_review_after_restart_without_recover() {
    let provider = simulated(a3_vacated());
    let h = Harness::new(provider.clone(), john_in_a3(), fast_config()).await;
    let result = h.trigger().await.unwrap();

    let restarted = h.restarted(provider);
    let change = restarted
        .review_change(result.changes_detected[0].id, ReviewDecision::Approved, None)
        .await
        .unwrap();

    assert_eq!(change.apply_status, ApplyStatus::Applied);
    assert!(restarted.get_sync_status(h.facility_id).await.is_none());
}
