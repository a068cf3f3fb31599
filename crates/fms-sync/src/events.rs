//! Sync event publishing using a tokio broadcast channel.
//!
//! UI layers observe step transitions, progress and review activity by
//! subscribing; the engine never waits on subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::applier::ApplyOutcome;
use crate::model::SyncSummary;
use crate::types::{ReviewDecision, SyncLogStatus, SyncStep};

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEventKind {
    /// The session moved to a new step or advanced its progress.
    StepChanged { step: SyncStep, progress: u8 },
    /// Changes were classified and persisted.
    ChangesDetected { count: usize, requires_review: bool },
    /// A reviewer decided on a change.
    ChangeReviewed {
        change_id: Uuid,
        decision: ReviewDecision,
    },
    /// The applier handled a change.
    ChangeApplied {
        change_id: Uuid,
        outcome: ApplyOutcome,
    },
    /// The attempt reached a terminal status.
    Finished {
        status: SyncLogStatus,
        summary: SyncSummary,
    },
}

/// An event published by the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub facility_id: Uuid,
    pub sync_log_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: SyncEventKind,
}

impl SyncEvent {
    /// Create an event stamped now.
    #[must_use]
    pub fn new(facility_id: Uuid, sync_log_id: Uuid, kind: SyncEventKind) -> Self {
        Self {
            facility_id,
            sync_log_id,
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Publisher that sends sync events to a broadcast channel.
#[derive(Debug, Clone)]
pub struct SyncEventPublisher {
    sender: broadcast::Sender<SyncEvent>,
}

impl SyncEventPublisher {
    /// Create a new publisher with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers. Errors are logged, never propagated.
    pub fn publish(&self, event: SyncEvent) {
        // Sending only fails when nobody is subscribed.
        if let Err(e) = self.sender.send(event) {
            tracing::debug!(
                target: "fms_sync_events",
                facility_id = %e.0.facility_id,
                sync_log_id = %e.0.sync_log_id,
                "No active subscribers to receive sync event"
            );
        }
    }

    /// Get a new receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
