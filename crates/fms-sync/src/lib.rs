//! # FMS Sync Engine
//!
//! Keeps a storage facility's tenant and unit records in line with its
//! Facility Management System (FMS).
//!
//! A sync fetches a snapshot from the FMS, compares it with the facility's
//! own records, classifies every difference as auto-apply or review-required,
//! and applies approved changes. Every attempt is recorded as a [`SyncLog`]
//! with its [`SyncChange`] rows.
//!
//! ## Architecture
//!
//! - [`SyncOrchestrator`](orchestrator::SyncOrchestrator) - Drives the per-facility state machine
//! - [`detect_changes`](detector::detect_changes) - Pure snapshot comparison
//! - [`ReviewPolicy`](review::ReviewPolicy) - Which changes need a human decision
//! - [`ChangeApplier`](applier::ChangeApplier) - Writes approved changes through [`FacilityRecords`]
//! - [`SyncHistoryStore`] / [`FacilityConfigStore`] - In-memory and PostgreSQL persistence
//! - [`SyncEventPublisher`](events::SyncEventPublisher) - Broadcast of step and review events
//!
//! ## Example
//!
//! ```ignore
//! use fms_sync::prelude::*;
//!
//! let store = Arc::new(MemorySyncStore::new());
//! let orchestrator = SyncOrchestrator::new(
//!     EngineConfig::from_env(),
//!     ProviderRegistry::with_defaults(),
//!     store.clone(),
//!     store,
//!     Arc::new(InMemoryFacilityRecords::new()),
//! )?;
//!
//! let result = orchestrator.trigger_sync(facility_id, Some("ops".into())).await?;
//! if result.requires_review {
//!     orchestrator.review_change(change_id, ReviewDecision::Approved, None).await?;
//! }
//! ```
//!
//! [`SyncLog`]: model::SyncLog
//! [`SyncChange`]: model::SyncChange
//! [`FacilityRecords`]: records::FacilityRecords
//! [`SyncHistoryStore`]: store::SyncHistoryStore
//! [`FacilityConfigStore`]: store::FacilityConfigStore

pub mod applier;
pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod model;
pub mod orchestrator;
pub mod records;
pub mod review;
pub mod session;
pub mod store;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::applier::{ApplyOutcome, ChangeApplier};
    pub use crate::config::EngineConfig;
    pub use crate::detector::{detect_changes, DetectedChange, Detection, EntityRecord};
    pub use crate::error::{SyncError, SyncResult};
    pub use crate::events::{SyncEvent, SyncEventKind, SyncEventPublisher};
    pub use crate::model::{
        ChangeCounts, FacilitySyncConfig, SyncChange, SyncHistory, SyncLog, SyncStatusView,
        SyncSummary, TriggerSyncResult,
    };
    pub use crate::orchestrator::{RecoveryReport, SyncOrchestrator};
    pub use crate::records::{FacilityRecords, InMemoryFacilityRecords, RecordsError};
    pub use crate::review::{GatedChange, ReviewPolicy};
    pub use crate::store::{FacilityConfigStore, MemorySyncStore, PgSyncStore, SyncHistoryStore};
    pub use crate::types::{
        ApplyStatus, ChangeType, EntityType, ReviewAction, ReviewDecision, SyncLogStatus,
        SyncStep,
    };
    pub use fms_provider::prelude::*;
}
