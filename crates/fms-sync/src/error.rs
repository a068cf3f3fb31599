//! Sync error types.

use fms_provider::error::ProviderError;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A sync session is already active for the facility.
    #[error("A sync is already running for facility {facility_id}")]
    AlreadyRunning {
        facility_id: Uuid,
        sync_log_id: Option<Uuid>,
    },

    /// Provider error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The fetch step exceeded its hard timeout.
    #[error("Fetch timed out after {timeout_secs} seconds")]
    FetchTimeout { timeout_secs: u64 },

    /// Sync disabled.
    #[error("Sync is disabled for facility {facility_id}")]
    Disabled { facility_id: Uuid },

    /// No sync configuration exists for the facility.
    #[error("No sync configuration for facility {facility_id}")]
    ConfigNotFound { facility_id: Uuid },

    /// Not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A decision was already recorded for the change.
    #[error("Change {change_id} has already been reviewed")]
    AlreadyReviewed { change_id: Uuid },

    /// Invalid state transition.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Persistence error outside the database driver.
    #[error("Store error: {message}")]
    Store { message: String },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SyncError {
    /// Create an already running error.
    pub fn already_running(facility_id: Uuid, sync_log_id: Option<Uuid>) -> Self {
        Self::AlreadyRunning {
            facility_id,
            sync_log_id,
        }
    }

    /// Create a disabled error.
    pub fn disabled(facility_id: Uuid) -> Self {
        Self::Disabled { facility_id }
    }

    /// Create a config not found error.
    pub fn config_not_found(facility_id: Uuid) -> Self {
        Self::ConfigNotFound { facility_id }
    }

    /// Create a not found error.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create an invalid state transition error.
    pub fn invalid_state_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error means the caller raced an active sync.
    pub fn is_already_running(&self) -> bool {
        matches!(self, SyncError::AlreadyRunning { .. })
    }

    /// Check if a retry of the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Provider(e) => e.is_transient(),
            SyncError::FetchTimeout { .. } | SyncError::Database(_) => true,
            _ => false,
        }
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::AlreadyRunning { .. } => "ALREADY_RUNNING",
            SyncError::Provider(e) => e.error_code(),
            SyncError::FetchTimeout { .. } => "FETCH_TIMEOUT",
            SyncError::Disabled { .. } => "SYNC_DISABLED",
            SyncError::ConfigNotFound { .. } => "CONFIG_NOT_FOUND",
            SyncError::NotFound { .. } => "NOT_FOUND",
            SyncError::AlreadyReviewed { .. } => "ALREADY_REVIEWED",
            SyncError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            SyncError::Configuration { .. } => "CONFIGURATION",
            SyncError::Store { .. } => "STORE",
            SyncError::Database(_) => "DATABASE",
            SyncError::Serialization(_) => "SERIALIZATION",
            SyncError::Internal { .. } => "INTERNAL",
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let facility_id = Uuid::new_v4();
        let err = SyncError::already_running(facility_id, None);
        assert!(err.to_string().contains(&facility_id.to_string()));

        let err = SyncError::not_found("SyncChange", 42);
        assert_eq!(err.to_string(), "SyncChange not found: 42");

        let err: SyncError = ProviderError::auth("bad key").into();
        assert!(err.to_string().contains("bad key"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(SyncError::Provider(ProviderError::connection_failed("refused")).is_retryable());
        assert!(SyncError::FetchTimeout { timeout_secs: 30 }.is_retryable());
        assert!(!SyncError::Provider(ProviderError::auth("nope")).is_retryable());
        assert!(!SyncError::disabled(Uuid::new_v4()).is_retryable());
    }

    #[test]
    fn test_error_code_delegates_to_provider() {
        let err = SyncError::Provider(ProviderError::malformed("bad", None));
        assert_eq!(err.error_code(), "MALFORMED_RESPONSE");
        assert_eq!(
            SyncError::already_running(Uuid::new_v4(), None).error_code(),
            "ALREADY_RUNNING"
        );
    }
}
