//! CLI error types and exit codes

use fms_sync::error::SyncError;
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 3: FMS connection error
/// - 4: Validation error
/// - 5: Sync did not complete
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid fixture {path}: {message}")]
    Fixture { path: PathBuf, message: String },

    #[error("FMS connection test failed")]
    ConnectionFailed,

    #[error("Sync ended with status {status}")]
    SyncIncomplete { status: String },

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ConnectionFailed => 3,
            CliError::Validation(_) | CliError::Fixture { .. } => 4,
            CliError::SyncIncomplete { .. } => 5,
            CliError::Sync(e) if e.is_already_running() => 5,
            CliError::Sync(SyncError::Provider(_)) => 3,
            _ => 1,
        }
    }

    /// Print the error to stderr
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {self}");
        } else {
            eprintln!("Error: {self}");
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {suggestion}");
            } else {
                eprintln!("\nSuggestion: {suggestion}");
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Sync(e) if e.is_already_running() => {
                Some("Wait for the running sync to finish, or cancel it first.")
            }
            CliError::Sync(SyncError::ConfigNotFound { .. }) => {
                Some("Run 'fms-sync sync' with --external to create the facility configuration.")
            }
            CliError::Database(_) => Some("Check DATABASE_URL and that the database is reachable."),
            CliError::ConnectionFailed => Some("Check the provider settings and credentials."),
            _ => None,
        }
    }
}
