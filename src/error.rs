use std::io;
use std::path::PathBuf;
use thiserror::Error;

// Import module-level errors for AppError
use crate::config::settings::ConfigError;
use crate::explore::SourceError;
use crate::security::policy::PolicyError;

/// Errors that prevent a batch from being run at all
///
/// Per-command failures (spawn errors, timeouts, non-zero exits) are data in
/// the report, never an `ExecError`.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Exploration root is not a directory: {0}")]
    InvalidRoot(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Top-level application error that wraps all module-specific errors
///
/// All module errors convert to AppError via the `From` trait.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    #[error("Command source error: {0}")]
    Source(#[from] SourceError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for batch setup
pub type ExecResult<T> = std::result::Result<T, ExecError>;

/// Result type for application-level operations
pub type AppResult<T> = std::result::Result<T, AppError>;
