//! Error types for the harness.

use core_types::GuestError;
use thiserror::Error;

/// Harness-level errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Unknown demo name
    #[error("unknown demo '{0}' (use --list to see the available demos)")]
    UnknownDemo(String),

    /// The guest failed before it could start
    #[error("guest error: {0}")]
    Guest(#[from] GuestError),
}

/// Result type for harness operations.
pub type CliResult<T> = Result<T, CliError>;
