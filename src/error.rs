//! Structured error handling and exit codes.

use serde::Serialize;

/// Exit codes for the lorekeeper application.
///
/// - 0: Success (including runs where nothing changed)
/// - 1: General error (unexpected failure)
/// - 3: Partial success (some files could not be read or embedded)
/// - 4: Documents were embedded but the cache could not be saved
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the run completed.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// Partial success: completed, but some files were skipped.
    PartialSuccess = 3,
    /// The vector store was updated but the freshness cache was not saved.
    CachePersistFailed = 4,
    /// Interrupted: run was interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "LK000",
            Self::GeneralError => "LK001",
            Self::PartialSuccess => "LK003",
            Self::CachePersistFailed => "LK004",
            Self::Interrupted => "LK130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "LK001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

/// Pick the exit code for an error returned by [`crate::run_app`].
#[must_use]
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<crate::ingest::IngestError>() {
        Some(crate::ingest::IngestError::Interrupted) => ExitCode::Interrupted,
        Some(crate::ingest::IngestError::Persist { .. }) => ExitCode::CachePersistFailed,
        _ => ExitCode::GeneralError,
    }
}
