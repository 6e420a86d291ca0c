//! Error types for `Cadence`
//!
//! Error hierarchy for the sequencer engine and the CLI, plus the exit code
//! table used by `main`.

use thiserror::Error;

pub use cadence_core::error::{ConfigError, Severity, ValidationIssue};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `cadence` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Sequencer error (rejected timeline, torn-down instance)
    pub const SEQUENCER_ERROR: i32 = 5;

    /// Usage error (invalid arguments, unknown scenario)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `Cadence` operations.
#[derive(Debug, Error)]
pub enum CadenceError {
    /// Sequence file loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Sequencer error
    #[error(transparent)]
    Sequencer(#[from] SequencerError),

    /// Invalid command-line usage
    #[error("{0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CadenceError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Sequencer(_) => ExitCode::SEQUENCER_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Sequencer Errors
// ============================================================================

/// Sequencer errors.
///
/// `Configuration` is raised at timeline construction and never recovered.
/// `EffectExecution` is recovered locally by the cycle controller and only
/// surfaces through events and logs.
#[derive(Debug, Error)]
pub enum SequencerError {
    /// Malformed timeline (negative duration, empty phase list)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A phase effect failed while producing the next display state
    #[error("effect failed in phase {ordinal} ('{phase}'): {source}")]
    EffectExecution {
        /// Name of the failing phase
        phase: String,
        /// Ordinal of the failing phase
        ordinal: usize,
        /// Underlying effect error
        #[source]
        source: EffectError,
    },

    /// The instance has already been torn down
    #[error("sequencer instance has been unmounted")]
    Unmounted,
}

// ============================================================================
// Effect Errors
// ============================================================================

/// Failure produced by a phase effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError {
    /// Free-form failure
    #[error("{0}")]
    Failed(String),

    /// A path could not be resolved in the display state
    #[error("path '{path}': {reason}")]
    Path {
        /// Dot-notation path
        path: String,
        /// Why resolution failed
        reason: String,
    },

    /// The value at a path has the wrong type for the operation
    #[error("type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Dot-notation path
        path: String,
        /// Expected JSON type
        expected: &'static str,
        /// Actual JSON type
        found: &'static str,
    },
}

impl EffectError {
    /// Creates a free-form effect failure.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
