//! Core error types for `Cadence`
//!
//! Configuration and validation error types shared across the workspace.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Sequence file loading and validation errors.
///
/// Covers every failure mode between reading a sequence file and handing a
/// compiled timeline to the sequencer.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}{}: {message}", line.map_or_else(String::new, |l| format!(" (line {l})")))]
    ParseError {
        /// Path to the sequence file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Sequence validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the sequence file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced sequence file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in a sequence file is not set
    #[error("environment variable '{var}' not set (referenced at {location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Location in the file where it was referenced
        location: String,
    },

    /// One or more sequence files failed validation.
    #[error("{count} file(s) failed validation")]
    ValidationFailed {
        /// Number of files that failed validation.
        count: usize,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during sequence validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "phases[2].duration")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - prevents the sequence from being played
    Error,
    /// Warning - potential issue that does not prevent loading
    Warning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_issue_display() {
        let issue = ValidationIssue {
            path: "phases[0].duration".to_string(),
            message: "duration must not be negative".to_string(),
            severity: Severity::Error,
        };
        assert_eq!(
            issue.to_string(),
            "error: duration must not be negative at phases[0].duration"
        );
    }

    #[test]
    fn test_validation_issue_warning_display() {
        let issue = ValidationIssue {
            path: "phases[3]".to_string(),
            message: "phase has no effect".to_string(),
            severity: Severity::Warning,
        };
        assert_eq!(issue.to_string(), "warning: phase has no effect at phases[3]");
    }

    #[test]
    fn test_parse_error_display_with_line() {
        let err = ConfigError::ParseError {
            path: PathBuf::from("otp.yaml"),
            line: Some(42),
            message: "unexpected token".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("otp.yaml"));
        assert!(text.contains("(line 42)"));
        assert!(text.contains("unexpected token"));
    }

    #[test]
    fn test_parse_error_display_without_line() {
        let err = ConfigError::ParseError {
            path: PathBuf::from("otp.yaml"),
            line: None,
            message: "bad".to_string(),
        };
        assert_eq!(err.to_string(), "parse error in otp.yaml: bad");
    }

    #[test]
    fn test_config_error_env_var_display() {
        let err = ConfigError::EnvVarNotSet {
            var: "HOLD".to_string(),
            location: "cycle.hold".to_string(),
        };
        assert!(err.to_string().contains("HOLD"));
        assert!(err.to_string().contains("cycle.hold"));
    }
}
