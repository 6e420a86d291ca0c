//! Duration parsing for sequence files
//!
//! Durations are written either as bare integers (milliseconds) or as
//! strings with a unit suffix: `"150ms"`, `"1.5s"`, `"2m"`, `"1h"`.
//! Parsing is signed so that negative values surface as a distinct,
//! reportable error instead of a generic format failure.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Duration parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    /// The text is not a recognised duration.
    #[error("invalid duration: '{0}' (expected an integer or a number with suffix ms, s, m, h)")]
    Invalid(String),

    /// The duration parsed, but is below zero.
    #[error("negative duration: '{0}'")]
    Negative(String),
}

/// A duration as written in a sequence file.
///
/// Kept unparsed until validation so that every malformed value in a file
/// can be reported in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationSpec {
    /// Bare integer, interpreted as milliseconds.
    Millis(i64),
    /// Number with a unit suffix.
    Text(String),
}

impl DurationSpec {
    /// Returns the signed millisecond value, without rejecting negatives.
    ///
    /// # Errors
    ///
    /// Returns [`DurationError::Invalid`] if the text form cannot be parsed.
    pub fn to_millis(&self) -> Result<i64, DurationError> {
        match self {
            Self::Millis(ms) => Ok(*ms),
            Self::Text(s) => parse_signed_millis(s),
        }
    }

    /// Returns the value as a non-negative [`Duration`].
    ///
    /// # Errors
    ///
    /// Returns [`DurationError::Invalid`] for malformed text and
    /// [`DurationError::Negative`] for values below zero.
    pub fn to_duration(&self) -> Result<Duration, DurationError> {
        let ms = self.to_millis()?;
        u64::try_from(ms)
            .map(Duration::from_millis)
            .map_err(|_| DurationError::Negative(self.to_string()))
    }
}

impl Default for DurationSpec {
    fn default() -> Self {
        Self::Millis(0)
    }
}

impl fmt::Display for DurationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millis(ms) => write!(f, "{ms}ms"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<Duration> for DurationSpec {
    fn from(d: Duration) -> Self {
        Self::Millis(i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    }
}

/// Parses a duration string like `"30s"`, `"0.3s"`, `"100ms"`, `"5m"`, `"1h"`.
///
/// # Errors
///
/// Returns [`DurationError::Invalid`] if the format is invalid and
/// [`DurationError::Negative`] if the value is below zero.
pub fn parse_duration(s: &str) -> Result<Duration, DurationError> {
    let ms = parse_signed_millis(s)?;
    u64::try_from(ms)
        .map(Duration::from_millis)
        .map_err(|_| DurationError::Negative(s.trim().to_string()))
}

/// Parses a duration string into signed milliseconds.
///
/// A string without a suffix is read as milliseconds. Fractions are
/// rounded to the nearest millisecond.
///
/// # Errors
///
/// Returns [`DurationError::Invalid`] if the format is invalid.
pub fn parse_signed_millis(s: &str) -> Result<i64, DurationError> {
    let s = s.trim();
    let invalid = || DurationError::Invalid(s.to_string());

    let (number, scale) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3_600_000.0)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60_000.0)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000.0)
    } else {
        (s, 1.0)
    };

    let number = number.trim();
    if number.is_empty() {
        return Err(invalid());
    }

    if let Ok(n) = number.parse::<i64>() {
        #[allow(clippy::cast_possible_truncation)]
        let scale = scale as i64;
        return n.checked_mul(scale).ok_or_else(invalid);
    }

    let value: f64 = number.parse().map_err(|_| invalid())?;
    let ms = (value * scale).round();
    if !ms.is_finite() || ms.abs() > 9.0e15 {
        return Err(invalid());
    }
    #[allow(clippy::cast_possible_truncation)]
    Ok(ms as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_seconds() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_duration_fractional_seconds() {
        assert_eq!(parse_duration("0.3s").unwrap(), Duration::from_millis(300));
        assert_eq!(parse_duration("1.25s").unwrap(), Duration::from_millis(1250));
    }

    #[test]
    fn test_parse_duration_milliseconds() {
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
    }

    #[test]
    fn test_parse_duration_bare_number_is_millis() {
        assert_eq!(parse_duration("450").unwrap(), Duration::from_millis(450));
    }

    #[test]
    fn test_parse_duration_minutes_and_hours() {
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_duration_negative() {
        assert_eq!(
            parse_duration("-100ms"),
            Err(DurationError::Negative("-100ms".to_string()))
        );
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(matches!(parse_duration("30x"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("abcs"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration(""), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("ms"), Err(DurationError::Invalid(_))));
    }

    #[test]
    fn test_signed_millis_keeps_sign() {
        assert_eq!(parse_signed_millis("-2s").unwrap(), -2000);
    }

    #[test]
    fn test_spec_from_yaml_forms() {
        let int: DurationSpec = serde_yaml::from_str("250").unwrap();
        assert_eq!(int, DurationSpec::Millis(250));
        let text: DurationSpec = serde_yaml::from_str("\"1.5s\"").unwrap();
        assert_eq!(text.to_duration().unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn test_spec_negative_integer() {
        let spec = DurationSpec::Millis(-5);
        assert_eq!(spec.to_millis().unwrap(), -5);
        assert!(matches!(spec.to_duration(), Err(DurationError::Negative(_))));
    }
}
