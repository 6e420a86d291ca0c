//! `validate`: check sequence files without playing them.

use std::path::Path;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::Sequence;
use crate::config::loader::ConfigLoader;
use crate::error::{CadenceError, ConfigError};
use crate::sequencer::controller::millis;

/// Outcome for one file.
#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    phases: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pass_ms: Option<u64>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validates every file, prints a report, and fails if any file is invalid.
///
/// A file is valid when it loads, passes validation, and compiles into a
/// timeline. With `--strict`, warnings count as errors.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationFailed`] if any file is invalid, or a
/// JSON error if the report cannot be serialized.
pub fn run(args: &ValidateArgs) -> Result<(), CadenceError> {
    let loader = ConfigLoader::with_defaults();

    let reports: Vec<FileReport> = args
        .files
        .iter()
        .map(|path| {
            tracing::info!(file = %path.display(), "validating sequence");
            check(&loader, path, args.strict)
        })
        .collect();

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                print_human(report);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }

    let failed = reports.iter().filter(|r| !r.valid).count();
    if failed > 0 {
        return Err(ConfigError::ValidationFailed { count: failed }.into());
    }
    Ok(())
}

fn check(loader: &ConfigLoader, path: &Path, strict: bool) -> FileReport {
    let mut report = FileReport {
        file: path.display().to_string(),
        valid: false,
        phases: None,
        pass_ms: None,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let loaded = match loader.load(path) {
        Ok(loaded) => loaded,
        Err(ConfigError::ValidationError { errors, .. }) => {
            report.errors = errors.iter().map(ToString::to_string).collect();
            return report;
        }
        Err(e) => {
            report.errors.push(e.to_string());
            return report;
        }
    };

    report.warnings = loaded
        .warnings
        .iter()
        .map(|w| match &w.location {
            Some(location) => format!("{} at {location}", w.message),
            None => w.message.clone(),
        })
        .collect();

    match Sequence::compile_with_limits(&loaded.config, loader.limits()) {
        Ok(sequence) => {
            report.phases = Some(sequence.timeline.len());
            report.pass_ms = Some(millis(sequence.timeline.pass_duration()));
        }
        Err(e) => report.errors.push(e.to_string()),
    }

    if strict && !report.warnings.is_empty() {
        report
            .errors
            .extend(report.warnings.drain(..).map(|w| format!("warning (strict): {w}")));
    }

    report.valid = report.errors.is_empty();
    report
}

fn print_human(report: &FileReport) {
    if report.valid {
        let detail = match (report.phases, report.pass_ms) {
            (Some(phases), Some(ms)) => format!("  ({phases} phases, {ms}ms per pass)"),
            _ => String::new(),
        };
        println!("ok    {}{detail}", report.file);
    } else {
        println!("FAIL  {}", report.file);
    }
    for error in &report.errors {
        println!("      {error}");
    }
    for warning in &report.warnings {
        println!("      warning: {warning}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const VALID: &str = r"
sequence:
  name: blink
initial:
  lit: false
cycle:
  repeat: once
phases:
  - name: light
    duration: 100ms
    set: { lit: true }
  - name: dark
    duration: 50ms
    set: { lit: false }
";

    #[test]
    fn test_valid_file_report() {
        let file = write(VALID);
        let report = check(&ConfigLoader::with_defaults(), file.path(), false);
        assert!(report.valid, "{:?}", report.errors);
        assert_eq!(report.phases, Some(2));
        assert_eq!(report.pass_ms, Some(150));
    }

    #[test]
    fn test_negative_duration_reported() {
        let file = write(&VALID.replace("100ms", "-100ms"));
        let report = check(&ConfigLoader::with_defaults(), file.path(), false);
        assert!(!report.valid);
        assert!(!report.errors.is_empty());
    }

    #[test]
    fn test_missing_file_reported() {
        let report = check(
            &ConfigLoader::with_defaults(),
            Path::new("/nonexistent/seq.yaml"),
            false,
        );
        assert!(!report.valid);
        assert!(report.errors[0].contains("file not found"));
    }

    #[test]
    fn test_strict_promotes_warnings() {
        // Two phases with the same name warn.
        let file = write(&VALID.replace("name: dark", "name: light"));
        let lenient = check(&ConfigLoader::with_defaults(), file.path(), false);
        assert!(lenient.valid);
        assert!(!lenient.warnings.is_empty());

        let strict = check(&ConfigLoader::with_defaults(), file.path(), true);
        assert!(!strict.valid);
        assert!(strict.warnings.is_empty());
        assert!(strict.errors[0].starts_with("warning (strict)"));
    }

    #[test]
    fn test_run_counts_failures() {
        let good = write(VALID);
        let bad = write("sequence: { name: broken }\nphases: []\n");
        let args = ValidateArgs {
            files: vec![good.path().to_path_buf(), bad.path().to_path_buf()],
            format: OutputFormat::Json,
            strict: false,
        };
        let err = run(&args).unwrap_err();
        assert!(matches!(
            err,
            CadenceError::Config(ConfigError::ValidationFailed { count: 1 })
        ));
    }
}
