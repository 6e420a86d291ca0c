//! Sequence validation
//!
//! Schema and semantic validation for sequence files, run after
//! environment substitution and deserialization. Validation collects every
//! issue rather than stopping at the first, so one `cadence validate` run
//! reports everything wrong with a file.

use std::collections::HashSet;

use cadence_core::config::schema::{PhaseConfig, SequenceConfig};
use cadence_core::duration::{DurationError, DurationSpec};

use crate::config::loader::ConfigLimits;
use crate::error::{Severity, ValidationIssue};
use crate::frame::parse_path;

/// Result of sequence validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Sequence validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a sequence and returns every issue found.
    pub fn validate(&mut self, config: &SequenceConfig, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_metadata(config);
        self.validate_initial(config);
        self.validate_cycle(config);

        if config.phases.is_empty() {
            self.add_error("phases", "A sequence requires at least one phase");
        }
        for (i, phase) in config.phases.iter().enumerate() {
            self.validate_entry(phase, &format!("phases[{i}]"));
        }

        // Count first: nested repeats can describe far more phases than
        // fit in memory.
        if self.validate_limits(config.leaf_count(), limits) {
            let leaves = config.expanded_phases();
            self.validate_leaves(config, &leaves);
        }

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Schema Validation
    // ========================================================================

    fn validate_metadata(&mut self, config: &SequenceConfig) {
        if config.sequence.name.trim().is_empty() {
            self.add_error(
                "sequence.name",
                "Sequence name is required and cannot be empty",
            );
        }
        if config.sequence.name.len() > 100 {
            self.add_warning(
                "sequence.name",
                "Sequence name is unusually long (> 100 characters)",
            );
        }
    }

    fn validate_initial(&mut self, config: &SequenceConfig) {
        for key in config.initial.keys() {
            if key.is_empty() || key.contains('.') {
                self.add_error(
                    &format!("initial.{key}"),
                    "Initial state keys must be non-empty and must not contain '.'",
                );
            }
        }
    }

    fn validate_cycle(&mut self, config: &SequenceConfig) {
        let cycle = &config.cycle;
        if cycle.repeat.passes() == Some(0) {
            self.add_error("cycle.repeat", "repeat must be at least 1, 'once', or 'forever'");
        }
        self.check_duration("cycle.hold", &cycle.hold);
        self.check_duration("cycle.gap", &cycle.gap);
        self.check_duration("cycle.initial_delay", &cycle.initial_delay);
        if !cycle.reset && cycle.repeat.passes() != Some(1) {
            self.add_warning(
                "cycle.reset",
                "Looping without reset replays effects on an already-changed state",
            );
        }
    }

    /// Validates one raw entry and its nested steps.
    fn validate_entry(&mut self, phase: &PhaseConfig, path: &str) {
        if phase.name.trim().is_empty() {
            self.add_error(&format!("{path}.name"), "Phase name cannot be empty");
        }
        if phase.repeat == Some(0) {
            self.add_error(&format!("{path}.repeat"), "repeat must be at least 1");
        }
        if phase.each.as_ref().is_some_and(Vec::is_empty) {
            self.add_error(&format!("{path}.each"), "each must list at least one item");
        }
        if phase.repeat.is_some() && phase.each.is_some() {
            self.add_warning(
                &format!("{path}.repeat"),
                "repeat is ignored when each is given",
            );
        }

        match &phase.steps {
            Some(steps) => {
                if steps.is_empty() {
                    self.add_error(&format!("{path}.steps"), "A group requires at least one step");
                }
                if !phase.effect.is_empty() {
                    self.add_warning(path, "Effects on a group are ignored; move them into a step");
                }
                if phase.duration != DurationSpec::default() {
                    self.add_warning(
                        &format!("{path}.duration"),
                        "Duration on a group is ignored; each step has its own",
                    );
                }
                for (j, step) in steps.iter().enumerate() {
                    self.validate_entry(step, &format!("{path}.steps[{j}]"));
                }
            }
            None => {
                if phase.effect.is_empty() {
                    self.add_warning(path, "Phase has no effect; it only adds delay");
                }
            }
        }
    }

    // ========================================================================
    // Semantic Validation
    // ========================================================================

    /// Validates expanded leaf phases: durations, paths, names.
    fn validate_leaves(&mut self, config: &SequenceConfig, leaves: &[PhaseConfig]) {
        let mut seen = HashSet::new();
        let mut total_ms: i64 = 0;

        for leaf in leaves {
            let path = format!("phases.{}", leaf.name);

            if !seen.insert(leaf.name.as_str()) {
                self.add_warning(&path, "Duplicate phase name");
            }

            if let Some(ms) = self.check_duration(&format!("{path}.duration"), &leaf.duration) {
                total_ms = total_ms.saturating_add(ms);
            }

            for effect_path in leaf.effect.paths() {
                if let Err(e) = parse_path(effect_path) {
                    self.add_error(&path, &format!("Invalid effect path: {e}"));
                    continue;
                }
                let root = effect_path.split('.').next().unwrap_or_default();
                if !config.initial.contains_key(root) {
                    self.add_warning(
                        &path,
                        &format!("'{root}' is not declared in initial; resets will drop it"),
                    );
                }
            }
        }

        let loops = config.cycle.repeat.passes().is_none();
        let hold = config.cycle.hold.to_millis().unwrap_or(0);
        let gap = config.cycle.gap.to_millis().unwrap_or(0);
        if loops && total_ms == 0 && hold == 0 && gap == 0 && !leaves.is_empty() {
            self.add_error(
                "cycle",
                "A looping sequence needs a non-zero phase duration, hold, or gap",
            );
        }
    }

    /// Returns `true` if the expanded phase count is within the limit.
    fn validate_limits(&mut self, phase_count: Option<usize>, limits: &ConfigLimits) -> bool {
        match phase_count {
            Some(count) if count <= limits.max_phases => true,
            count => {
                let count = count.map_or_else(|| "overflow".to_string(), |c| c.to_string());
                self.add_error(
                    "phases",
                    &format!(
                        "Too many phases after expansion: {count} (maximum: {}). \
                         Set CADENCE_MAX_PHASES to increase the limit.",
                        limits.max_phases
                    ),
                );
                false
            }
        }
    }

    /// Records an error for a malformed or negative duration and returns
    /// the value in milliseconds when it is usable.
    fn check_duration(&mut self, path: &str, spec: &DurationSpec) -> Option<i64> {
        match spec.to_duration() {
            Ok(_) => spec.to_millis().ok(),
            Err(DurationError::Negative(_)) => {
                self.add_error(path, &format!("Duration must not be negative: {spec}"));
                None
            }
            Err(e) => {
                self.add_error(path, &e.to_string());
                None
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ConfigLimits {
        ConfigLimits {
            max_phases: 1000,
            max_config_size: 1024 * 1024,
        }
    }

    fn validate(yaml: &str) -> ValidationResult {
        let config: SequenceConfig = serde_yaml::from_str(yaml).unwrap();
        Validator::new().validate(&config, &limits())
    }

    fn has_error(result: &ValidationResult, needle: &str) -> bool {
        result.errors.iter().any(|e| e.message.contains(needle))
    }

    const MINIMAL: &str = r"
sequence:
  name: minimal
initial:
  open: false
phases:
  - name: open
    duration: 100ms
    set: { open: true }
";

    #[test]
    fn test_minimal_is_valid() {
        let result = validate(MINIMAL);
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_empty_name() {
        let result = validate(&MINIMAL.replace("name: minimal", "name: ''"));
        assert!(result.errors.iter().any(|e| e.path == "sequence.name"));
    }

    #[test]
    fn test_no_phases() {
        let result = validate("sequence: { name: x }\n");
        assert!(has_error(&result, "at least one phase"));
    }

    #[test]
    fn test_negative_duration() {
        let result = validate(&MINIMAL.replace("100ms", "-5ms"));
        assert!(has_error(&result, "must not be negative"));
        assert!(result.errors.iter().any(|e| e.path == "phases.open.duration"));
    }

    #[test]
    fn test_invalid_duration() {
        let result = validate(&MINIMAL.replace("100ms", "soon"));
        assert!(has_error(&result, "invalid duration"));
    }

    #[test]
    fn test_negative_hold() {
        let yaml = format!("{MINIMAL}cycle:\n  hold: -1s\n");
        let result = validate(&yaml);
        assert!(result.errors.iter().any(|e| e.path == "cycle.hold"));
    }

    #[test]
    fn test_zero_repeat_is_error() {
        let yaml = format!("{MINIMAL}cycle:\n  repeat: 0\n");
        assert!(has_error(&validate(&yaml), "repeat must be at least 1"));

        let phase_repeat = MINIMAL.replace("    duration: 100ms", "    repeat: 0\n    duration: 100ms");
        assert!(has_error(&validate(&phase_repeat), "repeat must be at least 1"));
    }

    #[test]
    fn test_zero_length_loop() {
        let yaml = MINIMAL.replace("100ms", "0ms");
        assert!(has_error(&validate(&yaml), "non-zero phase duration"));

        let once = format!("{}cycle:\n  repeat: once\n", MINIMAL.replace("100ms", "0ms"));
        assert!(validate(&once).is_valid());
    }

    #[test]
    fn test_duplicate_names_warn() {
        let yaml = r"
sequence: { name: dup }
initial: { n: 0 }
phases:
  - { name: tick, duration: 10, increment: { n: 1 } }
  - { name: tick, duration: 10, increment: { n: 1 } }
";
        let result = validate(yaml);
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.message.contains("Duplicate")));
    }

    #[test]
    fn test_empty_effect_warns() {
        let yaml = r"
sequence: { name: pause }
phases:
  - { name: wait, duration: 500ms }
";
        let result = validate(yaml);
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.message.contains("no effect")));
    }

    #[test]
    fn test_malformed_effect_path() {
        let yaml = r"
sequence: { name: bad }
initial: { a: {} }
phases:
  - { name: p, duration: 10, set: { 'a..b': 1 } }
";
        assert!(has_error(&validate(yaml), "Invalid effect path"));
    }

    #[test]
    fn test_undeclared_root_warns() {
        let yaml = r"
sequence: { name: loose }
phases:
  - { name: p, duration: 10, set: { stray: 1 } }
";
        let result = validate(yaml);
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.message.contains("'stray'")));
    }

    #[test]
    fn test_group_checks() {
        let yaml = r"
sequence: { name: groups }
initial: { n: 0 }
phases:
  - name: empty
    steps: []
  - name: noisy
    set: { n: 1 }
    steps:
      - { name: inner, duration: 10, increment: { n: 1 } }
";
        let result = validate(yaml);
        assert!(has_error(&result, "at least one step"));
        assert!(result.warnings.iter().any(|w| w.message.contains("group are ignored")));
    }

    #[test]
    fn test_expansion_limit() {
        let yaml = r"
sequence: { name: many }
initial: { n: 0 }
phases:
  - { name: 'tick-{i}', repeat: 50, duration: 10, increment: { n: 1 } }
";
        let config: SequenceConfig = serde_yaml::from_str(yaml).unwrap();
        let tight = ConfigLimits {
            max_phases: 10,
            ..limits()
        };
        let result = Validator::new().validate(&config, &tight);
        assert!(has_error(&result, "Too many phases after expansion: 50"));
    }

    #[test]
    fn test_nested_repeats_rejected_before_expansion() {
        let yaml = r"
sequence: { name: nested }
phases:
  - name: 'outer-{i}'
    repeat: 100000
    steps:
      - { name: 'inner-{i}', repeat: 100000, duration: 1 }
";
        let config: SequenceConfig = serde_yaml::from_str(yaml).unwrap();
        let tight = ConfigLimits {
            max_phases: 10,
            ..limits()
        };
        let result = Validator::new().validate(&config, &tight);
        assert!(has_error(
            &result,
            "Too many phases after expansion: 10000000000"
        ));
    }

    #[test]
    fn test_phase_count_overflow_rejected() {
        let yaml = r"
sequence: { name: huge }
phases:
  - name: a
    repeat: 4294967295
    steps:
      - name: b
        repeat: 4294967295
        steps:
          - { name: c, repeat: 4294967295, duration: 1 }
";
        let config: SequenceConfig = serde_yaml::from_str(yaml).unwrap();
        let result = Validator::new().validate(&config, &limits());
        assert!(has_error(&result, "Too many phases after expansion: overflow"));
    }

    #[test]
    fn test_collects_all_errors() {
        let yaml = r"
sequence: { name: '' }
cycle: { repeat: 0, gap: -1 }
phases:
  - { name: p, duration: nope, set: { x: 1 } }
";
        let result = validate(yaml);
        assert!(result.errors.len() >= 4, "{:?}", result.errors);
    }
}
