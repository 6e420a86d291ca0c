//! Sequence configuration schema
//!
//! This module defines the declarative form of a timed phase sequence as
//! written in YAML. A sequence names its initial display state, the cycle
//! policy, and an ordered list of phases, each carrying a duration and a
//! frame effect.
//!
//! ```yaml
//! sequence:
//!   name: otp-reveal
//! initial:
//!   digits: ["", "", ""]
//!   border: -1
//! cycle:
//!   repeat: forever
//!   hold: 500ms
//! phases:
//!   - name: digit-{i}
//!     each: ["3", "5", "8"]
//!     steps:
//!       - name: move
//!         duration: 300ms
//!         increment: { border: 1 }
//!       - name: reveal
//!         duration: 200ms
//!         set: { "digits.{i}": "{item}" }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::duration::DurationSpec;

/// Placeholder replaced by the zero-based repetition index.
pub const INDEX_PLACEHOLDER: &str = "{i}";

/// Placeholder replaced by the current `each` item.
pub const ITEM_PLACEHOLDER: &str = "{item}";

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration for a sequence file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SequenceConfig {
    /// Sequence metadata (required)
    pub sequence: SequenceMetadata,

    /// Initial display state. Restored on every reset.
    #[serde(default)]
    pub initial: IndexMap<String, Value>,

    /// Cycle policy
    #[serde(default)]
    pub cycle: CycleSettings,

    /// Ordered phase list
    #[serde(default)]
    pub phases: Vec<PhaseConfig>,
}

impl SequenceConfig {
    /// Returns the phase list with every `repeat`, `each`, and `steps`
    /// entry expanded into concrete, leaf phases.
    #[must_use]
    pub fn expanded_phases(&self) -> Vec<PhaseConfig> {
        self.phases.iter().flat_map(PhaseConfig::expand).collect()
    }

    /// Returns how many leaf phases [`expanded_phases`](Self::expanded_phases)
    /// would produce, without expanding anything.
    ///
    /// Returns `None` if the count overflows `usize`.
    #[must_use]
    pub fn leaf_count(&self) -> Option<usize> {
        self.phases
            .iter()
            .try_fold(0usize, |total, phase| total.checked_add(phase.leaf_count()?))
    }
}

/// Sequence identification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SequenceMetadata {
    /// Sequence name (required)
    pub name: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Tags used for filtering
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

// ============================================================================
// Cycle Policy
// ============================================================================

/// How a sequence repeats once its phases have run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CycleSettings {
    /// Number of passes through the timeline.
    #[serde(default)]
    pub repeat: RepeatSpec,

    /// Restore the initial display state between passes.
    #[serde(default = "default_reset")]
    pub reset: bool,

    /// Delay before the first pass after mount.
    #[serde(default)]
    pub initial_delay: DurationSpec,

    /// Pause after a reset before the next pass begins.
    #[serde(default)]
    pub gap: DurationSpec,

    /// How long the final state is held before resetting.
    #[serde(default)]
    pub hold: DurationSpec,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            repeat: RepeatSpec::default(),
            reset: default_reset(),
            initial_delay: DurationSpec::default(),
            gap: DurationSpec::default(),
            hold: DurationSpec::default(),
        }
    }
}

const fn default_reset() -> bool {
    true
}

/// Repeat count: `forever`, `once`, or an explicit number of passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepeatSpec {
    /// Explicit pass count
    Times(u64),
    /// Keyword form
    Keyword(RepeatKeyword),
}

impl Default for RepeatSpec {
    fn default() -> Self {
        Self::Keyword(RepeatKeyword::Forever)
    }
}

/// Keyword repeat counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatKeyword {
    /// Loop until stopped
    Forever,
    /// Single pass
    Once,
}

impl RepeatSpec {
    /// Returns the pass count, or `None` for an unbounded loop.
    #[must_use]
    pub const fn passes(self) -> Option<u64> {
        match self {
            Self::Times(n) => Some(n),
            Self::Keyword(RepeatKeyword::Once) => Some(1),
            Self::Keyword(RepeatKeyword::Forever) => None,
        }
    }
}

// ============================================================================
// Phases
// ============================================================================

/// A phase entry.
///
/// A leaf phase carries a `duration` and an effect. An entry with `steps`
/// is a group whose steps are expanded in order; an entry with `repeat` or
/// `each` is expanded once per repetition with `{i}` (and `{item}`)
/// substituted in names, paths, and string values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PhaseConfig {
    /// Phase name
    pub name: String,

    /// Time from entering the phase until its effect fires
    #[serde(default)]
    pub duration: DurationSpec,

    /// Expand this entry `n` times
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<u32>,

    /// Expand this entry once per item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub each: Option<Vec<Value>>,

    /// Nested steps making up a group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<PhaseConfig>>,

    /// Frame mutations applied when the phase fires
    #[serde(flatten)]
    pub effect: EffectConfig,
}

impl PhaseConfig {
    /// Returns `true` if this entry is a group of nested steps.
    #[must_use]
    pub const fn is_group(&self) -> bool {
        self.steps.is_some()
    }

    /// Returns how many leaf phases [`expand`](Self::expand) would produce,
    /// or `None` if the count overflows `usize`.
    #[must_use]
    pub fn leaf_count(&self) -> Option<usize> {
        let iterations = match (&self.each, self.repeat) {
            (Some(items), _) => items.len(),
            (None, Some(n)) => usize::try_from(n).ok()?,
            (None, None) => 1,
        };
        let per_iteration = match &self.steps {
            Some(steps) => steps
                .iter()
                .try_fold(0usize, |total, step| total.checked_add(step.leaf_count()?))?,
            None => 1,
        };
        iterations.checked_mul(per_iteration)
    }

    /// Expands this entry into leaf phases.
    ///
    /// A group's step names are prefixed with the group name
    /// (`digit-0/reveal`).
    #[must_use]
    pub fn expand(&self) -> Vec<Self> {
        let iterations: Vec<Option<(usize, Value)>> = match (&self.each, self.repeat) {
            (Some(items), _) => items
                .iter()
                .cloned()
                .enumerate()
                .map(Some)
                .collect(),
            (None, Some(n)) => (0..n as usize)
                .map(|i| Some((i, Value::from(i))))
                .collect(),
            (None, None) => vec![None],
        };

        let mut out = Vec::new();
        for iteration in iterations {
            let instance = iteration.as_ref().map_or_else(
                || self.without_repetition(),
                |(i, item)| self.without_repetition().substitute(*i, item),
            );

            match &instance.steps {
                Some(steps) => {
                    for step in steps {
                        for mut leaf in step.expand() {
                            leaf.name = format!("{}/{}", instance.name, leaf.name);
                            out.push(leaf);
                        }
                    }
                }
                None => out.push(instance),
            }
        }
        out
    }

    fn without_repetition(&self) -> Self {
        Self {
            repeat: None,
            each: None,
            ..self.clone()
        }
    }

    /// Replaces placeholders throughout the entry, including nested steps.
    fn substitute(&self, index: usize, item: &Value) -> Self {
        let sub = |s: &str| substitute_str(s, index, item);
        Self {
            name: sub(&self.name),
            duration: match &self.duration {
                DurationSpec::Text(t) => DurationSpec::Text(sub(t)),
                other => other.clone(),
            },
            repeat: self.repeat,
            each: self.each.clone(),
            steps: self
                .steps
                .as_ref()
                .map(|steps| steps.iter().map(|s| s.substitute(index, item)).collect()),
            effect: self.effect.substitute(index, item),
        }
    }
}

/// Declarative frame mutations.
///
/// Operations are applied in field order: `set`, `unset`, `push`, `clear`,
/// `increment`, `toggle`, then `fail`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EffectConfig {
    /// Assign values at paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<IndexMap<String, Value>>,

    /// Remove keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unset: Option<Vec<String>>,

    /// Append values to arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<IndexMap<String, Value>>,

    /// Empty arrays, strings, and objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear: Option<Vec<String>>,

    /// Add integer deltas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment: Option<IndexMap<String, i64>>,

    /// Flip booleans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toggle: Option<Vec<String>>,

    /// Always fail with this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail: Option<String>,
}

impl EffectConfig {
    /// Returns `true` if the effect performs no operation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Returns every path the effect touches, in application order.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = Vec::new();
        if let Some(set) = &self.set {
            paths.extend(set.keys().map(String::as_str));
        }
        if let Some(unset) = &self.unset {
            paths.extend(unset.iter().map(String::as_str));
        }
        if let Some(push) = &self.push {
            paths.extend(push.keys().map(String::as_str));
        }
        if let Some(clear) = &self.clear {
            paths.extend(clear.iter().map(String::as_str));
        }
        if let Some(increment) = &self.increment {
            paths.extend(increment.keys().map(String::as_str));
        }
        if let Some(toggle) = &self.toggle {
            paths.extend(toggle.iter().map(String::as_str));
        }
        paths
    }

    fn substitute(&self, index: usize, item: &Value) -> Self {
        let sub = |s: &String| substitute_str(s, index, item);
        let sub_map = |m: &IndexMap<String, Value>| {
            m.iter()
                .map(|(k, v)| (sub(k), substitute_value(v, index, item)))
                .collect::<IndexMap<_, _>>()
        };
        Self {
            set: self.set.as_ref().map(sub_map),
            unset: self.unset.as_ref().map(|v| v.iter().map(sub).collect()),
            push: self.push.as_ref().map(sub_map),
            clear: self.clear.as_ref().map(|v| v.iter().map(sub).collect()),
            increment: self
                .increment
                .as_ref()
                .map(|m| m.iter().map(|(k, d)| (sub(k), *d)).collect()),
            toggle: self.toggle.as_ref().map(|v| v.iter().map(sub).collect()),
            fail: self.fail.as_ref().map(sub),
        }
    }
}

// ============================================================================
// Placeholder Substitution
// ============================================================================

fn item_text(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn substitute_str(s: &str, index: usize, item: &Value) -> String {
    s.replace(INDEX_PLACEHOLDER, &index.to_string())
        .replace(ITEM_PLACEHOLDER, &item_text(item))
}

/// Substitutes placeholders inside a JSON value.
///
/// A string that is exactly `{item}` is replaced by the item itself, so
/// non-string items keep their type.
fn substitute_value(value: &Value, index: usize, item: &Value) -> Value {
    match value {
        Value::String(s) if s == ITEM_PLACEHOLDER => item.clone(),
        Value::String(s) => Value::String(substitute_str(s, index, item)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| substitute_value(v, index, item))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (substitute_str(k, index, item), substitute_value(v, index, item)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(yaml: &str) -> SequenceConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_minimal_sequence_defaults() {
        let config = parse(
            r"
sequence:
  name: blink
phases:
  - name: on
    duration: 100ms
    set: { lit: true }
",
        );
        assert_eq!(config.sequence.name, "blink");
        assert!(config.initial.is_empty());
        assert_eq!(config.cycle.repeat.passes(), None);
        assert!(config.cycle.reset);
        assert_eq!(config.phases.len(), 1);
        assert_eq!(
            config.phases[0].effect.set.as_ref().unwrap()["lit"],
            json!(true)
        );
    }

    #[test]
    fn test_repeat_forms() {
        let once: RepeatSpec = serde_yaml::from_str("once").unwrap();
        let forever: RepeatSpec = serde_yaml::from_str("forever").unwrap();
        let three: RepeatSpec = serde_yaml::from_str("3").unwrap();
        assert_eq!(once.passes(), Some(1));
        assert_eq!(forever.passes(), None);
        assert_eq!(three.passes(), Some(3));
        assert!(serde_yaml::from_str::<RepeatSpec>("sometimes").is_err());
    }

    #[test]
    fn test_expand_repeat_substitutes_index() {
        let phase = PhaseConfig {
            name: "step-{i}".to_string(),
            duration: DurationSpec::Millis(120),
            repeat: Some(3),
            effect: EffectConfig {
                set: Some(IndexMap::from([("circuit".to_string(), json!("{item}"))])),
                ..Default::default()
            },
            ..Default::default()
        };
        let leaves = phase.expand();
        let names: Vec<&str> = leaves.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["step-0", "step-1", "step-2"]);
        assert_eq!(leaves[2].effect.set.as_ref().unwrap()["circuit"], json!(2));
        assert!(leaves.iter().all(|p| p.repeat.is_none()));
    }

    #[test]
    fn test_expand_each_with_steps() {
        let config = parse(
            r#"
sequence:
  name: otp
phases:
  - name: digit-{i}
    each: ["3", "5"]
    steps:
      - name: move
        duration: 300ms
        increment: { border: 1 }
      - name: reveal
        duration: 200ms
        set: { "digits.{i}": "{item}" }
"#,
        );
        let leaves = config.expanded_phases();
        let names: Vec<&str> = leaves.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            ["digit-0/move", "digit-0/reveal", "digit-1/move", "digit-1/reveal"]
        );
        assert_eq!(
            leaves[3].effect.set.as_ref().unwrap()["digits.1"],
            json!("5")
        );
    }

    #[test]
    fn test_leaf_count_matches_expansion() {
        let config = parse(
            r#"
sequence:
  name: grid
phases:
  - name: row-{i}
    repeat: 3
    steps:
      - name: cell-{i}
        each: [a, b]
        duration: 10ms
      - name: empty
        steps: []
  - name: tail
    duration: 5ms
"#,
        );
        assert_eq!(config.leaf_count(), Some(7));
        assert_eq!(config.expanded_phases().len(), 7);
    }

    #[test]
    fn test_leaf_count_without_expanding() {
        let inner = PhaseConfig {
            name: "inner".to_string(),
            repeat: Some(u32::MAX),
            ..Default::default()
        };
        let outer = PhaseConfig {
            name: "outer".to_string(),
            repeat: Some(u32::MAX),
            steps: Some(vec![inner]),
            ..Default::default()
        };
        let expected = usize::try_from(u64::from(u32::MAX) * u64::from(u32::MAX)).ok();
        assert_eq!(outer.leaf_count(), expected);

        let config = SequenceConfig {
            sequence: SequenceMetadata::default(),
            initial: IndexMap::new(),
            cycle: CycleSettings::default(),
            phases: vec![outer.clone(), outer.clone(), outer],
        };
        assert_eq!(config.leaf_count(), None);
    }

    #[test]
    fn test_item_inside_string_is_rendered() {
        let value = substitute_value(&json!("code {item} at {i}"), 4, &json!(7));
        assert_eq!(value, json!("code 7 at 4"));
    }

    #[test]
    fn test_effect_is_empty() {
        assert!(EffectConfig::default().is_empty());
        let effect = EffectConfig {
            toggle: Some(vec!["open".to_string()]),
            ..Default::default()
        };
        assert!(!effect.is_empty());
        assert_eq!(effect.paths(), ["open"]);
    }
}
