//! Frames
//!
//! A [`Frame`] is the display state of a sequence loaded from YAML: an
//! ordered map of named JSON values. Phase effects written in configuration
//! compile to a [`FrameEffect`], a list of [`FrameOp`]s addressed by
//! dot-notation paths (`digits.3`, `vault.door.open`).
//!
//! Effects never mutate a frame in place. Operations run on a copy and the
//! copy is discarded on the first failure, so a failing phase leaves the
//! previous frame untouched.

use std::fmt;
use std::sync::Arc;

use cadence_core::config::schema::EffectConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EffectError;
use crate::sequencer::Effect;

// ============================================================================
// Frame
// ============================================================================

/// Display state for configuration-driven sequences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frame(IndexMap<String, Value>);

impl Frame {
    /// Creates a frame from top-level fields.
    #[must_use]
    pub const fn new(fields: IndexMap<String, Value>) -> Self {
        Self(fields)
    }

    /// Top-level fields in declaration order.
    #[must_use]
    pub const fn fields(&self) -> &IndexMap<String, Value> {
        &self.0
    }

    /// Returns the value at `path`, if present.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Assigns `value` at `path`, creating missing intermediate objects.
    ///
    /// # Errors
    ///
    /// Fails on a malformed path, an out-of-range array index, or a scalar
    /// in the middle of the path.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), EffectError> {
        *self.slot_mut(path)? = value;
        Ok(())
    }

    /// Removes the value at `path`. Missing paths are left alone.
    ///
    /// # Errors
    ///
    /// Fails on a malformed path or when removing from a scalar.
    pub fn unset(&mut self, path: &str) -> Result<(), EffectError> {
        let segments = parse_path(path)?;
        let Some((last, parents)) = segments.split_last() else {
            return Ok(());
        };

        if parents.is_empty() {
            self.0.shift_remove(*last);
            return Ok(());
        }

        let Some(parent) = self.lookup_mut(parents) else {
            return Ok(());
        };
        match parent {
            Value::Object(map) => {
                map.remove(*last);
                Ok(())
            }
            Value::Array(items) => {
                let index = parse_index(path, last)?;
                if index < items.len() {
                    items.remove(index);
                }
                Ok(())
            }
            Value::Null => Ok(()),
            other => Err(mismatch(path, "object or array", other)),
        }
    }

    /// Appends `value` to the array at `path`; a missing or null target
    /// becomes a one-element array.
    ///
    /// # Errors
    ///
    /// Fails if the target exists and is not an array.
    pub fn push(&mut self, path: &str, value: Value) -> Result<(), EffectError> {
        let slot = self.slot_mut(path)?;
        match slot {
            Value::Array(items) => {
                items.push(value);
                Ok(())
            }
            Value::Null => {
                *slot = Value::Array(vec![value]);
                Ok(())
            }
            other => Err(mismatch(path, "array", other)),
        }
    }

    /// Empties the array, string, or object at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the target is a number or boolean.
    pub fn clear(&mut self, path: &str) -> Result<(), EffectError> {
        let segments = parse_path(path)?;
        let Some(slot) = self.lookup_mut(&segments) else {
            return Ok(());
        };
        match slot {
            Value::Array(items) => items.clear(),
            Value::String(s) => s.clear(),
            Value::Object(map) => map.clear(),
            Value::Null => {}
            other => return Err(mismatch(path, "array, string, or object", other)),
        }
        Ok(())
    }

    /// Adds `delta` to the integer at `path`; missing or null counts as 0.
    ///
    /// # Errors
    ///
    /// Fails on a non-integer target or on overflow.
    pub fn increment(&mut self, path: &str, delta: i64) -> Result<(), EffectError> {
        let slot = self.slot_mut(path)?;
        let current = match slot {
            Value::Null => 0,
            Value::Number(n) => n.as_i64().ok_or_else(|| EffectError::TypeMismatch {
                path: path.to_string(),
                expected: "integer",
                found: "number",
            })?,
            other => return Err(mismatch(path, "integer", other)),
        };
        let next = current.checked_add(delta).ok_or_else(|| EffectError::Path {
            path: path.to_string(),
            reason: format!("{current} + {delta} overflows"),
        })?;
        *slot = Value::from(next);
        Ok(())
    }

    /// Flips the boolean at `path`; missing or null becomes `true`.
    ///
    /// # Errors
    ///
    /// Fails on a non-boolean target.
    pub fn toggle(&mut self, path: &str) -> Result<(), EffectError> {
        let slot = self.slot_mut(path)?;
        let next = match slot {
            Value::Null => true,
            Value::Bool(b) => !*b,
            other => return Err(mismatch(path, "boolean", other)),
        };
        *slot = Value::Bool(next);
        Ok(())
    }

    /// Resolves `path` for writing, creating objects along the way.
    fn slot_mut(&mut self, path: &str) -> Result<&mut Value, EffectError> {
        let segments = parse_path(path)?;
        let (first, rest) = segments
            .split_first()
            .ok_or_else(|| path_error(path, "empty path"))?;

        let mut current = self.0.entry((*first).to_string()).or_insert(Value::Null);
        for segment in rest {
            if current.is_null() {
                *current = Value::Object(serde_json::Map::new());
            }
            current = match current {
                Value::Object(map) => map.entry((*segment).to_string()).or_insert(Value::Null),
                Value::Array(items) => {
                    let index = parse_index(path, segment)?;
                    let len = items.len();
                    items.get_mut(index).ok_or_else(|| {
                        path_error(path, &format!("index {index} out of range (length {len})"))
                    })?
                }
                other => return Err(mismatch(path, "object or array", other)),
            };
        }
        Ok(current)
    }

    /// Resolves existing segments for writing, without creating anything.
    fn lookup_mut(&mut self, segments: &[&str]) -> Option<&mut Value> {
        let (first, rest) = segments.split_first()?;
        let mut current = self.0.get_mut(*first)?;
        for segment in rest {
            current = match current {
                Value::Object(map) => map.get_mut(*segment)?,
                Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl From<IndexMap<String, Value>> for Frame {
    fn from(fields: IndexMap<String, Value>) -> Self {
        Self(fields)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// Splits a dot-notation path, rejecting empty segments.
///
/// # Errors
///
/// Returns [`EffectError::Path`] for an empty path or segment.
pub fn parse_path(path: &str) -> Result<Vec<&str>, EffectError> {
    if path.is_empty() {
        return Err(path_error(path, "empty path"));
    }
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(path_error(path, "empty path segment"));
    }
    Ok(segments)
}

fn parse_index(path: &str, segment: &str) -> Result<usize, EffectError> {
    segment
        .parse::<usize>()
        .map_err(|_| path_error(path, &format!("'{segment}' is not an array index")))
}

fn path_error(path: &str, reason: &str) -> EffectError {
    EffectError::Path {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn mismatch(path: &str, expected: &'static str, found: &Value) -> EffectError {
    EffectError::TypeMismatch {
        path: path.to_string(),
        expected,
        found: type_name(found),
    }
}

/// JSON type name of `value`.
#[must_use]
pub const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Effects
// ============================================================================

/// One frame mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOp {
    /// Assign a value
    Set(String, Value),
    /// Remove a key or array element
    Unset(String),
    /// Append to an array
    Push(String, Value),
    /// Empty a container or string
    Clear(String),
    /// Add an integer delta
    Increment(String, i64),
    /// Flip a boolean
    Toggle(String),
    /// Fail unconditionally
    Fail(String),
}

impl FrameOp {
    fn apply(&self, frame: &mut Frame) -> Result<(), EffectError> {
        match self {
            Self::Set(path, value) => frame.set(path, value.clone()),
            Self::Unset(path) => frame.unset(path),
            Self::Push(path, value) => frame.push(path, value.clone()),
            Self::Clear(path) => frame.clear(path),
            Self::Increment(path, delta) => frame.increment(path, *delta),
            Self::Toggle(path) => frame.toggle(path),
            Self::Fail(message) => Err(EffectError::msg(message.clone())),
        }
    }
}

/// Ordered frame mutations for one phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameEffect {
    ops: Vec<FrameOp>,
}

impl FrameEffect {
    /// Creates an effect from explicit operations.
    #[must_use]
    pub const fn new(ops: Vec<FrameOp>) -> Self {
        Self { ops }
    }

    /// Compiles a configured effect. Operations keep the configured order
    /// within each kind; kinds run `set`, `unset`, `push`, `clear`,
    /// `increment`, `toggle`, `fail`.
    #[must_use]
    pub fn from_config(config: &EffectConfig) -> Self {
        let mut ops = Vec::new();
        if let Some(set) = &config.set {
            ops.extend(set.iter().map(|(p, v)| FrameOp::Set(p.clone(), v.clone())));
        }
        if let Some(unset) = &config.unset {
            ops.extend(unset.iter().cloned().map(FrameOp::Unset));
        }
        if let Some(push) = &config.push {
            ops.extend(push.iter().map(|(p, v)| FrameOp::Push(p.clone(), v.clone())));
        }
        if let Some(clear) = &config.clear {
            ops.extend(clear.iter().cloned().map(FrameOp::Clear));
        }
        if let Some(increment) = &config.increment {
            ops.extend(increment.iter().map(|(p, d)| FrameOp::Increment(p.clone(), *d)));
        }
        if let Some(toggle) = &config.toggle {
            ops.extend(toggle.iter().cloned().map(FrameOp::Toggle));
        }
        if let Some(message) = &config.fail {
            ops.push(FrameOp::Fail(message.clone()));
        }
        Self { ops }
    }

    /// The operations in application order.
    #[must_use]
    pub fn ops(&self) -> &[FrameOp] {
        &self.ops
    }

    /// Applies every operation to a copy of `frame`.
    ///
    /// # Errors
    ///
    /// Returns the first failing operation's error; `frame` is unchanged.
    pub fn apply(&self, frame: &Frame) -> Result<Frame, EffectError> {
        let mut next = frame.clone();
        for op in &self.ops {
            op.apply(&mut next)?;
        }
        Ok(next)
    }

    /// Wraps the effect for use in a timeline.
    #[must_use]
    pub fn into_effect(self) -> Effect<Frame> {
        Arc::new(move |frame: &Frame| self.apply(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(value: Value) -> Frame {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_get_nested() {
        let f = frame(json!({"vault": {"steps": [false, true]}, "n": 1}));
        assert_eq!(f.get("n"), Some(&json!(1)));
        assert_eq!(f.get("vault.steps.1"), Some(&json!(true)));
        assert_eq!(f.get("vault.steps.9"), None);
        assert_eq!(f.get("missing.path"), None);
    }

    #[test]
    fn test_set_creates_intermediate_objects() {
        let mut f = Frame::default();
        f.set("vault.door.open", json!(true)).unwrap();
        assert_eq!(f.get("vault.door.open"), Some(&json!(true)));
    }

    #[test]
    fn test_set_array_index() {
        let mut f = frame(json!({"digits": ["", "", ""]}));
        f.set("digits.1", json!("5")).unwrap();
        assert_eq!(f.get("digits"), Some(&json!(["", "5", ""])));
    }

    #[test]
    fn test_set_index_out_of_range() {
        let mut f = frame(json!({"digits": [""]}));
        let err = f.set("digits.4", json!("x")).unwrap_err();
        assert!(matches!(err, EffectError::Path { .. }));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let mut f = frame(json!({"n": 3}));
        let err = f.set("n.inner", json!(1)).unwrap_err();
        assert_eq!(
            err,
            EffectError::TypeMismatch {
                path: "n.inner".into(),
                expected: "object or array",
                found: "number",
            }
        );
    }

    #[test]
    fn test_malformed_paths() {
        let mut f = Frame::default();
        assert!(f.set("", json!(1)).is_err());
        assert!(f.set("a..b", json!(1)).is_err());
        assert!(parse_path("a.b").is_ok());
    }

    #[test]
    fn test_unset_preserves_order() {
        let mut f = frame(json!({"a": 1, "b": 2, "c": 3}));
        f.unset("b").unwrap();
        let keys: Vec<&String> = f.fields().keys().collect();
        assert_eq!(keys, ["a", "c"]);
        f.unset("missing.deep").unwrap();
    }

    #[test]
    fn test_unset_array_element() {
        let mut f = frame(json!({"items": [1, 2, 3]}));
        f.unset("items.0").unwrap();
        assert_eq!(f.get("items"), Some(&json!([2, 3])));
    }

    #[test]
    fn test_push_and_clear() {
        let mut f = Frame::default();
        f.push("notifications", json!("hi")).unwrap();
        f.push("notifications", json!("again")).unwrap();
        assert_eq!(f.get("notifications"), Some(&json!(["hi", "again"])));
        f.clear("notifications").unwrap();
        assert_eq!(f.get("notifications"), Some(&json!([])));
    }

    #[test]
    fn test_push_onto_string_fails() {
        let mut f = frame(json!({"title": "x"}));
        assert!(matches!(
            f.push("title", json!("y")),
            Err(EffectError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_increment() {
        let mut f = frame(json!({"border": -1}));
        f.increment("border", 1).unwrap();
        f.increment("border", 1).unwrap();
        f.increment("fresh", 5).unwrap();
        assert_eq!(f.get("border"), Some(&json!(1)));
        assert_eq!(f.get("fresh"), Some(&json!(5)));
    }

    #[test]
    fn test_increment_overflow_and_float() {
        let mut f = frame(json!({"max": i64::MAX, "ratio": 0.5}));
        assert!(f.increment("max", 1).is_err());
        assert!(f.increment("ratio", 1).is_err());
    }

    #[test]
    fn test_toggle() {
        let mut f = frame(json!({"open": false}));
        f.toggle("open").unwrap();
        f.toggle("fresh").unwrap();
        assert_eq!(f.get("open"), Some(&json!(true)));
        assert_eq!(f.get("fresh"), Some(&json!(true)));
        assert!(f.toggle("fresh.nested").is_err());
    }

    #[test]
    fn test_effect_order_and_atomicity() {
        let config = EffectConfig {
            set: Some(IndexMap::from([("label".to_string(), json!("unlocking"))])),
            increment: Some(IndexMap::from([("label".to_string(), 1)])),
            ..EffectConfig::default()
        };
        let effect = FrameEffect::from_config(&config);
        assert_eq!(effect.ops().len(), 2);

        let before = frame(json!({"label": "locked"}));
        let err = effect.apply(&before).unwrap_err();
        assert!(matches!(err, EffectError::TypeMismatch { .. }));
        assert_eq!(before.get("label"), Some(&json!("locked")));
    }

    #[test]
    fn test_fail_op_runs_last() {
        let config = EffectConfig {
            toggle: Some(vec!["open".to_string()]),
            fail: Some("lock jammed".to_string()),
            ..EffectConfig::default()
        };
        let effect = FrameEffect::from_config(&config);
        assert_eq!(effect.ops().last(), Some(&FrameOp::Fail("lock jammed".into())));
        assert_eq!(
            effect.apply(&Frame::default()).unwrap_err(),
            EffectError::msg("lock jammed")
        );
    }

    #[test]
    fn test_into_effect() {
        let effect = FrameEffect::new(vec![FrameOp::Set("n".into(), json!(7))]).into_effect();
        let next = effect(&Frame::default()).unwrap();
        assert_eq!(next.get("n"), Some(&json!(7)));
    }

    #[test]
    fn test_display() {
        let f = frame(json!({"open": true, "digits": ["1", ""]}));
        assert_eq!(f.to_string(), r#"open=true digits=["1",""]"#);
    }

    #[test]
    fn test_nested_objects_keep_declaration_order() {
        let f: Frame = serde_yaml::from_str("panel: { zeta: 1, alpha: 2 }\nbadge: x\n").unwrap();
        assert_eq!(f.to_string(), r#"panel={"zeta":1,"alpha":2} badge="x""#);
    }
}
