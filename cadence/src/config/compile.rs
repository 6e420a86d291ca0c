//! Compiling a loaded sequence into a playable timeline.

use std::sync::Arc;

use cadence_core::config::schema::SequenceConfig;
use cadence_core::duration::DurationSpec;

use crate::config::loader::ConfigLimits;
use crate::error::SequencerError;
use crate::frame::{Frame, FrameEffect};
use crate::sequencer::{CycleConfig, LifecycleGuard, Player, Repeat, SequencerEvent, Timeline};

/// A sequence ready to mount.
#[derive(Debug, Clone)]
pub struct Sequence {
    /// Sequence name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Expanded, validated phases
    pub timeline: Arc<Timeline<Frame>>,
    /// Cycle policy
    pub cycle: CycleConfig,
    /// Display state at mount and after every reset
    pub initial: Frame,
}

impl Sequence {
    /// Compiles a configuration.
    ///
    /// Negative or malformed durations are rejected here as well as by the
    /// validator, so a config built in code cannot bypass the check.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Configuration`] for malformed durations,
    /// an empty phase list, a zero pass count, or more expanded phases than
    /// `CADENCE_MAX_PHASES` allows.
    pub fn compile(config: &SequenceConfig) -> Result<Self, SequencerError> {
        Self::compile_with_limits(config, &ConfigLimits::default())
    }

    /// Compiles a configuration against explicit limits.
    ///
    /// # Errors
    ///
    /// See [`Sequence::compile`].
    pub fn compile_with_limits(
        config: &SequenceConfig,
        limits: &ConfigLimits,
    ) -> Result<Self, SequencerError> {
        match config.leaf_count() {
            Some(count) if count <= limits.max_phases => {}
            count => {
                let count = count.map_or_else(|| "overflow".to_string(), |c| c.to_string());
                return Err(SequencerError::Configuration(format!(
                    "too many phases after expansion: {count} (maximum: {})",
                    limits.max_phases
                )));
            }
        }

        let mut builder = Timeline::builder();
        for phase in config.expanded_phases() {
            let ms = millis(&format!("phase '{}'", phase.name), &phase.duration)?;
            let effect = FrameEffect::from_config(&phase.effect).into_effect();
            builder = builder.phase_effect(phase.name, ms, effect);
        }
        let timeline = builder
            .hold_ms(millis("cycle.hold", &config.cycle.hold)?)
            .build()?;

        let repeat = match config.cycle.repeat.passes() {
            None => Repeat::Forever,
            Some(0) => {
                return Err(SequencerError::Configuration(
                    "cycle.repeat must be at least 1".to_string(),
                ));
            }
            Some(n) => Repeat::Times(n),
        };
        let cycle = CycleConfig {
            repeat,
            reset_display: config.cycle.reset,
            initial_delay: duration("cycle.initial_delay", &config.cycle.initial_delay)?,
            gap: duration("cycle.gap", &config.cycle.gap)?,
        };

        Ok(Self {
            name: config.sequence.name.clone(),
            description: config.sequence.description.clone(),
            timeline: Arc::new(timeline),
            cycle,
            initial: Frame::new(config.initial.clone()),
        })
    }

    /// Overrides the pass count.
    #[must_use]
    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.cycle.repeat = repeat;
        self
    }

    /// Mounts the sequence in virtual time.
    ///
    /// # Errors
    ///
    /// See [`LifecycleGuard::mount`].
    pub fn mount(&self) -> Result<(LifecycleGuard<Frame>, Vec<SequencerEvent>), SequencerError> {
        LifecycleGuard::mount(
            Arc::clone(&self.timeline),
            self.cycle.clone(),
            self.initial.clone(),
        )
    }

    /// Mounts the sequence on the tokio clock.
    ///
    /// # Errors
    ///
    /// See [`Player::mount_with_events`].
    pub fn play(
        &self,
    ) -> Result<
        (Player<Frame>, tokio::sync::mpsc::UnboundedReceiver<SequencerEvent>),
        SequencerError,
    > {
        Player::mount_with_events(
            Arc::clone(&self.timeline),
            self.cycle.clone(),
            self.initial.clone(),
        )
    }
}

fn millis(field: &str, spec: &DurationSpec) -> Result<i64, SequencerError> {
    spec.to_millis()
        .map_err(|e| SequencerError::Configuration(format!("{field}: {e}")))
}

fn duration(field: &str, spec: &DurationSpec) -> Result<std::time::Duration, SequencerError> {
    spec.to_duration()
        .map_err(|e| SequencerError::Configuration(format!("{field}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::ControllerState;
    use serde_json::json;
    use std::time::Duration;

    fn compile(yaml: &str) -> Result<Sequence, SequencerError> {
        let config: SequenceConfig = serde_yaml::from_str(yaml).unwrap();
        Sequence::compile(&config)
    }

    const DIGITS: &str = r#"
sequence:
  name: digits
initial:
  digits: ["", ""]
cycle:
  repeat: once
  hold: 300ms
phases:
  - name: "digit-{i}"
    each: ["4", "2"]
    duration: 100ms
    set: { "digits.{i}": "{item}" }
"#;

    #[test]
    fn test_compile_expands_and_times() {
        let sequence = compile(DIGITS).unwrap();
        assert_eq!(sequence.timeline.len(), 2);
        assert_eq!(sequence.timeline.phase(1).unwrap().name(), "digit-1");
        assert_eq!(sequence.timeline.total_duration(), Duration::from_millis(200));
        assert_eq!(sequence.timeline.hold(), Duration::from_millis(300));
        assert_eq!(sequence.cycle.repeat, Repeat::Times(1));
    }

    #[test]
    fn test_compiled_sequence_plays() {
        let sequence = compile(DIGITS).unwrap();
        let (mut guard, _) = sequence.mount().unwrap();
        guard.advance_to(Duration::from_millis(200));
        assert_eq!(guard.display().get("digits"), Some(&json!(["4", "2"])));
        assert_eq!(guard.controller().state(), ControllerState::Holding);
    }

    #[test]
    fn test_negative_duration_is_configuration_error() {
        let err = compile(&DIGITS.replace("100ms", "-100ms")).unwrap_err();
        assert!(matches!(err, SequencerError::Configuration(_)));
        assert!(err.to_string().contains("negative duration"));
    }

    #[test]
    fn test_invalid_duration_is_configuration_error() {
        let err = compile(&DIGITS.replace("hold: 300ms", "hold: later")).unwrap_err();
        assert!(err.to_string().contains("cycle.hold"));
    }

    #[test]
    fn test_phase_limit_checked_before_expansion() {
        let config: SequenceConfig = serde_yaml::from_str(
            r"
sequence: { name: nested }
phases:
  - name: 'outer-{i}'
    repeat: 100000
    steps:
      - { name: 'inner-{i}', repeat: 100000, duration: 1 }
",
        )
        .unwrap();
        let limits = ConfigLimits {
            max_phases: 10,
            max_config_size: 1024,
        };
        let err = Sequence::compile_with_limits(&config, &limits).unwrap_err();
        assert!(matches!(err, SequencerError::Configuration(_)));
        assert!(err.to_string().contains("too many phases after expansion"));
    }

    #[test]
    fn test_no_phases_is_configuration_error() {
        let err = compile("sequence: { name: empty }\n").unwrap_err();
        assert!(matches!(err, SequencerError::Configuration(_)));
    }
}
