//! Phase timeline
//!
//! A declarative, immutable description of what changes and when. Building a
//! timeline schedules nothing; the cycle controller walks it later. One
//! timeline can be shared by any number of controllers through an `Arc`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{EffectError, SequencerError};

/// A phase effect: a pure function from the current display state to the
/// next one.
pub type Effect<S> = Arc<dyn Fn(&S) -> Result<S, EffectError> + Send + Sync>;

/// One entry in a [`Timeline`].
pub struct Phase<S> {
    ordinal: usize,
    name: String,
    duration: Duration,
    effect: Effect<S>,
}

impl<S> Phase<S> {
    /// Zero-based position within the timeline.
    #[must_use]
    pub const fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Phase name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time from entering the phase until its effect fires.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Applies the effect to `state`, returning the next state.
    ///
    /// # Errors
    ///
    /// Propagates the effect's own failure; `state` is never modified.
    pub fn apply(&self, state: &S) -> Result<S, EffectError> {
        (self.effect)(state)
    }
}

impl<S> Clone for Phase<S> {
    fn clone(&self) -> Self {
        Self {
            ordinal: self.ordinal,
            name: self.name.clone(),
            duration: self.duration,
            effect: Arc::clone(&self.effect),
        }
    }
}

impl<S> fmt::Debug for Phase<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Phase")
            .field("ordinal", &self.ordinal)
            .field("name", &self.name)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

/// Ordered, validated list of phases plus the hold that follows them.
pub struct Timeline<S> {
    phases: Vec<Phase<S>>,
    /// Cumulative instant at which each phase's effect fires
    fire_offsets: Vec<Duration>,
    hold: Duration,
}

impl<S> Timeline<S> {
    /// Starts building a timeline.
    #[must_use]
    pub const fn builder() -> TimelineBuilder<S> {
        TimelineBuilder {
            phases: Vec::new(),
            hold_ms: 0,
        }
    }

    /// The phases in order.
    #[must_use]
    pub fn phases(&self) -> &[Phase<S>] {
        &self.phases
    }

    /// Returns the phase at `ordinal`.
    #[must_use]
    pub fn phase(&self, ordinal: usize) -> Option<&Phase<S>> {
        self.phases.get(ordinal)
    }

    /// Number of phases (never zero).
    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Always `false`; empty timelines are rejected at construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// How long the final state is held before the controller resets.
    #[must_use]
    pub const fn hold(&self) -> Duration {
        self.hold
    }

    /// Sum of all phase durations. The hold is not included.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.fire_offsets.last().copied().unwrap_or_default()
    }

    /// Total duration plus hold: the length of one full pass.
    #[must_use]
    pub fn pass_duration(&self) -> Duration {
        self.total_duration().saturating_add(self.hold)
    }

    /// Instant, relative to the start of a pass, at which phase `ordinal`
    /// fires.
    #[must_use]
    pub fn fire_offset(&self, ordinal: usize) -> Option<Duration> {
        self.fire_offsets.get(ordinal).copied()
    }

    /// Returns the ordinal of the phase in progress at `elapsed`.
    ///
    /// Phase `i` spans `(start_i, end_i]`, with phase 0 also owning instant
    /// zero. At or beyond [`total_duration`](Self::total_duration) the
    /// terminal phase is returned.
    #[must_use]
    pub fn phase_at(&self, elapsed: Duration) -> usize {
        let last = self.phases.len().saturating_sub(1);
        if elapsed >= self.total_duration() {
            return last;
        }
        self.fire_offsets
            .iter()
            .position(|end| elapsed <= *end)
            .unwrap_or(last)
    }
}

impl<S: Clone> Timeline<S> {
    /// Replays every effect that has fired by `elapsed`, starting from
    /// `initial`, without scheduling anything.
    ///
    /// # Errors
    ///
    /// Returns the first effect failure encountered.
    pub fn state_at(&self, initial: &S, elapsed: Duration) -> Result<S, EffectError> {
        let mut state = initial.clone();
        for (phase, offset) in self.phases.iter().zip(&self.fire_offsets) {
            if *offset > elapsed {
                break;
            }
            state = phase.apply(&state)?;
        }
        Ok(state)
    }
}

impl<S> fmt::Debug for Timeline<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeline")
            .field("phases", &self.phases)
            .field("total_duration", &self.total_duration())
            .field("hold", &self.hold)
            .finish()
    }
}

/// Builder for [`Timeline`].
///
/// Durations are taken as signed milliseconds so that negative values can
/// be rejected with a configuration error rather than being unrepresentable
/// at the call site.
pub struct TimelineBuilder<S> {
    phases: Vec<(String, i64, Effect<S>)>,
    hold_ms: i64,
}

impl<S> TimelineBuilder<S> {
    /// Appends a phase.
    #[must_use]
    pub fn phase<F>(self, name: impl Into<String>, duration_ms: i64, effect: F) -> Self
    where
        F: Fn(&S) -> Result<S, EffectError> + Send + Sync + 'static,
    {
        self.phase_effect(name, duration_ms, Arc::new(effect))
    }

    /// Appends a phase with an already shared effect.
    #[must_use]
    pub fn phase_effect(mut self, name: impl Into<String>, duration_ms: i64, effect: Effect<S>) -> Self {
        self.phases.push((name.into(), duration_ms, effect));
        self
    }

    /// Sets the hold that follows the last phase.
    #[must_use]
    pub const fn hold_ms(mut self, hold_ms: i64) -> Self {
        self.hold_ms = hold_ms;
        self
    }

    /// Validates and freezes the timeline.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Configuration`] if the phase list is empty
    /// or any duration (including the hold) is negative.
    pub fn build(self) -> Result<Timeline<S>, SequencerError> {
        if self.phases.is_empty() {
            return Err(SequencerError::Configuration(
                "timeline requires at least one phase".to_string(),
            ));
        }

        let hold = non_negative(self.hold_ms)
            .ok_or_else(|| SequencerError::Configuration(format!("negative hold: {}ms", self.hold_ms)))?;

        let mut phases = Vec::with_capacity(self.phases.len());
        let mut fire_offsets = Vec::with_capacity(self.phases.len());
        let mut elapsed = Duration::ZERO;

        for (ordinal, (name, duration_ms, effect)) in self.phases.into_iter().enumerate() {
            let duration = non_negative(duration_ms).ok_or_else(|| {
                SequencerError::Configuration(format!(
                    "phase {ordinal} ('{name}') has negative duration: {duration_ms}ms"
                ))
            })?;
            elapsed = elapsed.saturating_add(duration);
            fire_offsets.push(elapsed);
            phases.push(Phase {
                ordinal,
                name,
                duration,
                effect,
            });
        }

        Ok(Timeline {
            phases,
            fire_offsets,
            hold,
        })
    }
}

fn non_negative(ms: i64) -> Option<Duration> {
    u64::try_from(ms).ok().map(Duration::from_millis)
}
