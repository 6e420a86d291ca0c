//! Cycle controller
//!
//! Drives passes through a [`Timeline`], applying phase effects to the
//! display state as their timers fire. The controller is a synchronous state
//! machine over virtual time: callers tell it what "now" is through
//! [`CycleController::advance_to`], and it fires every transition that has
//! come due, in order.
//!
//! ```text
//! Idle ─start/restart─▶ Running(0) ─▶ Running(1) ─▶ … ─▶ Holding ─▶ Resetting ─┐
//!   ▲                                                                          │
//!   └──────────── last pass / stop / effect failure ◀──────── next pass ◀──────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, trace};

use crate::error::SequencerError;
use crate::observability::metrics;

use super::registry::TimerRegistry;
use super::timeline::Timeline;

// ============================================================================
// Configuration
// ============================================================================

/// Number of passes a controller makes through its timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Repeat {
    /// Loop until stopped or torn down
    #[default]
    Forever,
    /// Stop after this many passes
    Times(u64),
}

impl Repeat {
    /// Returns `true` if another pass may start after `completed` passes.
    #[must_use]
    pub const fn allows_another(self, completed: u64) -> bool {
        match self {
            Self::Forever => true,
            Self::Times(n) => completed < n,
        }
    }
}

/// Cycle policy for a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleConfig {
    /// Number of passes
    pub repeat: Repeat,
    /// Restore the initial display state while resetting
    pub reset_display: bool,
    /// Delay between [`CycleController::start`] and the first pass
    pub initial_delay: Duration,
    /// Pause in `Resetting` before the next pass begins
    pub gap: Duration,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            repeat: Repeat::Forever,
            reset_display: true,
            initial_delay: Duration::ZERO,
            gap: Duration::ZERO,
        }
    }
}

impl CycleConfig {
    /// A single pass that resets at the end.
    #[must_use]
    pub fn once() -> Self {
        Self {
            repeat: Repeat::Times(1),
            ..Self::default()
        }
    }

    /// Sets the repeat policy.
    #[must_use]
    pub const fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    /// Sets whether the display is restored between passes.
    #[must_use]
    pub const fn with_reset_display(mut self, reset: bool) -> Self {
        self.reset_display = reset;
        self
    }

    /// Sets the delay before the first pass.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the pause between passes.
    #[must_use]
    pub const fn with_gap(mut self, gap: Duration) -> Self {
        self.gap = gap;
        self
    }
}

// ============================================================================
// State, Events, Stats
// ============================================================================

/// Controller state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ControllerState {
    /// Not running; terminal for single-pass timelines
    Idle,
    /// Waiting for phase `phase`'s effect to fire
    Running {
        /// Ordinal of the phase in progress
        phase: usize,
    },
    /// Every effect has fired; holding the final state
    Holding,
    /// Between passes
    Resetting,
}

impl ControllerState {
    /// Short label used in logs and renderers.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running { .. } => "running",
            Self::Holding => "holding",
            Self::Resetting => "resetting",
        }
    }
}

/// Something the controller did while advancing.
///
/// Timestamps are milliseconds since the instance was mounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SequencerEvent {
    /// A pass began at phase 0
    CycleStarted {
        /// When
        at_ms: u64,
        /// One-based pass number within the current run
        cycle: u64,
    },
    /// A phase effect was applied to the display state
    PhaseApplied {
        /// When
        at_ms: u64,
        /// Pass number
        cycle: u64,
        /// Phase ordinal
        ordinal: usize,
        /// Phase name
        name: String,
    },
    /// The last effect fired; the hold began
    HoldEntered {
        /// When
        at_ms: u64,
        /// Pass number
        cycle: u64,
    },
    /// The display state was restored to its initial value
    Reset {
        /// When
        at_ms: u64,
        /// Pass number that just ended
        cycle: u64,
    },
    /// A pass finished its hold
    CycleCompleted {
        /// When
        at_ms: u64,
        /// Pass number
        cycle: u64,
    },
    /// The configured number of passes has run
    Finished {
        /// When
        at_ms: u64,
        /// Passes completed in this run
        cycles: u64,
    },
    /// A phase effect failed; the controller went idle
    EffectFailed {
        /// When
        at_ms: u64,
        /// Pass number
        cycle: u64,
        /// Phase ordinal
        ordinal: usize,
        /// Phase name
        name: String,
        /// Rendered error
        error: String,
    },
    /// An explicit restart cancelled pending timers
    Restarted {
        /// When
        at_ms: u64,
        /// Timers cancelled
        cancelled: usize,
    },
    /// An explicit stop cancelled pending timers
    Stopped {
        /// When
        at_ms: u64,
        /// Timers cancelled
        cancelled: usize,
    },
}

impl SequencerEvent {
    /// Event kind as a `snake_case` label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CycleStarted { .. } => "cycle_started",
            Self::PhaseApplied { .. } => "phase_applied",
            Self::HoldEntered { .. } => "hold_entered",
            Self::Reset { .. } => "reset",
            Self::CycleCompleted { .. } => "cycle_completed",
            Self::Finished { .. } => "finished",
            Self::EffectFailed { .. } => "effect_failed",
            Self::Restarted { .. } => "restarted",
            Self::Stopped { .. } => "stopped",
        }
    }

    /// Milliseconds since mount at which the event happened.
    #[must_use]
    pub const fn at_ms(&self) -> u64 {
        match self {
            Self::CycleStarted { at_ms, .. }
            | Self::PhaseApplied { at_ms, .. }
            | Self::HoldEntered { at_ms, .. }
            | Self::Reset { at_ms, .. }
            | Self::CycleCompleted { at_ms, .. }
            | Self::Finished { at_ms, .. }
            | Self::EffectFailed { at_ms, .. }
            | Self::Restarted { at_ms, .. }
            | Self::Stopped { at_ms, .. } => *at_ms,
        }
    }
}

/// Lifetime counters for one controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    /// Effects applied to the display state
    pub mutations: u64,
    /// Passes that finished their hold
    pub cycles_completed: u64,
    /// Display resets to the initial state
    pub resets: u64,
    /// Transitions dropped because their instance or epoch had ended
    pub stale_fires: u64,
    /// Effects that failed
    pub effect_failures: u64,
    /// Timers cancelled by restart, stop, failure, or teardown
    pub timers_cancelled: u64,
}

/// Point-in-time view handed to the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot<S> {
    /// Milliseconds since mount
    pub at_ms: u64,
    /// Controller state
    pub state: ControllerState,
    /// Pass number within the current run
    pub cycle: u64,
    /// Display state
    pub display: S,
}

/// What teardown cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    /// Timers cancelled by the teardown itself
    pub cancelled: usize,
    /// Timers still registered afterwards; always zero
    pub pending_after: usize,
    /// Final lifetime counters
    pub stats: ControllerStats,
}

// ============================================================================
// Controller
// ============================================================================

/// Transition scheduled in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Enter `Running(0)` and schedule phase 0
    Begin,
    /// Apply the effect of phase `n`
    Apply(usize),
    /// End the hold
    Release,
}

/// A step tagged with the epoch it was scheduled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Scheduled {
    epoch: u64,
    step: Step,
}

/// Walks a timeline over virtual time, owning the display state.
pub struct CycleController<S> {
    timeline: Arc<Timeline<S>>,
    config: CycleConfig,
    initial: S,
    display: S,
    state: ControllerState,
    registry: TimerRegistry<Scheduled>,
    /// Bumped by start, restart, stop, failure, and teardown; scheduled
    /// steps from an older epoch are stale.
    epoch: u64,
    now: Duration,
    /// Pass number within the current run
    cycle: u64,
    stats: ControllerStats,
    last_failure: Option<SequencerError>,
}

impl<S: Clone> CycleController<S> {
    /// Creates an idle controller. Nothing is scheduled until
    /// [`start`](Self::start) or [`restart`](Self::restart).
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Configuration`] for a looping policy whose
    /// passes take no time at all, which could never yield.
    pub fn new(
        timeline: Arc<Timeline<S>>,
        config: CycleConfig,
        initial: S,
    ) -> Result<Self, SequencerError> {
        if config.repeat == Repeat::Forever
            && timeline.pass_duration().is_zero()
            && config.gap.is_zero()
        {
            return Err(SequencerError::Configuration(
                "a looping timeline needs a non-zero phase duration, hold, or gap".to_string(),
            ));
        }

        Ok(Self {
            timeline,
            config,
            display: initial.clone(),
            initial,
            state: ControllerState::Idle,
            registry: TimerRegistry::new(),
            epoch: 0,
            now: Duration::ZERO,
            cycle: 0,
            stats: ControllerStats::default(),
            last_failure: None,
        })
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Begins a fresh run, honouring the configured initial delay.
    pub fn start(&mut self, now: Duration) -> Vec<SequencerEvent> {
        if self.registry.is_sealed() {
            return Vec::new();
        }
        self.observe(now);
        self.begin_epoch();
        self.display = self.initial.clone();
        self.cycle = 0;
        self.state = ControllerState::Idle;

        let mut events = Vec::new();
        if self.config.initial_delay.is_zero() {
            self.begin_cycle(&mut events);
        } else {
            self.schedule(self.config.initial_delay, Step::Begin);
            debug!(delay_ms = millis(self.config.initial_delay), "first pass armed");
        }
        events
    }

    /// Cancels everything, restores the initial display state, and enters
    /// `Running(0)` regardless of the current state.
    ///
    /// Calling this twice in a row is equivalent to calling it once. A torn
    /// down controller ignores it.
    pub fn restart(&mut self, now: Duration) -> Vec<SequencerEvent> {
        if self.registry.is_sealed() {
            return Vec::new();
        }
        self.observe(now);
        let cancelled = self.begin_epoch();
        self.display = self.initial.clone();
        self.cycle = 0;

        let mut events = vec![SequencerEvent::Restarted {
            at_ms: millis(self.now),
            cancelled,
        }];
        debug!(cancelled, "restart");
        self.begin_cycle(&mut events);
        events
    }

    /// Cancels pending transitions and goes idle, keeping the display as is.
    pub fn stop(&mut self, now: Duration) -> Vec<SequencerEvent> {
        self.observe(now);
        let cancelled = self.begin_epoch();
        self.state = ControllerState::Idle;
        debug!(cancelled, "stopped");
        vec![SequencerEvent::Stopped {
            at_ms: millis(self.now),
            cancelled,
        }]
    }

    /// Replaces the timeline and restarts on it.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Unmounted`] after teardown.
    pub fn replace_timeline(
        &mut self,
        timeline: Arc<Timeline<S>>,
        now: Duration,
    ) -> Result<Vec<SequencerEvent>, SequencerError> {
        if self.registry.is_sealed() {
            return Err(SequencerError::Unmounted);
        }
        self.timeline = timeline;
        Ok(self.restart(now))
    }

    /// Fires every transition due at or before `now`, in deadline order.
    ///
    /// Time never runs backwards: a `now` earlier than the last observed
    /// instant is treated as that instant.
    pub fn advance_to(&mut self, now: Duration) -> Vec<SequencerEvent> {
        let mut events = Vec::new();
        let target = now.max(self.now);

        while let Some(fired) = self.registry.pop_due(target) {
            self.now = fired.deadline;
            let Scheduled { epoch, step } = fired.action;

            if epoch != self.epoch || self.registry.is_sealed() {
                self.stats.stale_fires += 1;
                metrics::record_stale_fire();
                trace!(handle = %fired.handle, epoch, current = self.epoch, "stale transition dropped");
                continue;
            }

            match step {
                Step::Begin => self.begin_cycle(&mut events),
                Step::Apply(ordinal) => self.apply_phase(ordinal, &mut events),
                Step::Release => self.release(&mut events),
            }
        }

        self.now = target;
        events
    }

    /// Seals the registry: every pending transition is cancelled and none
    /// can be scheduled again.
    pub fn teardown(&mut self) -> TeardownReport {
        let cancelled = self.registry.seal();
        self.epoch += 1;
        self.state = ControllerState::Idle;
        self.stats.timers_cancelled = self.registry.cancelled_total();
        if cancelled > 0 {
            metrics::record_timers_cancelled(cancelled);
        }
        debug!(cancelled, "controller torn down");
        TeardownReport {
            cancelled,
            pending_after: self.registry.len(),
            stats: self.stats,
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Current display state.
    #[must_use]
    pub const fn display(&self) -> &S {
        &self.display
    }

    /// Initial display state.
    #[must_use]
    pub const fn initial(&self) -> &S {
        &self.initial
    }

    /// Current state machine position.
    #[must_use]
    pub const fn state(&self) -> ControllerState {
        self.state
    }

    /// Pass number within the current run (zero before the first pass).
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// The timeline being walked.
    #[must_use]
    pub const fn timeline(&self) -> &Arc<Timeline<S>> {
        &self.timeline
    }

    /// The cycle policy.
    #[must_use]
    pub const fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Last observed instant.
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Deadline of the next pending transition.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.registry.next_deadline()
    }

    /// Number of pending transitions.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.registry.len()
    }

    /// Returns `true` once torn down.
    #[must_use]
    pub const fn is_torn_down(&self) -> bool {
        self.registry.is_sealed()
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> ControllerStats {
        ControllerStats {
            timers_cancelled: self.registry.cancelled_total(),
            ..self.stats
        }
    }

    /// Takes the most recent effect failure, leaving `None` behind.
    pub const fn take_failure(&mut self) -> Option<SequencerError> {
        self.last_failure.take()
    }

    /// Copies out the current view for rendering.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<S> {
        Snapshot {
            at_ms: millis(self.now),
            state: self.state,
            cycle: self.cycle,
            display: self.display.clone(),
        }
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    fn observe(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Cancels every pending transition and invalidates stragglers.
    fn begin_epoch(&mut self) -> usize {
        let cancelled = self.registry.cancel_all();
        self.epoch += 1;
        if cancelled > 0 {
            metrics::record_timers_cancelled(cancelled);
        }
        cancelled
    }

    fn schedule(&mut self, delay: Duration, step: Step) {
        let scheduled = Scheduled {
            epoch: self.epoch,
            step,
        };
        self.registry.schedule(self.now, delay, scheduled);
    }

    fn begin_cycle(&mut self, events: &mut Vec<SequencerEvent>) {
        self.cycle += 1;
        self.state = ControllerState::Running { phase: 0 };
        events.push(SequencerEvent::CycleStarted {
            at_ms: millis(self.now),
            cycle: self.cycle,
        });
        debug!(cycle = self.cycle, "cycle started");

        if let Some(first) = self.timeline.phase(0) {
            let delay = first.duration();
            self.schedule(delay, Step::Apply(0));
        }
    }

    fn apply_phase(&mut self, ordinal: usize, events: &mut Vec<SequencerEvent>) {
        if self.state != (ControllerState::Running { phase: ordinal }) {
            self.stats.stale_fires += 1;
            metrics::record_stale_fire();
            trace!(ordinal, state = self.state.label(), "out-of-order phase dropped");
            return;
        }

        let timeline = Arc::clone(&self.timeline);
        let Some(phase) = timeline.phase(ordinal) else {
            return;
        };

        match phase.apply(&self.display) {
            Ok(next) => {
                self.display = next;
                self.stats.mutations += 1;
                metrics::record_phase_applied(phase.name());
                events.push(SequencerEvent::PhaseApplied {
                    at_ms: millis(self.now),
                    cycle: self.cycle,
                    ordinal,
                    name: phase.name().to_string(),
                });
                debug!(cycle = self.cycle, ordinal, phase = phase.name(), "phase applied");

                match timeline.phase(ordinal + 1) {
                    Some(next_phase) => {
                        self.state = ControllerState::Running { phase: ordinal + 1 };
                        self.schedule(next_phase.duration(), Step::Apply(ordinal + 1));
                    }
                    None => {
                        self.state = ControllerState::Holding;
                        events.push(SequencerEvent::HoldEntered {
                            at_ms: millis(self.now),
                            cycle: self.cycle,
                        });
                        self.schedule(timeline.hold(), Step::Release);
                    }
                }
            }
            Err(source) => {
                let cancelled = self.begin_epoch();
                self.state = ControllerState::Idle;
                self.stats.effect_failures += 1;
                metrics::record_effect_failure();
                error!(
                    cycle = self.cycle,
                    ordinal,
                    phase = phase.name(),
                    cancelled,
                    error = %source,
                    "phase effect failed; sequencer idle"
                );
                events.push(SequencerEvent::EffectFailed {
                    at_ms: millis(self.now),
                    cycle: self.cycle,
                    ordinal,
                    name: phase.name().to_string(),
                    error: source.to_string(),
                });
                self.last_failure = Some(SequencerError::EffectExecution {
                    phase: phase.name().to_string(),
                    ordinal,
                    source,
                });
            }
        }
    }

    fn release(&mut self, events: &mut Vec<SequencerEvent>) {
        self.state = ControllerState::Resetting;
        if self.config.reset_display {
            self.display = self.initial.clone();
            self.stats.resets += 1;
            metrics::record_reset();
            events.push(SequencerEvent::Reset {
                at_ms: millis(self.now),
                cycle: self.cycle,
            });
        }

        self.stats.cycles_completed += 1;
        metrics::record_cycle_completed();
        events.push(SequencerEvent::CycleCompleted {
            at_ms: millis(self.now),
            cycle: self.cycle,
        });

        if self.config.repeat.allows_another(self.cycle) {
            if self.config.gap.is_zero() {
                self.begin_cycle(events);
            } else {
                self.schedule(self.config.gap, Step::Begin);
            }
        } else {
            self.state = ControllerState::Idle;
            events.push(SequencerEvent::Finished {
                at_ms: millis(self.now),
                cycles: self.cycle,
            });
            debug!(cycles = self.cycle, "run finished");
        }
    }
}

impl<S> std::fmt::Debug for CycleController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleController")
            .field("state", &self.state)
            .field("cycle", &self.cycle)
            .field("now", &self.now)
            .field("pending", &self.registry.len())
            .finish_non_exhaustive()
    }
}

/// Milliseconds, saturating at `u64::MAX`.
pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
