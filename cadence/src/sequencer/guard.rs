//! Lifecycle guard
//!
//! Binds a [`CycleController`] to a view's mount/unmount lifecycle. Mounting
//! starts the first pass; dropping or unmounting seals the timer registry
//! before anything else is released, so no effect can run afterwards.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::error::SequencerError;
use crate::observability::metrics;

use super::controller::{CycleConfig, CycleController, SequencerEvent, TeardownReport};
use super::timeline::Timeline;

/// Scoped owner of one mounted sequencer instance.
///
/// The guard is synchronous and works in virtual time; see
/// [`Player`](super::driver::Player) for the tokio-driven equivalent.
#[derive(Debug)]
pub struct LifecycleGuard<S: Clone> {
    id: Uuid,
    controller: CycleController<S>,
    unmounted: bool,
}

impl<S: Clone> LifecycleGuard<S> {
    /// Constructs the controller and starts the first pass at instant zero,
    /// after the configured initial delay.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Configuration`] if the controller rejects
    /// the timeline and cycle policy.
    pub fn mount(
        timeline: Arc<Timeline<S>>,
        config: CycleConfig,
        initial: S,
    ) -> Result<(Self, Vec<SequencerEvent>), SequencerError> {
        let mut controller = CycleController::new(timeline, config, initial)?;
        let events = controller.start(Duration::ZERO);
        let id = Uuid::new_v4();

        metrics::record_instance_mounted();
        info!(instance = %id, phases = controller.timeline().len(), "sequencer mounted");

        Ok((
            Self {
                id,
                controller,
                unmounted: false,
            },
            events,
        ))
    }

    /// Instance identifier used in logs.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The owned controller.
    #[must_use]
    pub const fn controller(&self) -> &CycleController<S> {
        &self.controller
    }

    /// Takes the most recent effect failure, if any.
    pub const fn take_failure(&mut self) -> Option<SequencerError> {
        self.controller.take_failure()
    }

    /// Current display state.
    #[must_use]
    pub const fn display(&self) -> &S {
        self.controller.display()
    }

    /// Advances virtual time; see [`CycleController::advance_to`].
    pub fn advance_to(&mut self, now: Duration) -> Vec<SequencerEvent> {
        self.controller.advance_to(now)
    }

    /// Restarts from phase 0 with the initial display state.
    pub fn restart(&mut self, now: Duration) -> Vec<SequencerEvent> {
        self.controller.restart(now)
    }

    /// Swaps in a rebuilt timeline after the view's inputs changed.
    ///
    /// Pending transitions of the old timeline are cancelled before the new
    /// one is installed.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Unmounted`] if the instance was torn down.
    pub fn rebuild(
        &mut self,
        timeline: Arc<Timeline<S>>,
        now: Duration,
    ) -> Result<Vec<SequencerEvent>, SequencerError> {
        info!(instance = %self.id, phases = timeline.len(), "timeline rebuilt");
        self.controller.replace_timeline(timeline, now)
    }

    /// Tears the instance down and reports what was cancelled.
    #[must_use]
    pub fn unmount(mut self) -> TeardownReport {
        self.teardown()
    }

    fn teardown(&mut self) -> TeardownReport {
        let report = self.controller.teardown();
        if !self.unmounted {
            self.unmounted = true;
            metrics::record_instance_unmounted();
            info!(
                instance = %self.id,
                cancelled = report.cancelled,
                mutations = report.stats.mutations,
                "sequencer unmounted"
            );
        }
        report
    }
}

impl<S: Clone> Drop for LifecycleGuard<S> {
    fn drop(&mut self) {
        if !self.unmounted {
            self.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EffectError;
    use crate::sequencer::controller::{ControllerState, Repeat};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn counting(durations: &[i64], hold_ms: i64) -> Arc<Timeline<u32>> {
        let builder = durations
            .iter()
            .enumerate()
            .fold(Timeline::builder(), |b, (i, d)| {
                b.phase(format!("step-{i}"), *d, |n: &u32| Ok(n + 1))
            });
        Arc::new(builder.hold_ms(hold_ms).build().unwrap())
    }

    #[test]
    fn test_unmount_before_first_fire_leaves_nothing() {
        let (guard, events) =
            LifecycleGuard::mount(counting(&[100, 100], 0), CycleConfig::once(), 0).unwrap();
        assert_eq!(events.len(), 1);

        let report = guard.unmount();
        assert_eq!(report.cancelled, 1);
        assert_eq!(report.pending_after, 0);
        assert_eq!(report.stats.mutations, 0);
    }

    #[test]
    fn test_mount_with_initial_delay_then_unmount() {
        let config = CycleConfig::once().with_initial_delay(ms(500));
        let (guard, events) = LifecycleGuard::mount(counting(&[100], 0), config, 0).unwrap();
        assert!(events.is_empty());
        assert_eq!(guard.controller().pending_timers(), 1);

        let report = guard.unmount();
        assert_eq!(report.cancelled, 1);
        assert_eq!(report.stats.mutations, 0);
    }

    #[test]
    fn test_rebuild_cancels_old_timeline() {
        let (mut guard, _) =
            LifecycleGuard::mount(counting(&[100, 100], 0), CycleConfig::once(), 0).unwrap();
        guard.advance_to(ms(100));
        assert_eq!(*guard.display(), 1);

        let events = guard.rebuild(counting(&[50], 0), ms(120)).unwrap();
        assert_eq!(events[0].kind(), "restarted");
        assert_eq!(*guard.display(), 0);

        guard.advance_to(ms(170));
        assert_eq!(*guard.display(), 0, "reset after the single-phase pass");
        assert_eq!(guard.controller().state(), ControllerState::Idle);
        assert_eq!(guard.controller().stats().mutations, 2);
    }

    #[test]
    fn test_effect_failure_reaches_idle() {
        let timeline = Arc::new(
            Timeline::<u32>::builder()
                .phase("one", 100, |_| Ok(1))
                .phase("two", 100, |_| Err(EffectError::msg("jammed")))
                .phase("three", 100, |_| Ok(3))
                .build()
                .unwrap(),
        );
        let config = CycleConfig::default().with_repeat(Repeat::Forever);
        let (mut guard, _) = LifecycleGuard::mount(timeline, config, 0).unwrap();

        let events = guard.advance_to(ms(1_000));
        assert_eq!(events.last().unwrap().kind(), "effect_failed");
        assert_eq!(guard.controller().state(), ControllerState::Idle);
        assert_eq!(*guard.display(), 1);
        assert_eq!(guard.controller().pending_timers(), 0);

        let failure = guard.take_failure().unwrap();
        assert!(matches!(
            failure,
            SequencerError::EffectExecution { ordinal: 1, ref phase, .. } if phase == "two"
        ));
        assert!(guard.take_failure().is_none());
    }
}
