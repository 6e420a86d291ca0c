//! Tokio driver
//!
//! [`Player`] runs a [`CycleController`] against the tokio clock. A spawned
//! task sleeps until the next pending deadline, fires everything due under
//! the controller's mutex, and publishes a [`Snapshot`] on a watch channel
//! for the rendering side.
//!
//! Teardown is synchronous: [`Drop`] cancels the task's token and seals the
//! registry while holding the same mutex the task fires under, so once
//! `drop` returns no effect can run even if the task has not been scheduled
//! since.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SequencerError;
use crate::observability::metrics;

use super::controller::{
    ControllerStats, CycleConfig, CycleController, SequencerEvent, Snapshot, TeardownReport,
};
use super::timeline::Timeline;

/// State shared between a [`Player`] handle and its driver task.
struct Shared<S> {
    controller: Mutex<CycleController<S>>,
    /// Mount instant; controller time is measured from here
    origin: Instant,
    /// Woken whenever a command may have moved the next deadline
    wake: Notify,
    snapshots: watch::Sender<Snapshot<S>>,
    events: Option<mpsc::UnboundedSender<SequencerEvent>>,
}

impl<S: Clone> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, CycleController<S>> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    /// Publishes the controller's view and forwards events.
    fn publish(&self, controller: &CycleController<S>, events: Vec<SequencerEvent>) {
        self.snapshots.send_replace(controller.snapshot());
        if let Some(tx) = &self.events {
            for event in events {
                // Receiver gone means nobody is listening; not an error.
                let _ = tx.send(event);
            }
        }
    }

    /// Runs a command against the controller, then wakes the driver.
    fn command<T>(
        &self,
        f: impl FnOnce(&mut CycleController<S>, Duration) -> (T, Vec<SequencerEvent>),
    ) -> T {
        let now = self.elapsed();
        let mut controller = self.lock();
        let (out, events) = f(&mut controller, now);
        self.publish(&controller, events);
        drop(controller);
        self.wake.notify_one();
        out
    }
}

/// A mounted sequencer instance driven by the tokio clock.
pub struct Player<S: Clone + Send + Sync + 'static> {
    id: Uuid,
    shared: Arc<Shared<S>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    unmounted: bool,
}

impl<S: Clone + Send + Sync + 'static> Player<S> {
    /// Mounts an instance and spawns its driver task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Configuration`] if the controller rejects
    /// the timeline and cycle policy.
    pub fn mount(
        timeline: Arc<Timeline<S>>,
        config: CycleConfig,
        initial: S,
    ) -> Result<Self, SequencerError> {
        Self::spawn(timeline, config, initial, None)
    }

    /// Like [`mount`](Self::mount), also returning a receiver for every
    /// [`SequencerEvent`] the instance produces.
    ///
    /// # Errors
    ///
    /// See [`mount`](Self::mount).
    pub fn mount_with_events(
        timeline: Arc<Timeline<S>>,
        config: CycleConfig,
        initial: S,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SequencerEvent>), SequencerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = Self::spawn(timeline, config, initial, Some(tx))?;
        Ok((player, rx))
    }

    fn spawn(
        timeline: Arc<Timeline<S>>,
        config: CycleConfig,
        initial: S,
        events: Option<mpsc::UnboundedSender<SequencerEvent>>,
    ) -> Result<Self, SequencerError> {
        let mut controller = CycleController::new(timeline, config, initial)?;
        let started = controller.start(Duration::ZERO);
        let (snapshots, _) = watch::channel(controller.snapshot());
        let phases = controller.timeline().len();

        let shared = Arc::new(Shared {
            controller: Mutex::new(controller),
            origin: Instant::now(),
            wake: Notify::new(),
            snapshots,
            events,
        });
        {
            let controller = shared.lock();
            shared.publish(&controller, started);
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(drive(Arc::clone(&shared), cancel.clone()));
        let id = Uuid::new_v4();

        metrics::record_instance_mounted();
        info!(instance = %id, phases, "player mounted");

        Ok(Self {
            id,
            shared,
            cancel,
            task: Some(task),
            unmounted: false,
        })
    }

    /// Instance identifier used in logs.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Time since mount on the tokio clock.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.shared.elapsed()
    }

    /// Current view of the instance.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<S> {
        self.shared.snapshots.borrow().clone()
    }

    /// Lifetime counters of the controller.
    #[must_use]
    pub fn stats(&self) -> ControllerStats {
        self.shared.lock().stats()
    }

    /// Takes the most recent effect failure, if any.
    #[must_use]
    pub fn take_failure(&self) -> Option<SequencerError> {
        self.shared.lock().take_failure()
    }

    /// Subscribes to snapshot updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<S>> {
        self.shared.snapshots.subscribe()
    }

    /// Snapshot updates as a stream, starting with the current one.
    #[must_use]
    pub fn stream(&self) -> WatchStream<Snapshot<S>> {
        WatchStream::new(self.subscribe())
    }

    /// Restarts from phase 0 with the initial display state.
    pub fn restart(&self) {
        self.shared
            .command(|controller, now| ((), controller.restart(now)));
    }

    /// Stops the instance, keeping the current display state.
    pub fn stop(&self) {
        self.shared.command(|controller, now| ((), controller.stop(now)));
    }

    /// Swaps in a rebuilt timeline and restarts on it.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::Unmounted`] if the instance was torn down.
    pub fn rebuild(&self, timeline: Arc<Timeline<S>>) -> Result<(), SequencerError> {
        self.shared
            .command(|controller, now| match controller.replace_timeline(timeline, now) {
                Ok(events) => (Ok(()), events),
                Err(e) => (Err(e), Vec::new()),
            })
    }

    /// Tears the instance down and waits for the driver task to exit.
    pub async fn unmount(mut self) -> TeardownReport {
        let report = self.teardown();
        if let Some(task) = self.task.take() {
            // A cancelled or panicked driver has nothing left to clean up.
            let _ = task.await;
        }
        report
    }

    fn teardown(&mut self) -> TeardownReport {
        self.cancel.cancel();
        let report = {
            let mut controller = self.shared.lock();
            let report = controller.teardown();
            self.shared.snapshots.send_replace(controller.snapshot());
            report
        };
        if !self.unmounted {
            self.unmounted = true;
            metrics::record_instance_unmounted();
            info!(instance = %self.id, cancelled = report.cancelled, "player unmounted");
        }
        report
    }
}

impl<S: Clone + Send + Sync + 'static> Drop for Player<S> {
    fn drop(&mut self) {
        if !self.unmounted {
            self.teardown();
        }
    }
}

impl<S: Clone + Send + Sync + 'static> std::fmt::Debug for Player<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("unmounted", &self.unmounted)
            .finish_non_exhaustive()
    }
}

/// Driver loop: sleep until the next deadline or a command, fire, repeat.
async fn drive<S: Clone + Send + Sync + 'static>(shared: Arc<Shared<S>>, cancel: CancellationToken) {
    loop {
        let wake_at = shared.lock().next_deadline().map(|d| shared.origin + d);

        tokio::select! {
            () = cancel.cancelled() => {
                debug!("driver cancelled");
                break;
            }
            () = shared.wake.notified() => {}
            () = sleep_until(wake_at) => {
                let mut controller = shared.lock();
                // Teardown seals under this lock; re-check after acquiring it.
                if cancel.is_cancelled() {
                    break;
                }
                let events = controller.advance_to(shared.elapsed());
                shared.publish(&controller, events);
            }
        }
    }
}

async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
