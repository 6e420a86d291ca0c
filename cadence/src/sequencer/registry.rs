//! Timer registry
//!
//! Owns every delayed transition scheduled by one sequencer instance so the
//! whole set can be cancelled as a group. Time is virtual: deadlines are
//! offsets from the instance's mount instant, and the owner decides when
//! "now" advances. Nothing here sleeps.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use tracing::trace;

/// Opaque identifier for one scheduled action.
///
/// Handles are allocated monotonically and never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Returns the raw handle value.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// An action whose deadline has passed, removed from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<A> {
    /// Handle the action was scheduled under
    pub handle: TimerHandle,
    /// Deadline the action was due at
    pub deadline: Duration,
    /// The action itself
    pub action: A,
}

/// Registry of pending delayed actions.
///
/// Ordering is by deadline, then by scheduling order, so actions due at the
/// same instant fire first-in first-out.
pub struct TimerRegistry<A> {
    /// Pending actions keyed by `(deadline, handle)`
    pending: BTreeMap<(Duration, TimerHandle), A>,
    /// Reverse index for cancellation by handle
    deadlines: HashMap<TimerHandle, Duration>,
    next_handle: u64,
    sealed: bool,
    cancelled_total: u64,
}

impl<A> TimerRegistry<A> {
    /// Creates an empty, open registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
            next_handle: 0,
            sealed: false,
            cancelled_total: 0,
        }
    }

    /// Schedules `action` to become due at `now + delay`.
    ///
    /// On a sealed registry the action is dropped: a handle is still
    /// returned, but it refers to nothing and the action never fires.
    pub fn schedule(&mut self, now: Duration, delay: Duration, action: A) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;

        if self.sealed {
            trace!(%handle, "registry sealed; dropping scheduled action");
            return handle;
        }

        let deadline = now.saturating_add(delay);
        self.pending.insert((deadline, handle), action);
        self.deadlines.insert(handle, deadline);
        handle
    }

    /// Cancels one pending action. Returns `true` if it was still pending.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let Some(deadline) = self.deadlines.remove(&handle) else {
            return false;
        };
        let removed = self.pending.remove(&(deadline, handle)).is_some();
        if removed {
            self.cancelled_total += 1;
        }
        removed
    }

    /// Cancels every pending action and returns how many were cancelled.
    ///
    /// Idempotent; safe on an empty registry. The registry stays open.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        self.deadlines.clear();
        self.cancelled_total += count as u64;
        count
    }

    /// Cancels everything and refuses all future scheduling.
    ///
    /// Returns the number of actions cancelled.
    pub fn seal(&mut self) -> usize {
        self.sealed = true;
        self.cancel_all()
    }

    /// Returns `true` once [`seal`](Self::seal) has been called.
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Removes and returns the earliest action due at or before `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<Fired<A>> {
        let (&(deadline, handle), _) = self.pending.first_key_value()?;
        if deadline > now {
            return None;
        }
        let action = self.pending.remove(&(deadline, handle))?;
        self.deadlines.remove(&handle);
        Some(Fired {
            handle,
            deadline,
            action,
        })
    }

    /// Returns the earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Returns `true` if `handle` is still pending.
    #[must_use]
    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.deadlines.contains_key(&handle)
    }

    /// Number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total number of actions cancelled over the registry's lifetime.
    #[must_use]
    pub const fn cancelled_total(&self) -> u64 {
        self.cancelled_total
    }
}

impl<A> Default for TimerRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for TimerRegistry<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerRegistry")
            .field("pending", &self.pending.len())
            .field("next_deadline", &self.next_deadline())
            .field("sealed", &self.sealed)
            .finish_non_exhaustive()
    }
}
