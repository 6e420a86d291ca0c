//! Timed phase sequencer.
//!
//! - [`registry`]: owned, group-cancellable delayed actions over virtual time
//! - [`timeline`]: immutable ordered phases plus hold
//! - [`controller`]: the `Idle → Running → Holding → Resetting` state machine
//! - [`guard`]: scoped mount/unmount binding in virtual time
//! - [`driver`]: the same binding driven by the tokio clock

pub mod controller;
pub mod driver;
pub mod guard;
pub mod registry;
pub mod timeline;

pub use controller::{
    ControllerState, ControllerStats, CycleConfig, CycleController, Repeat, SequencerEvent,
    Snapshot, TeardownReport,
};
pub use driver::Player;
pub use guard::LifecycleGuard;
pub use registry::{Fired, TimerHandle, TimerRegistry};
pub use timeline::{Effect, Phase, Timeline, TimelineBuilder};
