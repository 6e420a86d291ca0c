//! `Cadence` - Timed phase sequencer
//!
//! Drives cancellable, looping, multi-phase timelines of display states,
//! the kind used for staged UI animations. A timeline is an ordered list of
//! phases, each with a duration and an effect on the display state, plus a
//! hold at the end of every pass. Sequences are written in YAML and played
//! against the tokio clock or stepped on a virtual one.

pub mod cli;
pub mod config;
pub mod error;
pub mod frame;
pub mod observability;
pub mod render;
pub mod scenarios;
pub mod sequencer;
