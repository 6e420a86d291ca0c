//! `cadence-core`: shared types and the sequence configuration schema
//!
//! This crate provides the configuration types, duration parsing, and
//! error types shared between the sequencer engine and the `cadence` CLI.
//! It performs no I/O.

pub mod config;
pub mod duration;
pub mod error;
