//! Sequence configuration types
//!
//! Re-exports the schema consumed by the loader in the `cadence` crate.

pub mod schema;
