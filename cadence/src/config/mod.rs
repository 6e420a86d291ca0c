//! Sequence configuration
//!
//! Loading, validation, and compilation of YAML sequence files. The schema
//! itself lives in `cadence-core` and is re-exported here.

pub mod compile;
pub mod loader;
pub mod validation;

pub use cadence_core::config::schema;
pub use compile::Sequence;
pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning, LoaderOptions};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
