//! Module validation framework
//!
//! Provides manifest validation: id and version format, entry point
//! presence, and dependency declaration checks.

pub mod manifest_validator;

pub use manifest_validator::{ManifestValidator, ValidationResult};
