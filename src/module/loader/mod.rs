//! Module loader
//!
//! Builds per-module load contexts from on-disk configuration.

pub mod loader;

pub use loader::ModuleLoader;
