//! Module registry and discovery
//!
//! Handles module discovery, manifest parsing, entry point factories and
//! dependency resolution.

pub mod dependencies;
pub mod discovery;
pub mod factory;
pub mod manifest;

pub use dependencies::{DependencyGraph, DependencyResolution};
pub use discovery::{DirectorySource, DiscoveredModule, ModuleSource, StaticSource};
pub use factory::{factory, FactoryRegistry, ModuleFactory};
pub use manifest::ModuleManifest;
