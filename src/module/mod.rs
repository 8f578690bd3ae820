//! Module system
//!
//! Modules are in-process feature units discovered from a [`ModuleSource`],
//! ordered by their declared dependencies, and driven through the lifecycle
//! by the [`ModuleManager`].
//!
//! ## Architecture
//!
//! - **Discovery**: `module.toml` manifests are validated and paired with a
//!   registered factory for their entry point
//! - **Ordering**: hard and soft dependencies form a graph that is
//!   topologically sorted on every bulk operation; cycles and missing hard
//!   dependencies reject only the modules involved
//! - **Lifecycle**: `UNLOADED -> LOADED -> ENABLED` and back, with failures
//!   leaving a module where it was

pub mod loader;
pub mod manager;
pub mod registry;
pub mod report;
pub mod traits;
pub mod validation;

pub use loader::ModuleLoader;
pub use manager::ModuleManager;
pub use registry::{
    factory, DependencyGraph, DependencyResolution, DirectorySource, DiscoveredModule,
    FactoryRegistry, ModuleFactory, ModuleManifest, ModuleSource, StaticSource,
};
pub use report::{
    DependencyStatus, LifecycleReport, ModuleFailure, ModuleInfo, ModuleSnapshot, ModuleStats,
};
pub use traits::{Module, ModuleContext, ModuleDescriptor, ModuleError, ModuleState};
