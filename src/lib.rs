//! Orion - extension host for a persistent bot process
//!
//! This crate discovers feature units ("modules"), orders them by their
//! declared dependencies and drives them through a load/enable/disable
//! lifecycle, while a hierarchical permission engine decides whether an
//! actor (a user, optionally acting through roles) may invoke a capability.
//!
//! ## Components
//!
//! 1. [`permission`]: permission nodes, the persisted grant store, and the
//!    resolver answering authorization checks
//! 2. [`module`]: manifests, discovery, dependency ordering and the
//!    lifecycle manager
//! 3. [`command`]: the registry modules contribute named commands to
//! 4. [`admin`]: the permission-gated administrative command path
//! 5. [`host`]: bootstrap wiring everything together from [`config`]
//!
//! ## Design Principles
//!
//! 1. **Fault isolation**: a failing module or permission write is reported,
//!    never fatal to the process
//! 2. **Deterministic ordering**: ties in the dependency order follow
//!    discovery order
//! 3. **Explicit ownership**: every registry is constructed by the host and
//!    passed by reference

pub mod admin;
pub mod command;
pub mod config;
pub mod host;
pub mod module;
pub mod permission;
pub mod utils;

pub use admin::{AdminCommand, AdminDispatcher, AdminError, AdminReply};
pub use command::{Command, CommandError, CommandInvocation, CommandRegistry};
pub use config::HostConfig;
pub use host::{Host, HostStats};
pub use module::{
    LifecycleReport, Module, ModuleContext, ModuleDescriptor, ModuleError, ModuleManager,
    ModuleState,
};
pub use permission::{
    ActorContext, Namespace, PermissionError, PermissionResolver, PermissionStore,
};
