//! Module system traits and interfaces
//!
//! Defines the capability interface every module implements, the immutable
//! descriptor produced at discovery time, and the module error taxonomy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::command::CommandRegistry;

/// Module lifecycle state
///
/// `Unloaded` is both the initial and the terminal state. A failed
/// transition leaves the module in the state it started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    /// No runtime record exists (never loaded, or unloaded)
    Unloaded,
    /// Instance created and `on_load` completed
    Loaded,
    /// `on_enable` completed; the module is active
    Enabled,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleState::Unloaded => write!(f, "UNLOADED"),
            ModuleState::Loaded => write!(f, "LOADED"),
            ModuleState::Enabled => write!(f, "ENABLED"),
        }
    }
}

/// Immutable metadata describing a discovered module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Unique, stable identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Module version (semantic versioning)
    pub version: String,
    /// Module author
    pub author: String,
    /// Human-readable description
    pub description: String,
    /// Opaque entry point reference, resolved through a factory registry
    pub main: String,
    /// Modules that must be present and in the target state first
    pub hard_dependencies: Vec<String>,
    /// Modules that are ordered first when present, never blocking
    pub soft_dependencies: Vec<String>,
    /// Project website
    pub website: Option<String>,
    /// License identifier
    pub license: Option<String>,
}

impl ModuleDescriptor {
    /// Create a descriptor with no dependencies; the entry ref defaults to the id
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            main: id.clone(),
            id,
            version: version.into(),
            author: String::new(),
            description: String::new(),
            hard_dependencies: Vec::new(),
            soft_dependencies: Vec::new(),
            website: None,
            license: None,
        }
    }

    /// Builder-style: add a hard dependency
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.hard_dependencies.push(id.into());
        self
    }

    /// Builder-style: add a soft dependency
    pub fn soft_depends_on(mut self, id: impl Into<String>) -> Self {
        self.soft_dependencies.push(id.into());
        self
    }

    /// Builder-style: set the entry point reference
    pub fn with_main(mut self, main: impl Into<String>) -> Self {
        self.main = main.into();
        self
    }

    /// True if `other` is declared as a hard dependency
    pub fn hard_depends_on(&self, other: &str) -> bool {
        self.hard_dependencies.iter().any(|d| d == other)
    }
}

/// Module trait that all modules must implement
///
/// The manager never inspects module types; it only drives these hooks.
/// `on_load` and `on_unload` default to no-ops.
#[async_trait]
pub trait Module: Send + Sync {
    /// Called once after the instance is created.
    ///
    /// The module should validate its configuration here. Returning an error
    /// leaves the module `Unloaded`.
    async fn on_load(&mut self, _context: &ModuleContext) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Activate the module
    async fn on_enable(&mut self) -> Result<(), ModuleError>;

    /// Deactivate the module. Resources acquired in `on_enable` should be released.
    async fn on_disable(&mut self) -> Result<(), ModuleError>;

    /// Called right before the instance is dropped
    async fn on_unload(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }
}

/// Context handed to a module during `on_load`
#[derive(Debug, Clone)]
pub struct ModuleContext {
    /// Module id (descriptor id)
    pub module_id: String,
    /// Unique identifier for this loaded instance
    pub instance_id: String,
    /// Module data directory (where module can store its state)
    pub data_dir: String,
    /// Module configuration (key-value pairs from config file and overrides)
    pub config: HashMap<String, String>,
    /// Host command registry the module may contribute commands to
    pub commands: Arc<CommandRegistry>,
}

impl ModuleContext {
    /// Create a new module context
    pub fn new(module_id: String, data_dir: String, config: HashMap<String, String>) -> Self {
        let instance_id = format!("{}_{}", module_id, uuid::Uuid::new_v4());
        Self {
            module_id,
            instance_id,
            data_dir,
            config,
            commands: Arc::new(CommandRegistry::new()),
        }
    }

    /// Builder-style: share the host's command registry
    pub fn with_commands(mut self, commands: Arc<CommandRegistry>) -> Self {
        self.commands = commands;
        self
    }

    /// Get a configuration value
    pub fn get_config(&self, key: &str) -> Option<&String> {
        self.config.get(key)
    }

    /// Get a configuration value with default
    pub fn get_config_or(&self, key: &str, default: &str) -> String {
        self.config
            .get(key)
            .map(|s| s.as_str())
            .unwrap_or(default)
            .to_string()
    }
}

/// Module system errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModuleError {
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Module {id} is already {state}")]
    AlreadyInState { id: String, state: ModuleState },

    #[error("Module {id} is {actual}, expected {expected}")]
    InvalidState {
        id: String,
        expected: ModuleState,
        actual: ModuleState,
    },

    #[error("Module {id} is missing hard dependency {dependency}")]
    DependencyMissing { id: String, dependency: String },

    #[error("Module {id} cannot proceed: dependency {dependency} is {state}")]
    DependencyNotReady {
        id: String,
        dependency: String,
        state: ModuleState,
    },

    #[error("Module {id} skipped: dependency {dependency} failed")]
    DependencyFailed { id: String, dependency: String },

    #[error("Module {id} is part of a dependency cycle: {}", .cycle.join(" -> "))]
    CircularDependency { id: String, cycle: Vec<String> },

    #[error("Module {id} is still required by: {}", .dependents.join(", "))]
    RequiredByDependents { id: String, dependents: Vec<String> },

    #[error("Duplicate module id: {0}")]
    DuplicateModule(String),

    #[error("No factory registered for entry point: {0}")]
    FactoryNotFound(String),

    #[error("Invalid module manifest: {0}")]
    InvalidManifest(String),

    #[error("Module {id} failed during {hook}: {reason}")]
    HookFailed {
        id: String,
        hook: &'static str,
        reason: String,
    },

    #[error("Module operation failed: {0}")]
    OperationError(String),
}

impl From<anyhow::Error> for ModuleError {
    fn from(e: anyhow::Error) -> Self {
        ModuleError::OperationError(e.to_string())
    }
}

impl From<toml::de::Error> for ModuleError {
    fn from(e: toml::de::Error) -> Self {
        ModuleError::InvalidManifest(e.to_string())
    }
}
