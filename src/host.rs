//! Host bootstrap
//!
//! Builds the permission store, resolver, command registry, module manager
//! and admin dispatcher from a [`HostConfig`] and owns them for the life of the
//! process. Collaborators get them by reference; there is no global state.

use anyhow::Context;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::admin::AdminDispatcher;
use crate::command::CommandRegistry;
use crate::config::HostConfig;
use crate::module::{
    DirectorySource, FactoryRegistry, LifecycleReport, ModuleLoader, ModuleManager, ModuleStats,
};
use crate::permission::{FileBackend, PermissionResolver, PermissionStore};

/// Host-wide statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HostStats {
    pub modules: ModuleStats,
    /// Users holding at least one grant
    pub users: usize,
    /// Roles holding at least one grant
    pub roles: usize,
    /// Registered commands
    pub commands: usize,
}

/// Outcome of [`Host::start`]
#[derive(Debug, Clone, Default)]
pub struct StartupReport {
    pub loaded: LifecycleReport,
    pub enabled: LifecycleReport,
}

/// Extension host
pub struct Host {
    config: HostConfig,
    permissions: Arc<PermissionStore>,
    resolver: PermissionResolver,
    commands: Arc<CommandRegistry>,
    modules: Arc<ModuleManager>,
    admin: AdminDispatcher,
}

impl Host {
    /// Build every component from configuration
    ///
    /// Relative paths in the configuration are taken as they are, i.e.
    /// relative to the working directory.
    pub fn new(config: HostConfig, factories: FactoryRegistry) -> anyhow::Result<Self> {
        config.validate()?;

        let backend = FileBackend::new(&config.permissions.file)
            .with_context(|| format!("Invalid permission file {}", config.permissions.file))?;
        let permissions = Arc::new(
            PermissionStore::open(Arc::new(backend))
                .with_context(|| format!("Failed to open {}", config.permissions.file))?,
        );
        let resolver = PermissionResolver::new(Arc::clone(&permissions));

        let source = DirectorySource::new(Path::new(&config.modules.modules_dir), factories);
        let commands = Arc::new(CommandRegistry::new());
        let loader = ModuleLoader::new(&config.modules.data_dir)
            .with_overrides(config.modules.module_configs.clone())
            .with_commands(Arc::clone(&commands));
        let modules = Arc::new(
            ModuleManager::new(Arc::new(source))
                .with_loader(loader)
                .with_enabled_modules(config.modules.enabled_modules.clone()),
        );

        let admin = AdminDispatcher::new(Arc::clone(&modules), resolver.clone());

        Ok(Self {
            config,
            permissions,
            resolver,
            commands,
            modules,
            admin,
        })
    }

    /// Load and enable all modules
    pub async fn start(&self) -> anyhow::Result<StartupReport> {
        info!("Starting orion host");
        if self.config.host.dev_mode {
            warn!("Development mode is enabled");
        }
        if !self.config.modules.enabled {
            info!("Module system disabled by configuration");
            return Ok(StartupReport::default());
        }

        let loaded = self
            .modules
            .load_modules()
            .await
            .context("Module discovery failed")?;
        let enabled = self.modules.enable_modules().await;

        let stats = self.stats().await;
        info!("=== Orion host started ===");
        info!(
            "Modules: {} loaded, {} enabled, {} failed",
            stats.modules.total,
            stats.modules.enabled,
            loaded.failures.len() + enabled.failures.len()
        );
        info!("Commands: {} registered", stats.commands);
        info!(
            "Permissions: {} users, {} roles",
            stats.users, stats.roles
        );
        if !self.config.host.guild_id.is_empty() {
            info!("Scoped to guild {}", self.config.host.guild_id);
        }

        Ok(StartupReport { loaded, enabled })
    }

    /// Start, wait for `stop` to resolve, then shut down
    ///
    /// Whatever `stop` yields is logged as the reason for stopping.
    pub async fn run_until<F>(&self, stop: F) -> anyhow::Result<LifecycleReport>
    where
        F: Future,
        F::Output: Display,
    {
        let report = self.start().await?;
        for failure in report.loaded.failures.iter().chain(&report.enabled.failures) {
            warn!("Module {} not started: {}", failure.id, failure.error);
        }

        let reason = stop.await;
        info!("Received {}, shutting down", reason);
        let unloaded = self.shutdown().await;
        info!("Unloaded {} modules", unloaded.count());
        Ok(unloaded)
    }

    /// Module and permission counts
    pub async fn stats(&self) -> HostStats {
        let permissions = self.permissions.stats();
        HostStats {
            modules: self.modules.stats().await,
            users: permissions.users,
            roles: permissions.roles,
            commands: self.commands.len(),
        }
    }

    /// Disable and unload every module
    pub async fn shutdown(&self) -> LifecycleReport {
        info!("Shutting down orion host");
        self.modules.shutdown().await
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn permissions(&self) -> &Arc<PermissionStore> {
        &self.permissions
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn commands(&self) -> &Arc<CommandRegistry> {
        &self.commands
    }

    pub fn modules(&self) -> &Arc<ModuleManager> {
        &self.modules
    }

    pub fn admin(&self) -> &AdminDispatcher {
        &self.admin
    }
}
