//! Module manager for orchestrating all modules
//!
//! Drives every module through `UNLOADED -> LOADED -> ENABLED` and back,
//! in dependency order. Bulk operations are best-effort: a failing module is
//! reported and skipped (along with anything that hard-depends on it) while
//! the rest of the sweep continues.
//!
//! Administrative operations are serialized internally. Queries only take a
//! read lock on the module table and may run at any time; each state change
//! is published with a single write, so a query sees a module either before
//! or after a transition.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::module::loader::ModuleLoader;
use crate::module::registry::{DependencyGraph, DiscoveredModule, ModuleSource};
use crate::module::report::{
    DependencyStatus, LifecycleReport, ModuleInfo, ModuleSnapshot, ModuleStats,
};
use crate::module::traits::{Module, ModuleDescriptor, ModuleError, ModuleState};

/// Managed module instance
struct ManagedModule {
    /// Shared descriptor
    descriptor: Arc<ModuleDescriptor>,
    /// Current state (`Loaded` or `Enabled`; unloaded modules have no record)
    state: ModuleState,
    /// Loaded instance; locked only while one of its hooks runs
    instance: Arc<Mutex<Box<dyn Module>>>,
}

/// Loaded modules plus the order they were loaded in
#[derive(Default)]
struct ModuleTable {
    records: HashMap<String, ManagedModule>,
    order: Vec<String>,
}

impl ModuleTable {
    fn state(&self, id: &str) -> Option<ModuleState> {
        self.records.get(id).map(|m| m.state)
    }

    fn snapshot(&self, id: &str) -> Option<ModuleSnapshot> {
        self.records.get(id).map(|m| ModuleSnapshot {
            descriptor: Arc::clone(&m.descriptor),
            state: m.state,
        })
    }

    fn descriptors(&self) -> Vec<Arc<ModuleDescriptor>> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(|m| Arc::clone(&m.descriptor))
            .collect()
    }

    /// Modules in the given states that hard-depend on `id`
    fn dependents_in(&self, id: &str, states: &[ModuleState]) -> Vec<String> {
        self.order
            .iter()
            .filter_map(|other| self.records.get(other))
            .filter(|m| states.contains(&m.state) && m.descriptor.hard_depends_on(id))
            .map(|m| m.descriptor.id.clone())
            .collect()
    }
}

/// Module manager coordinates all loaded modules
pub struct ModuleManager {
    /// Where modules are discovered
    source: Arc<dyn ModuleSource>,
    /// Builds load contexts
    loader: ModuleLoader,
    /// Modules `enable_modules` may enable (empty = all)
    enabled_modules: Vec<String>,
    /// Loaded modules
    modules: RwLock<ModuleTable>,
    /// Serializes administrative operations
    admin: Mutex<()>,
}

impl ModuleManager {
    /// Create a new module manager over a module source
    pub fn new(source: Arc<dyn ModuleSource>) -> Self {
        Self {
            source,
            loader: ModuleLoader::default(),
            enabled_modules: Vec::new(),
            modules: RwLock::new(ModuleTable::default()),
            admin: Mutex::new(()),
        }
    }

    /// Use a specific loader for module contexts
    pub fn with_loader(mut self, loader: ModuleLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Restrict `enable_modules` to the listed ids (empty = all)
    pub fn with_enabled_modules(mut self, enabled_modules: Vec<String>) -> Self {
        self.enabled_modules = enabled_modules;
        self
    }

    // ------------------------------------------------------------------
    // Bulk operations
    // ------------------------------------------------------------------

    /// Discover modules and load every loadable one in dependency order
    ///
    /// Returns `Err` only if discovery itself fails. Modules that are
    /// already loaded are left alone.
    pub async fn load_modules(&self) -> Result<LifecycleReport, ModuleError> {
        let _admin = self.admin.lock().await;
        info!("Loading modules");

        let discovered = self.source.discover()?;
        let (loaded_ids, mut descriptors) = {
            let table = self.modules.read().await;
            (table.order.clone(), table.descriptors())
        };

        let mut candidates: HashMap<String, DiscoveredModule> = HashMap::new();
        let mut report = LifecycleReport::default();
        for module in discovered {
            if loaded_ids.iter().any(|id| id == module.id()) {
                debug!("Module {} already loaded, skipping", module.id());
                continue;
            }
            descriptors.push(Arc::clone(&module.descriptor));
            candidates.entry(module.id().to_string()).or_insert(module);
        }

        let resolution = DependencyGraph::new(descriptors).resolve();
        for (id, error) in resolution.rejected {
            warn!("Module {} will not be loaded: {}", id, error);
            report.fail(id, error);
        }

        for id in &resolution.load_order {
            let Some(module) = candidates.get(id) else {
                continue;
            };
            let result = match self.check_loaded_dependencies(&module.descriptor).await {
                Ok(()) => self.load_discovered(module).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => report.success(id.clone()),
                Err(e) => {
                    error!("Failed to load module {}: {}", id, e);
                    report.fail(id.clone(), e);
                }
            }
        }

        info!(
            "Loaded {} modules ({} failed)",
            report.count(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Enable every loaded module, dependencies first
    pub async fn enable_modules(&self) -> LifecycleReport {
        let _admin = self.admin.lock().await;
        info!("Enabling modules");

        let mut report = LifecycleReport::default();
        for id in self.dependency_order().await {
            if self.modules.read().await.state(&id) != Some(ModuleState::Loaded) {
                continue;
            }
            if !self.enabled_modules.is_empty() && !self.enabled_modules.contains(&id) {
                debug!("Module {} not in enabled_modules, leaving it loaded", id);
                continue;
            }
            match self.enable_locked(&id).await {
                Ok(()) => report.success(id),
                Err(e) => {
                    error!("Failed to enable module {}: {}", id, e);
                    report.fail(id, e);
                }
            }
        }

        info!("Enabled {} modules", report.count());
        report
    }

    /// Disable every enabled module, dependents first
    ///
    /// A module whose dependent could not be disabled stays enabled and is
    /// reported as a failure.
    pub async fn disable_modules(&self) -> LifecycleReport {
        let _admin = self.admin.lock().await;
        self.disable_all_locked().await
    }

    /// Disable and unload everything, dependents first
    pub async fn shutdown(&self) -> LifecycleReport {
        let _admin = self.admin.lock().await;
        info!("Shutting down module manager");

        let disabled = self.disable_all_locked().await;
        for failure in &disabled.failures {
            warn!("Module {} still enabled at shutdown: {}", failure.id, failure.error);
        }

        let mut report = LifecycleReport::default();
        let mut order = self.dependency_order().await;
        order.reverse();
        for id in order {
            match self.unload_locked(&id).await {
                Ok(()) => report.success(id),
                Err(e) => {
                    warn!("Error unloading module {}: {}", id, e);
                    report.fail(id, e);
                }
            }
        }

        info!("Module manager shut down");
        report
    }

    // ------------------------------------------------------------------
    // Single-module operations
    // ------------------------------------------------------------------

    /// Discover and load a single module
    ///
    /// All of its hard dependencies must already be loaded.
    pub async fn load_module(&self, id: &str) -> Result<(), ModuleError> {
        let _admin = self.admin.lock().await;
        self.load_locked(id).await
    }

    /// Enable a loaded module whose hard dependencies are all enabled
    pub async fn enable_module(&self, id: &str) -> Result<(), ModuleError> {
        let _admin = self.admin.lock().await;
        self.enable_locked(id).await
    }

    /// Disable an enabled module that no enabled module hard-depends on
    ///
    /// Refuses instead of cascading; dependents must be disabled first.
    pub async fn disable_module(&self, id: &str) -> Result<(), ModuleError> {
        let _admin = self.admin.lock().await;
        self.disable_locked(id).await
    }

    /// Unload a loaded (not enabled) module that no loaded module hard-depends on
    pub async fn unload_module(&self, id: &str) -> Result<(), ModuleError> {
        let _admin = self.admin.lock().await;
        self.unload_locked(id).await
    }

    /// Disable, unload, rediscover, load and enable a module
    ///
    /// Stops at the first failing step and leaves the module in the last
    /// state it reached; there is no rollback.
    pub async fn reload_module(&self, id: &str) -> Result<(), ModuleError> {
        let _admin = self.admin.lock().await;
        info!("Reloading module: {}", id);

        let state = self
            .modules
            .read()
            .await
            .state(id)
            .ok_or_else(|| ModuleError::ModuleNotFound(id.to_string()))?;

        if state == ModuleState::Enabled {
            self.disable_locked(id).await?;
        }
        self.unload_locked(id).await?;
        self.load_locked(id).await?;
        self.enable_locked(id).await?;

        info!("Module {} reloaded", id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Snapshot of a loaded module; `None` if it is not loaded
    pub async fn get_module(&self, id: &str) -> Option<ModuleSnapshot> {
        self.modules.read().await.snapshot(id)
    }

    /// Snapshots of all loaded modules, in load order
    pub async fn get_modules(&self) -> Vec<ModuleSnapshot> {
        let table = self.modules.read().await;
        table
            .order
            .iter()
            .filter_map(|id| table.snapshot(id))
            .collect()
    }

    /// Snapshots of all enabled modules, in load order
    pub async fn get_enabled_modules(&self) -> Vec<ModuleSnapshot> {
        self.get_modules()
            .await
            .into_iter()
            .filter(ModuleSnapshot::is_enabled)
            .collect()
    }

    /// Current state; modules without a runtime record are `Unloaded`
    pub async fn module_state(&self, id: &str) -> ModuleState {
        self.modules
            .read()
            .await
            .state(id)
            .unwrap_or(ModuleState::Unloaded)
    }

    /// Module with the status of each declared dependency
    pub async fn module_info(&self, id: &str) -> Option<ModuleInfo> {
        let table = self.modules.read().await;
        let module = table.snapshot(id)?;
        let status = |deps: &[String]| -> Vec<(String, DependencyStatus)> {
            deps.iter()
                .map(|d| (d.clone(), DependencyStatus::from(table.state(d))))
                .collect()
        };
        Some(ModuleInfo {
            hard_dependencies: status(&module.descriptor.hard_dependencies),
            soft_dependencies: status(&module.descriptor.soft_dependencies),
            module,
        })
    }

    /// Module counts
    pub async fn stats(&self) -> ModuleStats {
        let table = self.modules.read().await;
        let total = table.records.len();
        let enabled = table
            .records
            .values()
            .filter(|m| m.state == ModuleState::Enabled)
            .count();
        ModuleStats {
            total,
            enabled,
            disabled: total - enabled,
        }
    }

    // ------------------------------------------------------------------
    // Transitions (callers hold the admin lock)
    // ------------------------------------------------------------------

    /// Dependency order over the currently loaded modules
    async fn dependency_order(&self) -> Vec<String> {
        let descriptors = self.modules.read().await.descriptors();
        DependencyGraph::new(descriptors).resolve().load_order
    }

    async fn disable_all_locked(&self) -> LifecycleReport {
        info!("Disabling modules");

        let mut report = LifecycleReport::default();
        let mut order = self.dependency_order().await;
        order.reverse();
        for id in order {
            if self.modules.read().await.state(&id) != Some(ModuleState::Enabled) {
                continue;
            }
            match self.disable_locked(&id).await {
                Ok(()) => report.success(id),
                Err(e) => {
                    error!("Failed to disable module {}: {}", id, e);
                    report.fail(id, e);
                }
            }
        }

        info!("Disabled {} modules", report.count());
        report
    }

    /// Every hard dependency must have a runtime record
    async fn check_loaded_dependencies(
        &self,
        descriptor: &ModuleDescriptor,
    ) -> Result<(), ModuleError> {
        let table = self.modules.read().await;
        for dep in &descriptor.hard_dependencies {
            if table.state(dep).is_none() {
                return Err(ModuleError::DependencyFailed {
                    id: descriptor.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        Ok(())
    }

    async fn load_locked(&self, id: &str) -> Result<(), ModuleError> {
        if let Some(state) = self.modules.read().await.state(id) {
            return Err(ModuleError::AlreadyInState {
                id: id.to_string(),
                state,
            });
        }

        let discovered = self.source.discover_module(id)?;
        {
            let table = self.modules.read().await;
            for dep in &discovered.descriptor.hard_dependencies {
                if table.state(dep).is_none() {
                    return Err(ModuleError::DependencyNotReady {
                        id: id.to_string(),
                        dependency: dep.clone(),
                        state: ModuleState::Unloaded,
                    });
                }
            }
        }

        self.load_discovered(&discovered).await
    }

    /// Instantiate, run `on_load`, and publish the record
    async fn load_discovered(&self, discovered: &DiscoveredModule) -> Result<(), ModuleError> {
        let id = discovered.id().to_string();
        info!("Loading module: {}", id);

        let context = self.loader.context_for(discovered)?;
        let mut instance = (discovered.factory)()?;
        instance
            .on_load(&context)
            .await
            .map_err(|e| hook_failed(&id, "on_load", e))?;

        let mut table = self.modules.write().await;
        if table.records.contains_key(&id) {
            return Err(ModuleError::DuplicateModule(id));
        }
        table.records.insert(
            id.clone(),
            ManagedModule {
                descriptor: Arc::clone(&discovered.descriptor),
                state: ModuleState::Loaded,
                instance: Arc::new(Mutex::new(instance)),
            },
        );
        table.order.push(id.clone());

        info!("Module {} loaded successfully", id);
        Ok(())
    }

    async fn enable_locked(&self, id: &str) -> Result<(), ModuleError> {
        let instance = {
            let table = self.modules.read().await;
            let record = table
                .records
                .get(id)
                .ok_or_else(|| ModuleError::ModuleNotFound(id.to_string()))?;
            if record.state == ModuleState::Enabled {
                return Err(ModuleError::AlreadyInState {
                    id: id.to_string(),
                    state: ModuleState::Enabled,
                });
            }
            for dep in &record.descriptor.hard_dependencies {
                let state = table.state(dep).unwrap_or(ModuleState::Unloaded);
                if state != ModuleState::Enabled {
                    return Err(ModuleError::DependencyNotReady {
                        id: id.to_string(),
                        dependency: dep.clone(),
                        state,
                    });
                }
            }
            Arc::clone(&record.instance)
        };

        info!("Enabling module: {}", id);
        instance
            .lock()
            .await
            .on_enable()
            .await
            .map_err(|e| hook_failed(id, "on_enable", e))?;

        self.set_state(id, ModuleState::Enabled).await?;
        info!("Module {} enabled", id);
        Ok(())
    }

    async fn disable_locked(&self, id: &str) -> Result<(), ModuleError> {
        let instance = {
            let table = self.modules.read().await;
            let record = table
                .records
                .get(id)
                .ok_or_else(|| ModuleError::ModuleNotFound(id.to_string()))?;
            if record.state != ModuleState::Enabled {
                return Err(ModuleError::AlreadyInState {
                    id: id.to_string(),
                    state: record.state,
                });
            }
            let dependents = table.dependents_in(id, &[ModuleState::Enabled]);
            if !dependents.is_empty() {
                return Err(ModuleError::RequiredByDependents {
                    id: id.to_string(),
                    dependents,
                });
            }
            Arc::clone(&record.instance)
        };

        info!("Disabling module: {}", id);
        instance
            .lock()
            .await
            .on_disable()
            .await
            .map_err(|e| hook_failed(id, "on_disable", e))?;

        self.set_state(id, ModuleState::Loaded).await?;
        info!("Module {} disabled", id);
        Ok(())
    }

    async fn unload_locked(&self, id: &str) -> Result<(), ModuleError> {
        let instance = {
            let table = self.modules.read().await;
            let record = table
                .records
                .get(id)
                .ok_or_else(|| ModuleError::ModuleNotFound(id.to_string()))?;
            if record.state != ModuleState::Loaded {
                return Err(ModuleError::InvalidState {
                    id: id.to_string(),
                    expected: ModuleState::Loaded,
                    actual: record.state,
                });
            }
            let dependents =
                table.dependents_in(id, &[ModuleState::Loaded, ModuleState::Enabled]);
            if !dependents.is_empty() {
                return Err(ModuleError::RequiredByDependents {
                    id: id.to_string(),
                    dependents,
                });
            }
            Arc::clone(&record.instance)
        };

        info!("Unloading module: {}", id);
        instance
            .lock()
            .await
            .on_unload()
            .await
            .map_err(|e| hook_failed(id, "on_unload", e))?;

        let mut table = self.modules.write().await;
        table.records.remove(id);
        table.order.retain(|other| other != id);
        info!("Module {} unloaded", id);
        Ok(())
    }

    async fn set_state(&self, id: &str, state: ModuleState) -> Result<(), ModuleError> {
        let mut table = self.modules.write().await;
        let record = table
            .records
            .get_mut(id)
            .ok_or_else(|| ModuleError::ModuleNotFound(id.to_string()))?;
        record.state = state;
        Ok(())
    }
}

fn hook_failed(id: &str, hook: &'static str, error: ModuleError) -> ModuleError {
    ModuleError::HookFailed {
        id: id.to_string(),
        hook,
        reason: error.to_string(),
    }
}
