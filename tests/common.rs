//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use orion_host::module::{
    DiscoveredModule, Module, ModuleContext, ModuleDescriptor, ModuleError, ModuleFactory,
    ModuleManager, StaticSource,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Records every hook call across all mock modules and injects failures
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<(String, String)>>>,
    configs: Arc<Mutex<HashMap<String, HashMap<String, String>>>>,
    instances: Arc<Mutex<HashMap<String, usize>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events as `hook:id`, in call order
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Events for one hook, as module ids
    pub fn calls(&self, hook: &str) -> Vec<String> {
        let prefix = format!("{}:", hook);
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Make `hook` fail for module `id` until healed
    pub fn fail(&self, id: &str, hook: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert((id.to_string(), hook.to_string()));
    }

    pub fn heal(&self, id: &str, hook: &str) {
        self.failing
            .lock()
            .unwrap()
            .remove(&(id.to_string(), hook.to_string()));
    }

    /// Configuration the module last received in `on_load`
    pub fn config_of(&self, id: &str) -> Option<HashMap<String, String>> {
        self.configs.lock().unwrap().get(id).cloned()
    }

    /// Instances created for a module so far
    pub fn instances_of(&self, id: &str) -> usize {
        self.instances.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    fn record(&self, id: &str, hook: &str) -> Result<(), ModuleError> {
        self.events.lock().unwrap().push(format!("{}:{}", hook, id));
        if self
            .failing
            .lock()
            .unwrap()
            .contains(&(id.to_string(), hook.to_string()))
        {
            return Err(ModuleError::OperationError(format!(
                "injected {} failure",
                hook
            )));
        }
        Ok(())
    }

    /// Factory producing a fresh [`MockModule`] for `id`
    pub fn factory(&self, id: &str) -> ModuleFactory {
        let recorder = self.clone();
        let id = id.to_string();
        Arc::new(move || {
            *recorder
                .instances
                .lock()
                .unwrap()
                .entry(id.clone())
                .or_default() += 1;
            Ok(Box::new(MockModule {
                id: id.clone(),
                recorder: recorder.clone(),
            }) as Box<dyn Module>)
        })
    }

    pub fn discovered(&self, descriptor: ModuleDescriptor) -> DiscoveredModule {
        let factory = self.factory(&descriptor.id);
        DiscoveredModule::new(descriptor, factory)
    }

    /// Manager over an in-memory source holding `descriptors` in order
    pub fn manager(&self, descriptors: Vec<ModuleDescriptor>) -> (Arc<StaticSource>, ModuleManager) {
        let source = Arc::new(StaticSource::from_modules(
            descriptors.into_iter().map(|d| self.discovered(d)).collect(),
        ));
        let manager = ModuleManager::new(source.clone());
        (source, manager)
    }
}

/// Module that records its hook calls
pub struct MockModule {
    id: String,
    recorder: Recorder,
}

#[async_trait]
impl Module for MockModule {
    async fn on_load(&mut self, context: &ModuleContext) -> Result<(), ModuleError> {
        self.recorder
            .configs
            .lock()
            .unwrap()
            .insert(self.id.clone(), context.config.clone());
        self.recorder.record(&self.id, "load")
    }

    async fn on_enable(&mut self) -> Result<(), ModuleError> {
        self.recorder.record(&self.id, "enable")
    }

    async fn on_disable(&mut self) -> Result<(), ModuleError> {
        self.recorder.record(&self.id, "disable")
    }

    async fn on_unload(&mut self) -> Result<(), ModuleError> {
        self.recorder.record(&self.id, "unload")
    }
}

pub fn module(id: &str) -> ModuleDescriptor {
    ModuleDescriptor::new(id, "1.0.0")
}

/// Temporary directory layout for host-level tests
pub struct HostFixture {
    pub temp_dir: TempDir,
    pub modules_dir: PathBuf,
    pub data_dir: PathBuf,
    pub permissions_file: PathBuf,
}

impl HostFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let modules_dir = temp_dir.path().join("modules");
        let data_dir = temp_dir.path().join("data").join("modules");
        let permissions_file = temp_dir.path().join("permissions").join("permissions.toml");
        std::fs::create_dir_all(&modules_dir).unwrap();
        Self {
            temp_dir,
            modules_dir,
            data_dir,
            permissions_file,
        }
    }

    /// Write `modules/<dir>/module.toml`
    pub fn write_manifest(&self, dir: &str, manifest: &str) -> PathBuf {
        let module_dir = self.modules_dir.join(dir);
        std::fs::create_dir_all(&module_dir).unwrap();
        let path = module_dir.join("module.toml");
        std::fs::write(&path, manifest).unwrap();
        path
    }

    /// Write `modules/<dir>/config.toml`
    pub fn write_module_config(&self, dir: &str, config: &str) {
        let path = self.modules_dir.join(dir).join("config.toml");
        std::fs::write(path, config).unwrap();
    }

    /// Host configuration pointing into the fixture
    pub fn config(&self) -> orion_host::HostConfig {
        let mut config = orion_host::HostConfig::default();
        config.modules.modules_dir = path_str(&self.modules_dir);
        config.modules.data_dir = path_str(&self.data_dir);
        config.permissions.file = path_str(&self.permissions_file);
        config
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Minimal manifest body
pub fn manifest(id: &str, main: &str, dependencies: &[&str]) -> String {
    let deps = dependencies
        .iter()
        .map(|d| format!("\"{}\"", d))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "id = \"{}\"\nname = \"{}\"\nversion = \"1.0.0\"\nmain = \"{}\"\ndependencies = [{}]\n",
        id, id, main, deps
    )
}
