//! Module discovery
//!
//! A [`ModuleSource`] yields the descriptors the manager may load, each paired
//! with a factory for its entry point. [`DirectorySource`] scans module
//! directories for `module.toml`; [`StaticSource`] serves an in-memory list.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::module::registry::factory::{FactoryRegistry, ModuleFactory};
use crate::module::registry::manifest::ModuleManifest;
use crate::module::traits::{ModuleDescriptor, ModuleError};
use crate::module::validation::{ManifestValidator, ValidationResult};

/// Discovered module information
#[derive(Clone)]
pub struct DiscoveredModule {
    /// Immutable descriptor, shared with the runtime record
    pub descriptor: Arc<ModuleDescriptor>,
    /// Constructor for the module instance
    pub factory: ModuleFactory,
    /// Module directory, when discovered on disk
    pub directory: Option<PathBuf>,
}

impl DiscoveredModule {
    /// Pair a descriptor with its factory
    pub fn new(descriptor: ModuleDescriptor, factory: ModuleFactory) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            factory,
            directory: None,
        }
    }

    /// Module id
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }
}

impl fmt::Debug for DiscoveredModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveredModule")
            .field("descriptor", &self.descriptor)
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

/// Something the manager can enumerate to obtain loadable modules
///
/// Each call must return a stable snapshot for the duration of one
/// discovery pass.
pub trait ModuleSource: Send + Sync {
    /// Discover all available modules, in a stable order
    fn discover(&self) -> Result<Vec<DiscoveredModule>, ModuleError>;

    /// Discover a single module by id
    fn discover_module(&self, id: &str) -> Result<DiscoveredModule, ModuleError> {
        self.discover()?
            .into_iter()
            .find(|m| m.id() == id)
            .ok_or_else(|| ModuleError::ModuleNotFound(id.to_string()))
    }
}

/// Module discovery scanner over a modules directory
pub struct DirectorySource {
    /// Base directory to scan for modules
    modules_dir: PathBuf,
    /// Factories for manifest entry points
    factories: FactoryRegistry,
}

impl DirectorySource {
    /// Create a new module discovery scanner
    pub fn new<P: AsRef<Path>>(modules_dir: P, factories: FactoryRegistry) -> Self {
        Self {
            modules_dir: modules_dir.as_ref().to_path_buf(),
            factories,
        }
    }

    /// Directory being scanned
    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Parse, validate and resolve the module in one directory
    fn inspect(&self, dir: &Path) -> Result<DiscoveredModule, ModuleError> {
        let manifest_path = dir.join("module.toml");
        let manifest = ModuleManifest::from_file(&manifest_path)?;

        if let ValidationResult::Invalid(errors) = ManifestValidator::new().validate(&manifest) {
            return Err(ModuleError::InvalidManifest(format!(
                "{}: {}",
                manifest.id,
                errors.join("; ")
            )));
        }

        let factory = self
            .factories
            .get(&manifest.main)
            .ok_or_else(|| ModuleError::FactoryNotFound(manifest.main.clone()))?;

        Ok(DiscoveredModule {
            descriptor: Arc::new(manifest.to_descriptor()),
            factory,
            directory: Some(dir.to_path_buf()),
        })
    }
}

impl ModuleSource for DirectorySource {
    fn discover(&self) -> Result<Vec<DiscoveredModule>, ModuleError> {
        info!("Discovering modules in {:?}", self.modules_dir);

        if !self.modules_dir.exists() {
            debug!(
                "Modules directory does not exist, creating: {:?}",
                self.modules_dir
            );
            fs::create_dir_all(&self.modules_dir).map_err(|e| {
                ModuleError::OperationError(format!("Failed to create modules directory: {}", e))
            })?;
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.modules_dir).map_err(|e| {
            ModuleError::OperationError(format!("Failed to read modules directory: {}", e))
        })?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                ModuleError::OperationError(format!("Failed to read directory entry: {}", e))
            })?;
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        // read_dir order is platform dependent
        dirs.sort();

        let mut modules = Vec::new();
        for path in dirs {
            if !path.join("module.toml").exists() {
                debug!("No module.toml found in {:?}, skipping", path);
                continue;
            }
            match self.inspect(&path) {
                Ok(module) => {
                    debug!("Discovered module {} in {:?}", module.id(), path);
                    modules.push(module);
                }
                Err(e) => warn!("Skipping module in {:?}: {}", path, e),
            }
        }

        info!("Discovered {} modules", modules.len());
        Ok(modules)
    }
}

/// In-memory module source
///
/// The list can be edited between discovery passes, which is how an
/// embedding application registers built-in modules.
#[derive(Default)]
pub struct StaticSource {
    modules: RwLock<Vec<DiscoveredModule>>,
}

impl StaticSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source from a list of modules
    pub fn from_modules(modules: Vec<DiscoveredModule>) -> Self {
        Self {
            modules: RwLock::new(modules),
        }
    }

    /// Append a module, replacing any existing entry with the same id in place
    pub fn insert(&self, module: DiscoveredModule) {
        let mut modules = self.modules.write().unwrap_or_else(|e| e.into_inner());
        match modules.iter_mut().find(|m| m.id() == module.id()) {
            Some(slot) => *slot = module,
            None => modules.push(module),
        }
    }

    /// Remove a module by id; returns whether it was present
    pub fn remove(&self, id: &str) -> bool {
        let mut modules = self.modules.write().unwrap_or_else(|e| e.into_inner());
        let before = modules.len();
        modules.retain(|m| m.id() != id);
        modules.len() != before
    }
}

impl ModuleSource for StaticSource {
    fn discover(&self) -> Result<Vec<DiscoveredModule>, ModuleError> {
        let modules = self.modules.read().unwrap_or_else(|e| e.into_inner());
        Ok(modules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::traits::Module;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Module for Noop {
        async fn on_enable(&mut self) -> Result<(), ModuleError> {
            Ok(())
        }
        async fn on_disable(&mut self) -> Result<(), ModuleError> {
            Ok(())
        }
    }

    fn write_manifest(dir: &Path, body: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("module.toml"), body).unwrap();
    }

    #[test]
    fn directory_discovery_is_sorted_and_skips_unresolvable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        write_manifest(
            &root.join("b-mod"),
            "id = \"beta\"\nversion = \"1.0.0\"\nmain = \"noop\"\n",
        );
        write_manifest(
            &root.join("a-mod"),
            "id = \"alpha\"\nversion = \"1.0.0\"\nmain = \"noop\"\n",
        );
        write_manifest(
            &root.join("c-mod"),
            "id = \"gamma\"\nversion = \"1.0.0\"\nmain = \"unknown\"\n",
        );
        write_manifest(&root.join("d-mod"), "id = \"bad id\"\nversion = \"1\"\nmain = \"noop\"\n");
        fs::create_dir_all(root.join("empty")).unwrap();

        let source = DirectorySource::new(root, FactoryRegistry::new().with("noop", || Noop));
        let found = source.discover().unwrap();
        let ids: Vec<&str> = found.iter().map(|m| m.id()).collect();
        assert_eq!(ids, vec!["alpha", "beta"]);
        assert!(found[0].directory.as_ref().unwrap().ends_with("a-mod"));
    }

    #[test]
    fn missing_directory_is_created() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("modules");
        let source = DirectorySource::new(&dir, FactoryRegistry::new());
        assert!(source.discover().unwrap().is_empty());
        assert!(dir.exists());
    }

    #[test]
    fn static_source_insert_replace_remove() {
        let source = StaticSource::new();
        let make = crate::module::registry::factory::factory(|| Noop);
        source.insert(DiscoveredModule::new(ModuleDescriptor::new("a", "1.0.0"), make.clone()));
        source.insert(DiscoveredModule::new(ModuleDescriptor::new("b", "1.0.0"), make.clone()));
        source.insert(DiscoveredModule::new(ModuleDescriptor::new("a", "2.0.0"), make));

        let found = source.discover().unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].descriptor.version, "2.0.0");

        assert!(source.remove("a"));
        assert!(!source.remove("a"));
        assert!(matches!(
            source.discover_module("a"),
            Err(ModuleError::ModuleNotFound(_))
        ));
    }
}
