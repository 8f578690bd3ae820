//! Module factory registry
//!
//! Maps the opaque entry point reference of a manifest (`main`) to an
//! in-process constructor. Populated by the embedding application before
//! discovery; the manager only ever sees `Box<dyn Module>`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::module::traits::{Module, ModuleError};

/// Constructor for a module instance
pub type ModuleFactory = Arc<dyn Fn() -> Result<Box<dyn Module>, ModuleError> + Send + Sync>;

/// Wrap a closure as a [`ModuleFactory`]
pub fn factory<F, M>(f: F) -> ModuleFactory
where
    F: Fn() -> M + Send + Sync + 'static,
    M: Module + 'static,
{
    Arc::new(move || Ok(Box::new(f()) as Box<dyn Module>))
}

/// Registry of entry point references to factories
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, ModuleFactory>,
}

impl FactoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under an entry point reference
    ///
    /// Returns `false` (and keeps the existing factory) if the reference is
    /// already taken.
    pub fn register(&mut self, entry: impl Into<String>, factory: ModuleFactory) -> bool {
        let entry = entry.into();
        if self.factories.contains_key(&entry) {
            warn!("Factory for entry point {} is already registered", entry);
            return false;
        }
        debug!("Registered module factory: {}", entry);
        self.factories.insert(entry, factory);
        true
    }

    /// Builder-style registration
    pub fn with<F, M>(mut self, entry: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: Module + 'static,
    {
        self.register(entry, factory(f));
        self
    }

    /// Look up a factory
    pub fn get(&self, entry: &str) -> Option<ModuleFactory> {
        self.factories.get(entry).cloned()
    }

    /// Check whether an entry point is registered
    pub fn contains(&self, entry: &str) -> bool {
        self.factories.contains_key(entry)
    }

    /// Number of registered factories
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// True if no factory is registered
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<&String> = self.factories.keys().collect();
        entries.sort();
        f.debug_struct("FactoryRegistry")
            .field("entries", &entries)
            .finish()
    }
}
