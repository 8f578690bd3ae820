//! Module loader implementation
//!
//! Resolves the per-module configuration (`config.toml` in the module
//! directory plus host-level overrides) and builds the [`ModuleContext`]
//! handed to `on_load`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::command::CommandRegistry;
use crate::module::registry::discovery::DiscoveredModule;
use crate::module::traits::{ModuleContext, ModuleError};

/// Module loader for building module contexts
#[derive(Debug, Clone, Default)]
pub struct ModuleLoader {
    /// Root under which each module gets `<data_root>/<id>`
    data_root: PathBuf,
    /// Host-level overrides per module id
    overrides: HashMap<String, HashMap<String, String>>,
    /// Registry shared with every module context
    commands: Arc<CommandRegistry>,
}

impl ModuleLoader {
    /// Create a loader rooted at a data directory
    pub fn new<P: AsRef<Path>>(data_root: P) -> Self {
        Self {
            data_root: data_root.as_ref().to_path_buf(),
            overrides: HashMap::new(),
            commands: Arc::new(CommandRegistry::new()),
        }
    }

    /// Set host-level configuration overrides
    pub fn with_overrides(mut self, overrides: HashMap<String, HashMap<String, String>>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Share a command registry with the modules this loader prepares
    pub fn with_commands(mut self, commands: Arc<CommandRegistry>) -> Self {
        self.commands = commands;
        self
    }

    /// Build the context for a discovered module
    ///
    /// Values from `config.toml` are overlaid by host overrides. With a data
    /// root set, `<data_root>/<id>` is created before the module sees it.
    pub fn context_for(&self, discovered: &DiscoveredModule) -> Result<ModuleContext, ModuleError> {
        let id = discovered.id();
        let mut config = match &discovered.directory {
            Some(dir) => Self::load_module_config(id, dir.join("config.toml"))?,
            None => HashMap::new(),
        };
        if let Some(overrides) = self.overrides.get(id) {
            for (key, value) in overrides {
                config.insert(key.clone(), value.clone());
            }
        }

        let data_dir = self.data_root.join(id);
        if !self.data_root.as_os_str().is_empty() {
            std::fs::create_dir_all(&data_dir).map_err(|e| {
                ModuleError::OperationError(format!(
                    "Failed to create data directory {}: {}",
                    data_dir.display(),
                    e
                ))
            })?;
        }
        Ok(ModuleContext::new(
            id.to_string(),
            data_dir.to_string_lossy().to_string(),
            config,
        )
        .with_commands(Arc::clone(&self.commands)))
    }

    /// Load module configuration from file
    ///
    /// A missing file yields an empty map. Nested tables become dotted keys
    /// and arrays become comma-joined strings.
    pub fn load_module_config<P: AsRef<Path>>(
        module_id: &str,
        config_path: P,
    ) -> Result<HashMap<String, String>, ModuleError> {
        if !config_path.as_ref().exists() {
            debug!("No config file for module {}, using defaults", module_id);
            return Ok(HashMap::new());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            ModuleError::OperationError(format!("Failed to read config file: {}", e))
        })?;
        let table: toml::Table = toml::from_str(&contents).map_err(|e| {
            ModuleError::OperationError(format!(
                "Failed to parse config for module {}: {}",
                module_id, e
            ))
        })?;

        let mut result = HashMap::new();
        for (key, value) in &table {
            Self::flatten_toml_value(key.clone(), value, &mut result);
        }
        Ok(result)
    }

    /// Flatten TOML value to string hashmap
    fn flatten_toml_value(prefix: String, value: &toml::Value, result: &mut HashMap<String, String>) {
        use toml::Value;

        match value {
            Value::String(s) => {
                result.insert(prefix, s.clone());
            }
            Value::Integer(i) => {
                result.insert(prefix, i.to_string());
            }
            Value::Float(f) => {
                result.insert(prefix, f.to_string());
            }
            Value::Boolean(b) => {
                result.insert(prefix, b.to_string());
            }
            Value::Array(arr) => {
                let values: Vec<String> = arr
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        _ => v.to_string(),
                    })
                    .collect();
                result.insert(prefix, values.join(","));
            }
            Value::Table(table) => {
                for (key, val) in table {
                    Self::flatten_toml_value(format!("{}.{}", prefix, key), val, result);
                }
            }
            Value::Datetime(dt) => {
                result.insert(prefix, dt.to_string());
            }
        }
    }
}
