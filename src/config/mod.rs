//! Configuration management for orion-host
//!
//! Handles configuration loading, defaults and validation. The primary
//! encoding is TOML; JSON is accepted as an alternative.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Host-level settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSettings {
    /// Guild the host is scoped to (empty = global)
    #[serde(default)]
    pub guild_id: String,

    /// Development mode
    #[serde(default)]
    pub dev_mode: bool,

    /// Log filter used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            guild_id: String::new(),
            dev_mode: false,
            log_level: default_log_level(),
        }
    }
}

/// Module system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Enable module system
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory containing one sub-directory per module
    #[serde(default = "default_modules_dir")]
    pub modules_dir: String,

    /// Directory for module data
    #[serde(default = "default_modules_data_dir")]
    pub data_dir: String,

    /// Modules to enable (empty = every loaded module)
    #[serde(default)]
    pub enabled_modules: Vec<String>,

    /// Module-specific configuration overrides
    #[serde(default)]
    pub module_configs: HashMap<String, HashMap<String, String>>,
}

fn default_true() -> bool {
    true
}

fn default_modules_dir() -> String {
    "modules".to_string()
}

fn default_modules_data_dir() -> String {
    "data/modules".to_string()
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            modules_dir: default_modules_dir(),
            data_dir: default_modules_data_dir(),
            enabled_modules: Vec::new(),
            module_configs: HashMap::new(),
        }
    }
}

/// Permission storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionConfig {
    /// Permission file (`.toml` or `.json`)
    #[serde(default = "default_permissions_file")]
    pub file: String,
}

fn default_permissions_file() -> String {
    "permissions/permissions.toml".to_string()
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            file: default_permissions_file(),
        }
    }
}

/// Host configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub host: HostSettings,

    #[serde(default)]
    pub modules: ModuleConfig,

    #[serde(default)]
    pub permissions: PermissionConfig,
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

impl HostConfig {
    /// Load configuration, writing the defaults first if the file is absent
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            return Self::from_path(path);
        }
        info!("No configuration at {:?}, writing defaults", path);
        let config = Self::default();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
        }
        config.to_toml_file(path)?;
        Ok(config)
    }

    /// Load from a `.json` or (otherwise) TOML file
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Load configuration from TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: HostConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_toml_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {:?}", path))?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: HostConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.modules.modules_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("modules.modules_dir must not be empty"));
        }
        if self.modules.data_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("modules.data_dir must not be empty"));
        }

        // a bare level must be known; full filter directives are left to EnvFilter
        let level = self.host.log_level.trim().to_ascii_lowercase();
        if !level.contains('=') && !level.contains(',') && !LOG_LEVELS.contains(&level.as_str()) {
            return Err(anyhow::anyhow!(
                "host.log_level '{}' is not one of {}",
                self.host.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        let extension = Path::new(&self.permissions.file)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if !matches!(extension.as_deref(), Some("toml") | Some("json")) {
            return Err(anyhow::anyhow!(
                "permissions.file '{}' must end in .toml or .json",
                self.permissions.file
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config: HostConfig = toml::from_str(
            r#"
[modules]
enabled_modules = ["music"]

[modules.module_configs.music]
max_volume = "80"
"#,
        )
        .unwrap();
        assert_eq!(config.host.log_level, "info");
        assert_eq!(config.modules.modules_dir, "modules");
        assert_eq!(config.modules.enabled_modules, vec!["music"]);
        assert_eq!(config.modules.module_configs["music"]["max_volume"], "80");
        assert_eq!(config.permissions.file, "permissions/permissions.toml");
        config.validate().unwrap();
    }

    #[test]
    fn load_or_create_writes_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("conf").join("orion.toml");
        let created = HostConfig::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created, HostConfig::default());
        assert_eq!(HostConfig::load_or_create(&path).unwrap(), created);
    }

    #[test]
    fn json_is_accepted() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("orion.json");
        std::fs::write(&path, r#"{"host": {"dev_mode": true}}"#).unwrap();
        let config = HostConfig::from_path(&path).unwrap();
        assert!(config.host.dev_mode);
        assert!(config.modules.enabled);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = HostConfig::default();
        config.host.log_level = "loud".into();
        assert!(config.validate().is_err());

        config.host.log_level = "orion_host=debug,info".into();
        config.validate().unwrap();

        config.permissions.file = "permissions.yml".into();
        assert!(config.validate().is_err());

        let mut config = HostConfig::default();
        config.modules.modules_dir = " ".into();
        assert!(config.validate().is_err());
    }
}
