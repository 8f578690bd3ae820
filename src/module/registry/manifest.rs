//! Module manifest parsing
//!
//! Handles parsing `module.toml` manifests and converting them into
//! immutable module descriptors.

use crate::module::traits::{ModuleDescriptor, ModuleError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Module manifest (module.toml structure)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Module id (unique identifier)
    pub id: String,
    /// Human-readable name (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,
    /// Module version (semantic versioning)
    pub version: String,
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
    /// Module author
    #[serde(default)]
    pub author: Option<String>,
    /// Entry point reference (factory name)
    pub main: String,
    /// Hard dependencies (module ids), in declaration order
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Soft dependencies (module ids), in declaration order
    #[serde(default)]
    pub soft_dependencies: Vec<String>,
    /// Project website
    #[serde(default)]
    pub website: Option<String>,
    /// License identifier
    #[serde(default)]
    pub license: Option<String>,
}

impl ModuleManifest {
    /// Load manifest from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModuleError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ModuleError::InvalidManifest(format!("Failed to read manifest file: {}", e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse a manifest from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ModuleError> {
        let manifest: ModuleManifest = toml::from_str(contents).map_err(|e| {
            ModuleError::InvalidManifest(format!("Failed to parse manifest TOML: {}", e))
        })?;

        if manifest.id.is_empty() {
            return Err(ModuleError::InvalidManifest(
                "Module id cannot be empty".to_string(),
            ));
        }
        if manifest.main.is_empty() {
            return Err(ModuleError::InvalidManifest(
                "Entry point cannot be empty".to_string(),
            ));
        }

        Ok(manifest)
    }

    /// Convert to an immutable descriptor
    pub fn to_descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor {
            id: self.id.clone(),
            name: self.name.clone().unwrap_or_else(|| self.id.clone()),
            version: self.version.clone(),
            author: self.author.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
            main: self.main.clone(),
            hard_dependencies: self.dependencies.clone(),
            soft_dependencies: self.soft_dependencies.clone(),
            website: self.website.clone().filter(|w| !w.is_empty()),
            license: self.license.clone().filter(|l| !l.is_empty()),
        }
    }
}

impl From<&ModuleDescriptor> for ModuleManifest {
    fn from(descriptor: &ModuleDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            name: Some(descriptor.name.clone()),
            version: descriptor.version.clone(),
            description: Some(descriptor.description.clone()).filter(|d| !d.is_empty()),
            author: Some(descriptor.author.clone()).filter(|a| !a.is_empty()),
            main: descriptor.main.clone(),
            dependencies: descriptor.hard_dependencies.clone(),
            soft_dependencies: descriptor.soft_dependencies.clone(),
            website: descriptor.website.clone(),
            license: descriptor.license.clone(),
        }
    }
}
