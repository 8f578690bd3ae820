//! Manifest validation framework
//!
//! Validates module manifests for structure and dependency declarations.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::module::registry::manifest::ModuleManifest;

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Manifest is valid
    Valid,
    /// Manifest is invalid with specific errors
    Invalid(Vec<String>),
}

impl ValidationResult {
    /// True for [`ValidationResult::Valid`]
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// Manifest validator
pub struct ManifestValidator {
    /// Maximum identifier length
    max_id_len: usize,
}

impl ManifestValidator {
    /// Create a new manifest validator
    pub fn new() -> Self {
        Self { max_id_len: 64 }
    }

    /// Validate a module manifest
    pub fn validate(&self, manifest: &ModuleManifest) -> ValidationResult {
        let mut errors = Vec::new();

        if manifest.id.is_empty() {
            errors.push("Module id cannot be empty".to_string());
        } else if !self.is_valid_id(&manifest.id) {
            errors.push(format!(
                "Invalid module id: {} (must be alphanumeric with dashes/underscores)",
                manifest.id
            ));
        }

        if manifest.version.is_empty() {
            errors.push("Module version cannot be empty".to_string());
        } else if !self.is_valid_version(&manifest.version) {
            errors.push(format!(
                "Invalid version format: {} (expected semantic versioning)",
                manifest.version
            ));
        }

        if manifest.main.trim().is_empty() {
            errors.push("Entry point cannot be empty".to_string());
        }

        if let Err(dep_errors) = self.validate_dependencies(manifest) {
            errors.extend(dep_errors);
        }

        if errors.is_empty() {
            debug!("Manifest validation passed for module: {}", manifest.id);
            ValidationResult::Valid
        } else {
            warn!(
                "Manifest validation failed for module {}: {:?}",
                manifest.id, errors
            );
            ValidationResult::Invalid(errors)
        }
    }

    /// Validate module id format
    #[inline]
    pub fn is_valid_id(&self, id: &str) -> bool {
        if id.is_empty() || id.len() > self.max_id_len {
            return false;
        }

        if !id.chars().next().map_or(false, |c| c.is_ascii_alphanumeric()) {
            return false;
        }

        id.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    /// Validate version format (semantic versioning)
    ///
    /// Accepts: major.minor[.patch][-prerelease][+build]
    #[inline]
    pub fn is_valid_version(&self, version: &str) -> bool {
        if version.is_empty() {
            return false;
        }

        let base = version.split('+').next().unwrap_or(version);
        let version_part = base.split('-').next().unwrap_or(base);

        let nums: Vec<&str> = version_part.split('.').collect();
        if nums.len() < 2 || nums.len() > 3 {
            return false;
        }

        nums.iter().all(|n| {
            !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) && n.parse::<u32>().is_ok()
        })
    }

    /// Validate hard and soft dependency declarations
    fn validate_dependencies(&self, manifest: &ModuleManifest) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        let all = manifest
            .dependencies
            .iter()
            .map(|d| (d, "dependency"))
            .chain(
                manifest
                    .soft_dependencies
                    .iter()
                    .map(|d| (d, "soft dependency")),
            );

        for (dep, kind) in all {
            if !self.is_valid_id(dep) {
                errors.push(format!("Invalid {} id: {}", kind, dep));
            }
            if *dep == manifest.id {
                errors.push(format!("Module {} lists itself as a {}", manifest.id, kind));
            }
            if !seen.insert(dep.as_str()) {
                errors.push(format!("Dependency {} is declared more than once", dep));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for ManifestValidator {
    fn default() -> Self {
        Self::new()
    }
}
