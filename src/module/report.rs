//! Lifecycle outcomes and read-only views
//!
//! Everything here is an owned snapshot; nothing borrows the manager's
//! live tables.

use serde::Serialize;
use std::sync::Arc;

use crate::module::traits::{ModuleDescriptor, ModuleError, ModuleState};

/// A module that failed a lifecycle transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFailure {
    /// Module id
    pub id: String,
    /// Why the transition did not happen
    pub error: ModuleError,
}

/// Per-module outcome of a bulk lifecycle operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleReport {
    /// Modules that completed the transition, in the order they did so
    pub succeeded: Vec<String>,
    /// Modules that did not
    pub failures: Vec<ModuleFailure>,
}

impl LifecycleReport {
    /// Number of modules that completed the transition
    pub fn count(&self) -> usize {
        self.succeeded.len()
    }

    /// True when nothing failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failure for a given module, if any
    pub fn failure(&self, id: &str) -> Option<&ModuleError> {
        self.failures.iter().find(|f| f.id == id).map(|f| &f.error)
    }

    pub(crate) fn success(&mut self, id: impl Into<String>) {
        self.succeeded.push(id.into());
    }

    pub(crate) fn fail(&mut self, id: impl Into<String>, error: ModuleError) {
        self.failures.push(ModuleFailure {
            id: id.into(),
            error,
        });
    }
}

/// Read-only view of a loaded module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSnapshot {
    /// Shared descriptor
    pub descriptor: Arc<ModuleDescriptor>,
    /// State at the time of the query
    pub state: ModuleState,
}

impl ModuleSnapshot {
    /// Module id
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// True if the module is enabled
    pub fn is_enabled(&self) -> bool {
        self.state == ModuleState::Enabled
    }
}

/// State of a declared dependency, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyStatus {
    /// Dependency is enabled
    Enabled,
    /// Dependency is loaded but not enabled
    Loaded,
    /// Dependency is not loaded
    Missing,
}

impl From<Option<ModuleState>> for DependencyStatus {
    fn from(state: Option<ModuleState>) -> Self {
        match state {
            Some(ModuleState::Enabled) => DependencyStatus::Enabled,
            Some(ModuleState::Loaded) => DependencyStatus::Loaded,
            Some(ModuleState::Unloaded) | None => DependencyStatus::Missing,
        }
    }
}

/// Detailed view of one module and its dependencies
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    /// The module itself
    pub module: ModuleSnapshot,
    /// Hard dependencies with their current status
    pub hard_dependencies: Vec<(String, DependencyStatus)>,
    /// Soft dependencies with their current status
    pub soft_dependencies: Vec<(String, DependencyStatus)>,
}

/// Module counts for reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModuleStats {
    /// Loaded modules (enabled or not)
    pub total: usize,
    /// Enabled modules
    pub enabled: usize,
    /// Loaded but not enabled
    pub disabled: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_successes_only() {
        let mut report = LifecycleReport::default();
        report.success("a");
        report.success("b");
        report.fail("c", ModuleError::ModuleNotFound("c".into()));
        assert_eq!(report.count(), 2);
        assert!(!report.is_clean());
        assert!(report.failure("c").is_some());
        assert!(report.failure("a").is_none());
    }

    #[test]
    fn dependency_status_from_state() {
        assert_eq!(
            DependencyStatus::from(Some(ModuleState::Enabled)),
            DependencyStatus::Enabled
        );
        assert_eq!(DependencyStatus::from(None), DependencyStatus::Missing);
    }
}
