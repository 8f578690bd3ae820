//! Administrative command dispatch
//!
//! The single path through which lifecycle and permission changes are made
//! on behalf of an actor. Every command is gated by a permission node; the
//! reply is structured data, rendering is left to the caller.

use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::module::{ModuleError, ModuleInfo, ModuleManager, ModuleSnapshot, ModuleState, ModuleStats};
use crate::permission::{node, ActorContext, Namespace, PermissionError, PermissionResolver};

/// Gate for listing and inspecting modules
pub const MODULES_VIEW: &str = "modules.view";
/// Gate for enabling and disabling modules
pub const MODULES_MANAGE: &str = "modules.manage";
/// Gate for reloading modules
pub const MODULES_RELOAD: &str = "modules.reload";
/// Gate for editing grants
pub const PERMISSIONS_MANAGE: &str = "permissions.manage";
/// Gate for reading grants
pub const PERMISSIONS_VIEW: &str = "permissions.view";

/// Modules shown individually in a status reply
pub const STATUS_PREVIEW: usize = 5;

/// User or role a permission command acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    User(String),
    Role(String),
}

impl Target {
    pub fn namespace(&self) -> Namespace {
        match self {
            Target::User(_) => Namespace::User,
            Target::Role(_) => Namespace::Role,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Target::User(id) | Target::Role(id) => id,
        }
    }
}

/// `/modules` subcommands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModulesCommand {
    List,
    Info { id: String },
    Enable { id: String },
    Disable { id: String },
    Reload { id: String },
    Status,
}

/// `/permissions` subcommands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionsCommand {
    Add { target: Target, permission: String },
    Remove { target: Target, permission: String },
    List { target: Target },
    /// Evaluate a permission for another actor
    Check { actor: ActorContext, permission: String },
    Clear { target: Target },
}

/// Administrative command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Modules(ModulesCommand),
    Permissions(PermissionsCommand),
}

impl AdminCommand {
    /// Permission node the invoking actor must hold
    pub fn required_permission(&self) -> &'static str {
        match self {
            AdminCommand::Modules(cmd) => match cmd {
                ModulesCommand::List | ModulesCommand::Info { .. } | ModulesCommand::Status => {
                    MODULES_VIEW
                }
                ModulesCommand::Enable { .. } | ModulesCommand::Disable { .. } => MODULES_MANAGE,
                ModulesCommand::Reload { .. } => MODULES_RELOAD,
            },
            AdminCommand::Permissions(cmd) => match cmd {
                PermissionsCommand::Add { .. }
                | PermissionsCommand::Remove { .. }
                | PermissionsCommand::Clear { .. } => PERMISSIONS_MANAGE,
                PermissionsCommand::List { .. } | PermissionsCommand::Check { .. } => {
                    PERMISSIONS_VIEW
                }
            },
        }
    }
}

/// Module system overview
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub stats: ModuleStats,
    /// First modules in load order
    pub shown: Vec<ModuleSnapshot>,
    /// Modules not shown
    pub remaining: usize,
}

/// Outcome of a successful command
#[derive(Debug, Clone)]
pub enum AdminReply {
    Modules(Vec<ModuleSnapshot>),
    ModuleInfo(ModuleInfo),
    Enabled(String),
    Disabled(String),
    Reloaded(String),
    Status(StatusReport),
    Granted {
        target: Target,
        permission: String,
        added: bool,
    },
    Revoked {
        target: Target,
        permission: String,
        removed: bool,
    },
    Permissions {
        target: Target,
        permissions: BTreeSet<String>,
    },
    Check {
        user_id: String,
        permission: String,
        allowed: bool,
    },
    Cleared {
        target: Target,
        cleared: bool,
    },
}

/// Administrative errors
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Permission denied: requires {required}")]
    PermissionDenied { required: &'static str },

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Module {id} is already {state}")]
    AlreadyInState { id: String, state: ModuleState },

    #[error(transparent)]
    Module(ModuleError),

    #[error(transparent)]
    Permission(#[from] PermissionError),
}

impl From<ModuleError> for AdminError {
    fn from(e: ModuleError) -> Self {
        match e {
            ModuleError::ModuleNotFound(id) => AdminError::ModuleNotFound(id),
            ModuleError::AlreadyInState { id, state } => AdminError::AlreadyInState { id, state },
            other => AdminError::Module(other),
        }
    }
}

/// Dispatches administrative commands
pub struct AdminDispatcher {
    modules: Arc<ModuleManager>,
    resolver: PermissionResolver,
}

impl AdminDispatcher {
    pub fn new(modules: Arc<ModuleManager>, resolver: PermissionResolver) -> Self {
        Self { modules, resolver }
    }

    /// Check the command's gate for `actor`, then run it
    pub async fn execute(
        &self,
        actor: &ActorContext,
        command: AdminCommand,
    ) -> Result<AdminReply, AdminError> {
        let required = command.required_permission();
        if !self.resolver.check(actor, required) {
            warn!("User {} denied {:?}: requires {}", actor.user_id, command, required);
            return Err(AdminError::PermissionDenied { required });
        }

        match command {
            AdminCommand::Modules(cmd) => self.modules_command(actor, cmd).await,
            AdminCommand::Permissions(cmd) => self.permissions_command(actor, cmd),
        }
    }

    async fn modules_command(
        &self,
        actor: &ActorContext,
        command: ModulesCommand,
    ) -> Result<AdminReply, AdminError> {
        match command {
            ModulesCommand::List => Ok(AdminReply::Modules(self.modules.get_modules().await)),
            ModulesCommand::Info { id } => match self.modules.module_info(&id).await {
                Some(info) => Ok(AdminReply::ModuleInfo(info)),
                None => Err(AdminError::ModuleNotFound(id)),
            },
            ModulesCommand::Enable { id } => {
                self.expect_state(&id, ModuleState::Loaded).await?;
                self.modules.enable_module(&id).await?;
                info!("User {} enabled module {}", actor.user_id, id);
                Ok(AdminReply::Enabled(id))
            }
            ModulesCommand::Disable { id } => {
                self.expect_state(&id, ModuleState::Enabled).await?;
                self.modules.disable_module(&id).await?;
                info!("User {} disabled module {}", actor.user_id, id);
                Ok(AdminReply::Disabled(id))
            }
            ModulesCommand::Reload { id } => {
                self.modules.reload_module(&id).await?;
                info!("User {} reloaded module {}", actor.user_id, id);
                Ok(AdminReply::Reloaded(id))
            }
            ModulesCommand::Status => {
                let all = self.modules.get_modules().await;
                let stats = ModuleStats {
                    total: all.len(),
                    enabled: all.iter().filter(|m| m.is_enabled()).count(),
                    disabled: all.iter().filter(|m| !m.is_enabled()).count(),
                };
                let remaining = all.len().saturating_sub(STATUS_PREVIEW);
                let shown = all.into_iter().take(STATUS_PREVIEW).collect();
                Ok(AdminReply::Status(StatusReport {
                    stats,
                    shown,
                    remaining,
                }))
            }
        }
    }

    /// Report not-found and already-in-state before attempting a transition
    async fn expect_state(&self, id: &str, from: ModuleState) -> Result<(), AdminError> {
        let module = self
            .modules
            .get_module(id)
            .await
            .ok_or_else(|| AdminError::ModuleNotFound(id.to_string()))?;
        if module.state != from {
            return Err(AdminError::AlreadyInState {
                id: id.to_string(),
                state: module.state,
            });
        }
        Ok(())
    }

    fn permissions_command(
        &self,
        actor: &ActorContext,
        command: PermissionsCommand,
    ) -> Result<AdminReply, AdminError> {
        let store = self.resolver.store();
        match command {
            PermissionsCommand::Add { target, permission } => {
                let added = store.add_permission(target.namespace(), target.id(), &permission)?;
                info!(
                    "User {} granted {} to {} {}",
                    actor.user_id,
                    permission,
                    target.namespace(),
                    target.id()
                );
                Ok(AdminReply::Granted {
                    permission: node::normalize(&permission),
                    target,
                    added,
                })
            }
            PermissionsCommand::Remove { target, permission } => {
                let removed =
                    store.remove_permission(target.namespace(), target.id(), &permission)?;
                Ok(AdminReply::Revoked {
                    permission: node::normalize(&permission),
                    target,
                    removed,
                })
            }
            PermissionsCommand::List { target } => Ok(AdminReply::Permissions {
                permissions: store.get(target.namespace(), target.id()),
                target,
            }),
            PermissionsCommand::Check { actor: subject, permission } => {
                let allowed = self.resolver.check(&subject, &permission);
                Ok(AdminReply::Check {
                    user_id: subject.user_id,
                    permission,
                    allowed,
                })
            }
            PermissionsCommand::Clear { target } => {
                let cleared = store.clear(target.namespace(), target.id())?;
                Ok(AdminReply::Cleared { target, cleared })
            }
        }
    }
}
