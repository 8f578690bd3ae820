//! Named command registry
//!
//! Modules contribute commands through the registry handed to them in their
//! [`ModuleContext`](crate::module::ModuleContext). Names are unique; a
//! second registration under a taken name is refused. Dispatch looks a
//! command up by name and runs it on its own task, so a failing or panicking
//! command is reported to the caller and never takes the host down.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::permission::ActorContext;

/// Reply shown when a command fails
pub const FAILURE_REPLY: &str = "An error occurred while executing this command";

/// A single invocation of a command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Who invoked the command
    pub actor: ActorContext,
    /// Arguments after the command name
    pub args: Vec<String>,
}

impl CommandInvocation {
    pub fn new(actor: ActorContext) -> Self {
        Self {
            actor,
            args: Vec::new(),
        }
    }

    /// Builder-style: set the arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Argument at `index`, if present
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// Command errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Command {name} failed: {reason}")]
    Failed { name: String, reason: String },

    #[error("Command {0} panicked")]
    Panicked(String),
}

impl CommandError {
    /// Text to show the invoking user
    ///
    /// Failure details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            CommandError::UnknownCommand(name) => format!("Unknown command: {}", name),
            CommandError::Failed { .. } | CommandError::Panicked(_) => FAILURE_REPLY.to_string(),
        }
    }
}

/// A named command
#[async_trait]
pub trait Command: Send + Sync {
    /// Unique name the command is invoked by
    fn name(&self) -> &str;

    /// One-line help text
    fn description(&self) -> &str {
        ""
    }

    /// Run the command and produce its reply
    async fn execute(&self, invocation: &CommandInvocation) -> Result<String, CommandError>;
}

/// Registry of commands by name
#[derive(Default)]
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, Arc<dyn Command>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command under its name
    ///
    /// Returns `false` and keeps the existing command if the name is taken
    /// or empty.
    pub fn register(&self, command: Arc<dyn Command>) -> bool {
        let name = command.name().to_string();
        if name.trim().is_empty() {
            warn!("Attempted to register a command with an empty name");
            return false;
        }

        let mut commands = self.commands.write().unwrap_or_else(|e| e.into_inner());
        if commands.contains_key(&name) {
            warn!("Command {} is already registered", name);
            return false;
        }
        commands.insert(name.clone(), command);
        info!("Command {} registered", name);
        true
    }

    /// Remove a command; returns whether it was registered
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self
            .commands
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .is_some();
        if removed {
            info!("Command {} unregistered", name);
        } else {
            warn!("Command {} is not registered", name);
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Registered command names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Registered commands, sorted by name
    pub fn list(&self) -> Vec<Arc<dyn Command>> {
        let commands = self.commands.read().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<Arc<dyn Command>> = commands.values().cloned().collect();
        list.sort_by(|a, b| a.name().cmp(b.name()));
        list
    }

    pub fn len(&self) -> usize {
        self.commands.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the command registered under `name`
    ///
    /// The command runs on a separate task. An error or a panic is logged
    /// and returned; it never propagates further.
    pub async fn dispatch(
        &self,
        name: &str,
        invocation: CommandInvocation,
    ) -> Result<String, CommandError> {
        let Some(command) = self.get(name) else {
            warn!("Unknown command received: {}", name);
            return Err(CommandError::UnknownCommand(name.to_string()));
        };

        debug!("Executing command {} for user {}", name, invocation.actor.user_id);
        let task = tokio::spawn(async move { command.execute(&invocation).await });
        match task.await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => {
                error!("Error executing command {}: {}", name, e);
                Err(match e {
                    CommandError::Failed { .. } => e,
                    other => CommandError::Failed {
                        name: name.to_string(),
                        reason: other.to_string(),
                    },
                })
            }
            Err(join) => {
                error!("Command {} aborted: {}", name, join);
                Err(CommandError::Panicked(name.to_string()))
            }
        }
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}
