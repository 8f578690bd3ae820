//! orion-host command line
//!
//! Usage:
//!   orion-host [--config orion.toml] run
//!   orion-host modules
//!   orion-host permissions add --user 1234 moderation.kick
//!   orion-host check --user 1234 --role 42 moderation.kick

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use orion_host::config::HostConfig;
use orion_host::module::registry::{DependencyGraph, ModuleManifest};
use orion_host::module::validation::{ManifestValidator, ValidationResult};
use orion_host::module::FactoryRegistry;
use orion_host::permission::{
    ActorContext, FileBackend, Namespace, PermissionResolver, PermissionStore,
};
use orion_host::utils::{init_logging_from_config, wait_for_shutdown_signal};
use orion_host::Host;

#[derive(Parser, Debug)]
#[command(name = "orion-host", version, about = "Extension host for a persistent bot process")]
struct Cli {
    /// Configuration file (created with defaults if missing)
    #[arg(long, short, default_value = "orion.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the host, load and enable modules, and wait for a shutdown signal
    Run,
    /// Print the resolved module load order and any rejected modules
    Modules,
    /// Edit the permission file
    #[command(subcommand)]
    Permissions(PermissionsCommand),
    /// Evaluate a permission for a user and its roles
    Check {
        #[arg(long)]
        user: String,
        #[arg(long = "role")]
        roles: Vec<String>,
        permission: String,
    },
}

#[derive(Subcommand, Debug)]
enum PermissionsCommand {
    /// Grant a permission
    Add {
        #[command(flatten)]
        target: TargetArgs,
        permission: String,
    },
    /// Revoke a permission
    Remove {
        #[command(flatten)]
        target: TargetArgs,
        permission: String,
    },
    /// List the permissions of a user or role, or every actor when none is given
    List {
        #[arg(long, conflicts_with = "role")]
        user: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
    /// Remove every permission of a user or role
    Clear {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct TargetArgs {
    #[arg(long)]
    user: Option<String>,
    #[arg(long)]
    role: Option<String>,
}

impl TargetArgs {
    fn resolve(&self) -> anyhow::Result<(Namespace, &str)> {
        match (&self.user, &self.role) {
            (Some(user), None) => Ok((Namespace::User, user.as_str())),
            (None, Some(role)) => Ok((Namespace::Role, role.as_str())),
            _ => anyhow::bail!("exactly one of --user or --role is required"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = HostConfig::load_or_create(&cli.config)?;
    config.validate()?;
    init_logging_from_config(&config, cfg!(feature = "json-logging"));

    match cli.command {
        Command::Run => run(config).await,
        Command::Modules => list_modules(&config),
        Command::Permissions(cmd) => edit_permissions(&config, cmd),
        Command::Check {
            user,
            roles,
            permission,
        } => {
            let resolver = PermissionResolver::new(open_store(&config)?);
            let actor = ActorContext::new(user).with_roles(roles);
            let allowed = resolver.check(&actor, &permission);
            println!(
                "{} {} {}",
                actor.user_id,
                if allowed { "HAS" } else { "LACKS" },
                permission.to_lowercase()
            );
            Ok(())
        }
    }
}

async fn run(config: HostConfig) -> anyhow::Result<()> {
    // embedding applications register their factories here
    let host = Host::new(config, FactoryRegistry::new())?;
    host.run_until(wait_for_shutdown_signal()).await?;
    Ok(())
}

fn open_store(config: &HostConfig) -> anyhow::Result<Arc<PermissionStore>> {
    let backend = FileBackend::new(&config.permissions.file)?;
    let store = PermissionStore::open(Arc::new(backend))
        .with_context(|| format!("Failed to open {}", config.permissions.file))?;
    Ok(Arc::new(store))
}

fn edit_permissions(config: &HostConfig, command: PermissionsCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    match command {
        PermissionsCommand::Add { target, permission } => {
            let (namespace, id) = target.resolve()?;
            let added = store.add_permission(namespace, id, &permission)?;
            println!(
                "{} {} {}",
                if added { "granted" } else { "already granted" },
                permission.to_lowercase(),
                id
            );
        }
        PermissionsCommand::Remove { target, permission } => {
            let (namespace, id) = target.resolve()?;
            let removed = store.remove_permission(namespace, id, &permission)?;
            println!(
                "{} {} {}",
                if removed { "revoked" } else { "not granted" },
                permission.to_lowercase(),
                id
            );
        }
        PermissionsCommand::List { user, role } => match (user, role) {
            (Some(user), _) => print_grants(&store, Namespace::User, &user),
            (None, Some(role)) => print_grants(&store, Namespace::Role, &role),
            (None, None) => {
                for namespace in [Namespace::User, Namespace::Role] {
                    for actor in store.list_actors(namespace) {
                        print_grants(&store, namespace, &actor);
                    }
                }
            }
        },
        PermissionsCommand::Clear { target } => {
            let (namespace, id) = target.resolve()?;
            let cleared = store.clear(namespace, id)?;
            println!(
                "{} {} {}",
                if cleared { "cleared" } else { "nothing to clear for" },
                namespace,
                id
            );
        }
    }
    Ok(())
}

fn print_grants(store: &PermissionStore, namespace: Namespace, actor: &str) {
    let grants = store.get(namespace, actor);
    let joined = grants.into_iter().collect::<Vec<_>>().join(", ");
    println!("{} {}: {}", namespace, actor, joined);
}

/// Read every manifest under the modules directory without instantiating anything
fn list_modules(config: &HostConfig) -> anyhow::Result<()> {
    let dir = Path::new(&config.modules.modules_dir);
    if !dir.exists() {
        println!("no modules directory at {}", dir.display());
        return Ok(());
    }

    let mut dirs: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.join("module.toml").is_file())
        .collect();
    dirs.sort();

    let validator = ManifestValidator::new();
    let mut descriptors = Vec::new();
    for path in dirs {
        match ModuleManifest::from_file(path.join("module.toml")) {
            Ok(manifest) => match validator.validate(&manifest) {
                ValidationResult::Valid => descriptors.push(Arc::new(manifest.to_descriptor())),
                ValidationResult::Invalid(errors) => {
                    println!("invalid  {}: {}", path.display(), errors.join("; "))
                }
            },
            Err(e) => println!("invalid  {}: {}", path.display(), e),
        }
    }

    let resolution = DependencyGraph::new(descriptors).resolve();
    for (position, id) in resolution.load_order.iter().enumerate() {
        println!("{:>3}. {}", position + 1, id);
    }
    for (id, error) in &resolution.rejected {
        println!("rejected {}: {}", id, error);
    }
    Ok(())
}
