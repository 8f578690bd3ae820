//! Permission store
//!
//! Authoritative actor -> grant mapping for the user and role namespaces.
//! Every mutation is applied under the namespace's write lock as a single
//! update of one actor's entry, then the whole mapping is persisted while
//! holding the store's writer lock. The in-memory map stays authoritative if
//! the write fails.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::permission::backend::{PermissionBackend, PermissionSnapshot};
use crate::permission::error::PermissionError;
use crate::permission::node::{self, PermissionNode};

/// Actor namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    User,
    Role,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::User => write!(f, "user"),
            Namespace::Role => write!(f, "role"),
        }
    }
}

impl FromStr for Namespace {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" | "users" => Ok(Namespace::User),
            "role" | "roles" => Ok(Namespace::Role),
            _ => Err(PermissionError::UnknownNamespace(s.to_string())),
        }
    }
}

type Grants = HashMap<String, BTreeSet<String>>;

/// Distinct actors holding at least one grant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PermissionStats {
    pub users: usize,
    pub roles: usize,
}

/// Permission store
pub struct PermissionStore {
    backend: Arc<dyn PermissionBackend>,
    users: RwLock<Grants>,
    roles: RwLock<Grants>,
    /// Serializes save and reload
    persist: Mutex<()>,
}

impl PermissionStore {
    /// Open a store over a backend, creating empty storage if needed
    pub fn open(backend: Arc<dyn PermissionBackend>) -> Result<Self, PermissionError> {
        backend.create_if_missing()?;
        let snapshot = backend.load()?.normalized();
        let store = Self {
            backend,
            users: RwLock::new(Grants::new()),
            roles: RwLock::new(Grants::new()),
            persist: Mutex::new(()),
        };
        store.install(snapshot);

        let stats = store.stats();
        info!(
            "Loaded permissions from {}: {} users, {} roles",
            store.backend.describe(),
            stats.users,
            stats.roles
        );
        Ok(store)
    }

    /// Grant a node to an actor
    ///
    /// Returns whether the grant is new. Adding an existing grant changes
    /// nothing. An `Err` from persistence still leaves the grant in memory.
    pub fn add_permission(
        &self,
        namespace: Namespace,
        actor: &str,
        permission: &str,
    ) -> Result<bool, PermissionError> {
        let actor = validate_actor(actor)?;
        let node = PermissionNode::parse(permission)?;

        let added = {
            let mut grants = self.write(namespace);
            grants
                .entry(actor.clone())
                .or_default()
                .insert(node.as_str().to_string())
        };
        if added {
            info!("Granted {} to {} {}", node, namespace, actor);
        } else {
            debug!("{} {} already has {}", namespace, actor, node);
        }

        self.save()?;
        Ok(added)
    }

    /// Revoke a node from an actor
    ///
    /// Returns whether the grant existed. An actor left with no grants is
    /// removed entirely.
    pub fn remove_permission(
        &self,
        namespace: Namespace,
        actor: &str,
        permission: &str,
    ) -> Result<bool, PermissionError> {
        let actor = actor.trim();
        let permission = node::normalize(permission);

        let removed = {
            let mut grants = self.write(namespace);
            match grants.get_mut(actor) {
                Some(set) => {
                    let removed = set.remove(&permission);
                    if set.is_empty() {
                        grants.remove(actor);
                    }
                    removed
                }
                None => false,
            }
        };
        if removed {
            info!("Revoked {} from {} {}", permission, namespace, actor);
        }

        self.save()?;
        Ok(removed)
    }

    /// Remove every grant of an actor; returns whether it had any
    pub fn clear(&self, namespace: Namespace, actor: &str) -> Result<bool, PermissionError> {
        let actor = actor.trim();
        let cleared = self.write(namespace).remove(actor).is_some();
        if cleared {
            info!("Cleared permissions of {} {}", namespace, actor);
        }

        self.save()?;
        Ok(cleared)
    }

    /// Copy of an actor's grants; unknown actors have none
    pub fn get(&self, namespace: Namespace, actor: &str) -> BTreeSet<String> {
        self.read(namespace)
            .get(actor.trim())
            .cloned()
            .unwrap_or_default()
    }

    /// Actors with at least one grant
    pub fn list_actors(&self, namespace: Namespace) -> BTreeSet<String> {
        self.read(namespace).keys().cloned().collect()
    }

    /// True if any of the actor's grants authorizes `required`
    ///
    /// Evaluated under the read lock without copying the grant set.
    pub fn grants(&self, namespace: Namespace, actor: &str, required: &str) -> bool {
        self.read(namespace)
            .get(actor.trim())
            .map(|set| set.iter().any(|granted| node::matches(granted, required)))
            .unwrap_or(false)
    }

    /// Ordered copy of both namespaces
    pub fn snapshot(&self) -> PermissionSnapshot {
        PermissionSnapshot {
            users: to_sorted(&self.read(Namespace::User)),
            roles: to_sorted(&self.read(Namespace::Role)),
        }
    }

    /// Write the current mapping to the backend
    pub fn save(&self) -> Result<(), PermissionError> {
        let _persist = self.persist.lock().unwrap_or_else(|e| e.into_inner());
        let snapshot = self.snapshot();
        self.backend.save(&snapshot).map_err(|e| {
            warn!(
                "Failed to save permissions to {}: {}",
                self.backend.describe(),
                e
            );
            e
        })
    }

    /// Replace the in-memory mapping with what the backend holds
    ///
    /// On failure the current mapping is kept.
    pub fn reload(&self) -> Result<(), PermissionError> {
        let _persist = self.persist.lock().unwrap_or_else(|e| e.into_inner());
        let snapshot = self.backend.load().map_err(|e| {
            warn!(
                "Failed to reload permissions from {}: {}",
                self.backend.describe(),
                e
            );
            e
        })?;
        self.install(snapshot.normalized());

        let stats = self.stats();
        info!(
            "Reloaded permissions: {} users, {} roles",
            stats.users, stats.roles
        );
        Ok(())
    }

    /// Number of actors per namespace
    pub fn stats(&self) -> PermissionStats {
        PermissionStats {
            users: self.read(Namespace::User).len(),
            roles: self.read(Namespace::Role).len(),
        }
    }

    fn install(&self, snapshot: PermissionSnapshot) {
        *self.write(Namespace::User) = from_snapshot(snapshot.users);
        *self.write(Namespace::Role) = from_snapshot(snapshot.roles);
    }

    fn lock(&self, namespace: Namespace) -> &RwLock<Grants> {
        match namespace {
            Namespace::User => &self.users,
            Namespace::Role => &self.roles,
        }
    }

    fn read(&self, namespace: Namespace) -> RwLockReadGuard<'_, Grants> {
        self.lock(namespace)
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, namespace: Namespace) -> RwLockWriteGuard<'_, Grants> {
        self.lock(namespace)
            .write()
            .unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for PermissionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionStore")
            .field("backend", &self.backend.describe())
            .field("stats", &self.stats())
            .finish()
    }
}

fn validate_actor(actor: &str) -> Result<String, PermissionError> {
    let actor = actor.trim();
    if actor.is_empty() || actor.chars().any(char::is_whitespace) {
        return Err(PermissionError::InvalidActor(actor.to_string()));
    }
    Ok(actor.to_string())
}

fn to_sorted(grants: &Grants) -> BTreeMap<String, Vec<String>> {
    grants
        .iter()
        .map(|(actor, set)| (actor.clone(), set.iter().cloned().collect()))
        .collect()
}

fn from_snapshot(map: BTreeMap<String, Vec<String>>) -> Grants {
    map.into_iter()
        .map(|(actor, nodes)| (actor, nodes.into_iter().collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::backend::MemoryBackend;

    fn store() -> (Arc<MemoryBackend>, PermissionStore) {
        let backend = Arc::new(MemoryBackend::new());
        let store = PermissionStore::open(backend.clone()).unwrap();
        (backend, store)
    }

    #[test]
    fn add_normalizes_and_is_idempotent() {
        let (backend, store) = store();
        assert!(store
            .add_permission(Namespace::User, "1001", "Moderation.Kick")
            .unwrap());
        assert!(!store
            .add_permission(Namespace::User, "1001", "moderation.kick")
            .unwrap());
        let grants = store.get(Namespace::User, "1001");
        assert_eq!(grants.len(), 1);
        assert!(grants.contains("moderation.kick"));
        assert_eq!(backend.stored().users["1001"], vec!["moderation.kick"]);
    }

    #[test]
    fn remove_drops_empty_actor() {
        let (_, store) = store();
        store.add_permission(Namespace::Role, "42", "a.b").unwrap();
        assert!(!store.remove_permission(Namespace::Role, "42", "x.y").unwrap());
        assert_eq!(store.list_actors(Namespace::Role).len(), 1);
        assert!(store.remove_permission(Namespace::Role, "42", "A.B").unwrap());
        assert!(store.list_actors(Namespace::Role).is_empty());
        assert!(store.get(Namespace::Role, "42").is_empty());
    }

    #[test]
    fn clear_and_unknown_actor() {
        let (_, store) = store();
        store.add_permission(Namespace::User, "1", "a").unwrap();
        store.add_permission(Namespace::User, "1", "b").unwrap();
        assert!(store.clear(Namespace::User, "1").unwrap());
        assert!(!store.clear(Namespace::User, "1").unwrap());
        assert!(store.get(Namespace::User, "nobody").is_empty());
    }

    #[test]
    fn invalid_input_is_rejected() {
        let (_, store) = store();
        assert!(matches!(
            store.add_permission(Namespace::User, " ", "a"),
            Err(PermissionError::InvalidActor(_))
        ));
        assert!(matches!(
            store.add_permission(Namespace::User, "1", "a b"),
            Err(PermissionError::InvalidNode { .. })
        ));
        assert_eq!(store.stats(), PermissionStats::default());
    }

    #[test]
    fn failed_save_keeps_memory_state() {
        let (backend, store) = store();
        backend.set_fail_writes(true);
        let err = store
            .add_permission(Namespace::User, "1", "a.b")
            .unwrap_err();
        assert!(err.is_persistence());
        assert!(store.get(Namespace::User, "1").contains("a.b"));
        assert!(backend.stored().is_empty());

        backend.set_fail_writes(false);
        store.save().unwrap();
        assert_eq!(backend.stored().users["1"], vec!["a.b"]);
    }

    #[test]
    fn reload_picks_up_external_edits_and_survives_failure() {
        let (backend, store) = store();
        store.add_permission(Namespace::User, "1", "a").unwrap();

        let mut edited = PermissionSnapshot::default();
        edited.roles.insert("9".into(), vec!["Admin.*".into()]);
        backend.replace(edited);
        store.reload().unwrap();
        assert!(store.get(Namespace::User, "1").is_empty());
        assert!(store.get(Namespace::Role, "9").contains("admin.*"));

        backend.set_fail_reads(true);
        assert!(store.reload().is_err());
        assert!(store.get(Namespace::Role, "9").contains("admin.*"));
    }

    #[test]
    fn grants_uses_wildcard_matching() {
        let (_, store) = store();
        store.add_permission(Namespace::Role, "mods", "moderation.*").unwrap();
        assert!(store.grants(Namespace::Role, "mods", "moderation.kick"));
        assert!(!store.grants(Namespace::Role, "mods", "modules.enable"));
        assert!(!store.grants(Namespace::Role, "other", "moderation.kick"));
    }

    #[test]
    fn namespace_parsing() {
        assert_eq!("User".parse::<Namespace>().unwrap(), Namespace::User);
        assert_eq!("roles".parse::<Namespace>().unwrap(), Namespace::Role);
        assert!("group".parse::<Namespace>().is_err());
        assert_eq!(Namespace::Role.to_string(), "role");
    }
}
