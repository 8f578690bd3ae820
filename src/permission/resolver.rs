//! Effective authorization for an actor in context

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::permission::store::{Namespace, PermissionStore};

/// The actor an authorization check is made for: a user plus the roles it
/// is acting through
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorContext {
    pub user_id: String,
    pub role_ids: Vec<String>,
}

impl ActorContext {
    /// Actor with no roles
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role_ids: Vec::new(),
        }
    }

    /// Builder-style: set the actor's roles
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_ids = roles.into_iter().map(Into::into).collect();
        self
    }
}

/// Resolves authorization checks against a [`PermissionStore`]
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    store: Arc<PermissionStore>,
}

impl PermissionResolver {
    pub fn new(store: Arc<PermissionStore>) -> Self {
        Self { store }
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<PermissionStore> {
        &self.store
    }

    /// True if the user, or any of its roles, holds a grant matching `required`
    ///
    /// The user's own grants are checked first, then roles in the order
    /// given; the first match wins.
    pub fn authorize(&self, user_id: &str, role_ids: &[String], required: &str) -> bool {
        if self.store.grants(Namespace::User, user_id, required) {
            debug!("User {} authorized for {} by direct grant", user_id, required);
            return true;
        }
        if let Some(role) = role_ids
            .iter()
            .find(|role| self.store.grants(Namespace::Role, role, required))
        {
            debug!("User {} authorized for {} via role {}", user_id, required, role);
            return true;
        }
        debug!("User {} denied {}", user_id, required);
        false
    }

    /// [`authorize`](Self::authorize) for an [`ActorContext`]
    pub fn check(&self, actor: &ActorContext, required: &str) -> bool {
        self.authorize(&actor.user_id, &actor.role_ids, required)
    }

    /// Union of the user's grants and all of its roles' grants
    pub fn effective_permissions(&self, user_id: &str, role_ids: &[String]) -> BTreeSet<String> {
        let mut effective = self.store.get(Namespace::User, user_id);
        for role in role_ids {
            effective.extend(self.store.get(Namespace::Role, role));
        }
        effective
    }

    /// [`effective_permissions`](Self::effective_permissions) for an [`ActorContext`]
    pub fn effective_for(&self, actor: &ActorContext) -> BTreeSet<String> {
        self.effective_permissions(&actor.user_id, &actor.role_ids)
    }
}
