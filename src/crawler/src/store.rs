//! Thread-safe aggregation of roles and permissions
//!
//! Two name-keyed maps, each behind its own lock. Lock order is fixed: the roles lock is never
//! taken while the permissions lock is held. Operations that need both take roles first.

use parking_lot::Mutex;
use rolemap_core::{Permission, PermissionAttributes, PermissionDescriptor, Role};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Result of a `link_permission` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The permission did not exist and was created with the role as its only member
    Created,
    /// The role was added to an existing permission
    Linked,
    /// The edge was already present
    AlreadyLinked,
}

/// Result of merging one resolved role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Whether the role itself was inserted (false when another task got there first)
    pub role_inserted: bool,
    /// Permissions created by this merge
    pub permissions_created: usize,
    /// New edges added to existing permissions
    pub edges_added: usize,
}

/// A broken role → permission edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyViolation {
    pub role: String,
    pub permission: String,
    /// Whether the permission entry exists at all
    pub permission_exists: bool,
}

impl fmt::Display for ConsistencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.permission_exists {
            write!(f, "{} does not list role {}", self.permission, self.role)
        } else {
            write!(f, "{} (included by {}) is missing", self.permission, self.role)
        }
    }
}

/// Point-in-time copy of both collections, sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSnapshot {
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

/// Deduplicated role/permission index built by a crawl
///
/// Owned by one run and shared with its tasks through an `Arc`.
pub struct AggregationStore {
    region: String,
    roles: Mutex<HashMap<String, Role>>,
    permissions: Mutex<HashMap<String, Permission>>,
}

impl AggregationStore {
    /// Create an empty store tagging new permissions with `region`
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            roles: Mutex::new(HashMap::new()),
            permissions: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a role unless one with the same name exists
    ///
    /// First writer wins; returns whether this call inserted.
    pub fn upsert_role(&self, role: Role) -> bool {
        let mut roles = self.roles.lock();
        if roles.contains_key(&role.name) {
            return false;
        }
        roles.insert(role.name.clone(), role);
        true
    }

    /// Record that `role` includes `permission`
    ///
    /// Creates the permission (with `attributes`, or defaults) when absent. An existing entry
    /// without attributes adopts supplied ones; existing attributes are never overwritten.
    pub fn link_permission(
        &self,
        permission: &str,
        role: &str,
        attributes: Option<PermissionAttributes>,
    ) -> LinkOutcome {
        let mut permissions = self.permissions.lock();

        match permissions.get_mut(permission) {
            Some(existing) => {
                if let Some(attributes) = attributes {
                    if existing.attributes.is_empty() {
                        existing.attributes = attributes;
                    }
                }
                if existing.add_role(role) {
                    LinkOutcome::Linked
                } else {
                    LinkOutcome::AlreadyLinked
                }
            }
            None => {
                let mut entry = Permission::new(permission, &self.region)
                    .with_attributes(attributes.unwrap_or_default());
                entry.add_role(role);
                permissions.insert(permission.to_string(), entry);
                LinkOutcome::Created
            }
        }
    }

    /// Seed a permission from the catalog with an empty role set
    ///
    /// Returns whether an entry was created. An existing entry keeps its roles and only
    /// gains attributes if it had none.
    pub fn seed_permission(&self, descriptor: PermissionDescriptor) -> bool {
        let mut permissions = self.permissions.lock();

        if let Some(existing) = permissions.get_mut(&descriptor.name) {
            if existing.attributes.is_empty() {
                existing.attributes = descriptor.into();
            }
            return false;
        }

        let name = descriptor.name.clone();
        let entry = Permission::new(&name, &self.region).with_attributes(descriptor.into());
        permissions.insert(name, entry);
        true
    }

    /// Insert a resolved role and link every permission it includes
    pub fn merge_role(&self, role: Role) -> MergeOutcome {
        let role_name = role.name.clone();
        let mut included = role.included_permissions.clone();

        let mut outcome = MergeOutcome {
            role_inserted: self.upsert_role(role),
            ..Default::default()
        };

        // a losing writer links the stored role's permissions, never its own
        if !outcome.role_inserted {
            if let Some(stored) = self.roles.lock().get(&role_name) {
                included = stored.included_permissions.clone();
            }
        }

        for permission in &included {
            match self.link_permission(permission, &role_name, None) {
                LinkOutcome::Created => outcome.permissions_created += 1,
                LinkOutcome::Linked => outcome.edges_added += 1,
                LinkOutcome::AlreadyLinked => {}
            }
        }

        outcome
    }

    /// Look up a role by name
    pub fn get_role(&self, name: &str) -> Option<Role> {
        self.roles.lock().get(name).cloned()
    }

    /// Look up a permission by name
    pub fn get_permission(&self, name: &str) -> Option<Permission> {
        self.permissions.lock().get(name).cloned()
    }

    /// All roles, sorted by name
    pub fn roles(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.roles.lock().values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        roles
    }

    /// All permissions, sorted by name
    pub fn permissions(&self) -> Vec<Permission> {
        let mut permissions: Vec<Permission> =
            self.permissions.lock().values().cloned().collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        permissions
    }

    pub fn role_count(&self) -> usize {
        self.roles.lock().len()
    }

    pub fn permission_count(&self) -> usize {
        self.permissions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.role_count() == 0 && self.permission_count() == 0
    }

    /// Copy both collections under a consistent view
    pub fn snapshot(&self) -> StoreSnapshot {
        let roles = self.roles.lock();
        let permissions = self.permissions.lock();
        Self::sorted_snapshot(&roles, &permissions)
    }

    /// Copy both collections and clear them in one step
    pub fn drain(&self) -> StoreSnapshot {
        let mut roles = self.roles.lock();
        let mut permissions = self.permissions.lock();
        let snapshot = Self::sorted_snapshot(&roles, &permissions);
        roles.clear();
        permissions.clear();
        snapshot
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut roles = self.roles.lock();
        let mut permissions = self.permissions.lock();
        roles.clear();
        permissions.clear();
    }

    /// Every role → permission edge that has no matching permission → role edge
    pub fn consistency_violations(&self) -> Vec<ConsistencyViolation> {
        let roles = self.roles.lock();
        let permissions = self.permissions.lock();

        let mut violations = Vec::new();
        for role in roles.values() {
            for name in &role.included_permissions {
                match permissions.get(name) {
                    Some(permission) if permission.has_role(&role.name) => {}
                    Some(_) => violations.push(ConsistencyViolation {
                        role: role.name.clone(),
                        permission: name.clone(),
                        permission_exists: true,
                    }),
                    None => violations.push(ConsistencyViolation {
                        role: role.name.clone(),
                        permission: name.clone(),
                        permission_exists: false,
                    }),
                }
            }
        }

        violations.sort_by(|a, b| (&a.role, &a.permission).cmp(&(&b.role, &b.permission)));
        violations
    }

    fn sorted_snapshot(
        roles: &HashMap<String, Role>,
        permissions: &HashMap<String, Permission>,
    ) -> StoreSnapshot {
        let mut roles: Vec<Role> = roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        let mut permissions: Vec<Permission> = permissions.values().cloned().collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        StoreSnapshot { roles, permissions }
    }
}
