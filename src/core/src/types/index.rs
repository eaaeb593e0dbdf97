//! Index records: roles and the permissions they grant
//!
//! These are both the in-memory entries of the aggregation store and the rows handed to the
//! warehouse sink, so their serde shape is the output row format.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use super::remote::PermissionDescriptor;

/// Role row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique role name
    pub name: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub stage: String,

    #[serde(default)]
    pub etag: String,

    #[serde(default)]
    pub deleted: bool,

    #[serde(default)]
    pub description: String,

    /// Included permission names, in service order, without duplicates
    #[serde(default)]
    pub included_permissions: Vec<String>,

    /// Region tag of the run that produced this row
    pub region: String,
}

impl Role {
    /// Create a role with no attributes and no permissions
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            stage: String::new(),
            etag: String::new(),
            deleted: false,
            description: String::new(),
            included_permissions: Vec::new(),
            region: region.into(),
        }
    }

    /// Replace the included permissions, collapsing duplicates (first occurrence wins)
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        self.included_permissions = permissions
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| seen.insert(p.clone()))
            .collect();
        self
    }

    /// Set the display title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Descriptive attributes of a permission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionAttributes {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stage: String,

    #[serde(default)]
    pub api_disabled: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub custom_roles_support_level: String,

    #[serde(default)]
    pub only_in_predefined_roles: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub primary_permission: String,
}

impl PermissionAttributes {
    /// True when no attribute carries information
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<PermissionDescriptor> for PermissionAttributes {
    fn from(d: PermissionDescriptor) -> Self {
        Self {
            title: d.title,
            description: d.description,
            stage: d.stage,
            api_disabled: d.api_disabled,
            custom_roles_support_level: d.custom_roles_support_level,
            only_in_predefined_roles: d.only_in_predefined_roles,
            primary_permission: d.primary_permission,
        }
    }
}

/// Permission row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Unique permission name
    pub name: String,

    /// Region tag of the run that produced this row
    pub region: String,

    #[serde(flatten)]
    pub attributes: PermissionAttributes,

    /// Names of the roles that include this permission
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Permission {
    /// Create a permission with default attributes and no roles
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            attributes: PermissionAttributes::default(),
            roles: BTreeSet::new(),
        }
    }

    /// Set descriptive attributes
    pub fn with_attributes(mut self, attributes: PermissionAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Add a role edge; returns false when the edge already existed
    pub fn add_role(&mut self, role: impl Into<String>) -> bool {
        self.roles.insert(role.into())
    }

    /// Whether the given role includes this permission
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
