//! Wire shapes of the remote directory, hierarchy, and catalog services
//!
//! Field names follow the services' JSON (camelCase). Every field is defaulted so that a sparse
//! answer (the list view omits most attributes) still decodes.

use serde::{Deserialize, Serialize};

/// One page of a cursor-driven listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page, in service order
    pub items: Vec<T>,

    /// Continuation cursor; `None` (or an empty string) ends the listing
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// A page that ends the listing
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }

    /// A page followed by another one
    pub fn with_next(items: Vec<T>, token: impl Into<String>) -> Self {
        Self {
            items,
            next_page_token: Some(token.into()),
        }
    }

    /// The continuation cursor, with empty strings treated as absent
    pub fn next_token(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Role as returned by a listing call (no included permissions)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoleSummary {
    pub name: String,
    pub title: String,
    pub description: String,
    pub stage: String,
    pub etag: String,
    pub deleted: bool,
}

impl RoleSummary {
    /// Summary carrying only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Role as returned by a detail lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoleDetail {
    pub name: String,
    pub title: String,
    pub description: String,
    pub stage: String,
    pub etag: String,
    pub deleted: bool,
    pub included_permissions: Vec<String>,
}

impl RoleDetail {
    /// Detail record with a name and its included permissions
    pub fn new<I, S>(name: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            included_permissions: permissions.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

/// Organization lookup answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Organization {
    /// Canonical resource name, `organizations/<id>`
    pub name: String,
    pub display_name: String,
    pub lifecycle_state: String,
}

/// Parent pointer of a project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParentRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

/// Project listing entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub project_id: String,
    pub project_number: String,
    pub name: String,
    pub lifecycle_state: String,
    pub parent: Option<ParentRef>,
}

impl Project {
    /// Only active projects are crawled
    pub fn is_active(&self) -> bool {
        self.lifecycle_state == "ACTIVE"
    }

    /// Whether the project sits directly under the given organization id
    pub fn belongs_to_organization(&self, organization_id: &str) -> bool {
        self.parent
            .as_ref()
            .map(|p| p.kind == "organization" && p.id == organization_id)
            .unwrap_or(false)
    }

    /// Parent scope used for role listing, `projects/<projectId>`
    pub fn parent_scope(&self) -> String {
        format!("projects/{}", self.project_id)
    }
}

/// Entry of the testable-permission catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermissionDescriptor {
    pub name: String,
    pub title: String,
    pub description: String,
    pub stage: String,
    pub api_disabled: bool,
    pub custom_roles_support_level: String,
    pub only_in_predefined_roles: bool,
    pub primary_permission: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_token_handling() {
        let page: Page<u8> = Page::with_next(vec![1], "");
        assert_eq!(page.next_token(), None);

        let page: Page<u8> = Page::with_next(vec![1], "abc");
        assert_eq!(page.next_token(), Some("abc"));

        let page: Page<u8> = Page::last(vec![]);
        assert_eq!(page.next_token(), None);
    }

    #[test]
    fn test_role_detail_decodes_sparse_json() {
        let detail: RoleDetail = serde_json::from_str(
            r#"{"name":"roles/viewer","includedPermissions":["a.b.get","a.b.list"]}"#,
        )
        .unwrap();

        assert_eq!(detail.name, "roles/viewer");
        assert_eq!(detail.included_permissions.len(), 2);
        assert!(!detail.deleted);
        assert!(detail.title.is_empty());
    }

    #[test]
    fn test_project_filters() {
        let project: Project = serde_json::from_str(
            r#"{"projectId":"p1","lifecycleState":"ACTIVE","parent":{"type":"organization","id":"42"}}"#,
        )
        .unwrap();

        assert!(project.is_active());
        assert!(project.belongs_to_organization("42"));
        assert!(!project.belongs_to_organization("43"));
        assert_eq!(project.parent_scope(), "projects/p1");

        let orphan = Project {
            project_id: "p2".to_string(),
            lifecycle_state: "DELETE_REQUESTED".to_string(),
            ..Default::default()
        };
        assert!(!orphan.is_active());
        assert!(!orphan.belongs_to_organization("42"));
    }

    #[test]
    fn test_permission_descriptor_decodes() {
        let descriptor: PermissionDescriptor = serde_json::from_str(
            r#"{"name":"compute.instances.get","stage":"GA","apiDisabled":true,
                "customRolesSupportLevel":"SUPPORTED","onlyInPredefinedRoles":false}"#,
        )
        .unwrap();

        assert_eq!(descriptor.name, "compute.instances.get");
        assert!(descriptor.api_disabled);
        assert_eq!(descriptor.custom_roles_support_level, "SUPPORTED");
    }
}
