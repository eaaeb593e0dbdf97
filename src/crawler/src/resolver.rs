//! Detail resolution of listed roles

use rolemap_core::{Role, RoleDirectory, RoleSummary};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{CrawlError, Result};

/// Resolves a listed summary into a complete `Role`
///
/// Issues exactly one detail lookup per call and never retries.
#[derive(Clone)]
pub struct DetailResolver {
    directory: Arc<dyn RoleDirectory>,
    region: String,
}

impl DetailResolver {
    /// Create a resolver tagging every role with `region`
    pub fn new(directory: Arc<dyn RoleDirectory>, region: impl Into<String>) -> Self {
        Self {
            directory,
            region: region.into(),
        }
    }

    /// Look up `summary` and build its role record
    ///
    /// Attributes come from the detail answer; where it leaves one empty the summary's value is
    /// kept. Blank permission names are skipped. Failures are reported as
    /// `CrawlError::Resolve`.
    pub async fn resolve(&self, summary: &RoleSummary) -> Result<Role> {
        let detail = self
            .directory
            .get_role(&summary.name)
            .await
            .map_err(|e| CrawlError::resolve(&summary.name, e))?;

        debug!(
            "Resolved role {} ({} included permissions)",
            summary.name,
            detail.included_permissions.len()
        );

        let total = detail.included_permissions.len();
        let permissions: Vec<String> = detail
            .included_permissions
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .collect();
        if permissions.len() < total {
            warn!(
                "Role {} lists {} blank permission names, skipping them",
                summary.name,
                total - permissions.len()
            );
        }

        let mut role = Role::new(&summary.name, &self.region).with_permissions(permissions);
        role.title = prefer(detail.title, &summary.title);
        role.description = prefer(detail.description, &summary.description);
        role.stage = prefer(detail.stage, &summary.stage);
        role.etag = prefer(detail.etag, &summary.etag);
        role.deleted = detail.deleted || summary.deleted;

        Ok(role)
    }
}

fn prefer(detail: String, summary: &str) -> String {
    if detail.is_empty() {
        summary.to_string()
    } else {
        detail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDirectory;
    use rolemap_core::RoleDetail;

    #[tokio::test]
    async fn test_resolve_merges_summary_and_detail() {
        let directory = Arc::new(MemoryDirectory::new());
        directory.add_role(
            "",
            RoleSummary {
                name: "roles/viewer".to_string(),
                title: "Viewer".to_string(),
                stage: "GA".to_string(),
                etag: "AA==".to_string(),
                ..Default::default()
            },
            RoleDetail {
                name: "roles/viewer".to_string(),
                description: "Read access".to_string(),
                etag: "AB==".to_string(),
                included_permissions: vec!["a.get".into(), "b.get".into(), "a.get".into()],
                ..Default::default()
            },
        );

        let resolver = DetailResolver::new(directory.clone(), "europe");
        let summary = directory.summary("roles/viewer").unwrap();
        let role = resolver.resolve(&summary).await.unwrap();

        assert_eq!(role.name, "roles/viewer");
        assert_eq!(role.title, "Viewer");
        assert_eq!(role.description, "Read access");
        assert_eq!(role.stage, "GA");
        assert_eq!(role.etag, "AB==");
        assert_eq!(role.region, "europe");
        assert_eq!(role.included_permissions, vec!["a.get", "b.get"]);
        assert_eq!(directory.get_calls("roles/viewer"), 1);
    }

    #[tokio::test]
    async fn test_resolve_skips_blank_permission_names() {
        let directory = Arc::new(MemoryDirectory::new());
        directory.add_role(
            "",
            RoleSummary::new("roles/a"),
            RoleDetail::new("roles/a", ["p1", "", "  ", "p2"]),
        );

        let resolver = DetailResolver::new(directory.clone(), "global");
        let role = resolver.resolve(&RoleSummary::new("roles/a")).await.unwrap();

        assert_eq!(role.included_permissions, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn test_resolve_failure_is_resolve_error() {
        let directory = Arc::new(MemoryDirectory::new());
        directory.add_role("", RoleSummary::new("roles/b"), RoleDetail::new("roles/b", ["p1"]));
        directory.fail_get("roles/b");

        let resolver = DetailResolver::new(directory.clone(), "global");
        let err = resolver.resolve(&RoleSummary::new("roles/b")).await.unwrap_err();

        assert!(matches!(err, CrawlError::Resolve { ref name, .. } if name == "roles/b"));
        assert!(!err.is_fatal());
    }
}
