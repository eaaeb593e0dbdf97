//! Resource hierarchy trait

use crate::error::Result;
use crate::types::{Organization, Page, Project};
use async_trait::async_trait;

/// Remote resource hierarchy (organizations and projects)
#[async_trait]
pub trait ResourceHierarchy: Send + Sync {
    /// Look up an organization by resource name (`organizations/<id>`)
    async fn get_organization(&self, name: &str) -> Result<Organization>;

    /// List one page of projects visible to the caller, in any lifecycle state
    async fn list_projects(&self, page_token: Option<&str>) -> Result<Page<Project>>;
}
