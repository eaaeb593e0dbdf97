//! Permission catalog trait

use crate::error::Result;
use crate::types::{Page, PermissionDescriptor};
use async_trait::async_trait;

/// Remote catalog of permissions testable on a resource
#[async_trait]
pub trait PermissionCatalog: Send + Sync {
    /// Query one page of permissions testable on `full_resource_name`
    /// (e.g. `//cloudresourcemanager.googleapis.com/organizations/123`)
    async fn query_testable_permissions(
        &self,
        full_resource_name: &str,
        page_token: Option<&str>,
        page_size: Option<u32>,
    ) -> Result<Page<PermissionDescriptor>>;
}
