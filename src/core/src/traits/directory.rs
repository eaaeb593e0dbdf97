//! Identity directory trait

use crate::error::Result;
use crate::types::{Page, RoleDetail, RoleSummary};
use async_trait::async_trait;

/// Remote directory of roles
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// List one page of role summaries under `parent`
    ///
    /// An empty `parent` addresses the built-in (predefined) roles.
    async fn list_roles(
        &self,
        parent: &str,
        page_token: Option<&str>,
        page_size: Option<u32>,
    ) -> Result<Page<RoleSummary>>;

    /// Fetch the full record of one role, including its included permissions
    async fn get_role(&self, name: &str) -> Result<RoleDetail>;
}
