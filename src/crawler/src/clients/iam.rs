//! IAM role directory and permission catalog over REST

use async_trait::async_trait;
use rolemap_core::{
    Page, PermissionCatalog, PermissionDescriptor, Result, RoleDetail, RoleDirectory, RoleSummary,
};
use serde::{Deserialize, Serialize};

use super::{page_query, HttpClientConfig, RestClient, IAM_BASE_URL};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRolesResponse {
    #[serde(default)]
    roles: Vec<RoleSummary>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryTestablePermissionsRequest<'a> {
    full_resource_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_size: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryTestablePermissionsResponse {
    #[serde(default)]
    permissions: Vec<PermissionDescriptor>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// IAM v1 client
#[derive(Clone)]
pub struct GoogleIamClient {
    rest: RestClient,
}

impl GoogleIamClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(config)?,
        })
    }

    /// Client for the public endpoint
    pub fn with_access_token(access_token: Option<String>) -> Result<Self> {
        Self::new(HttpClientConfig::new(IAM_BASE_URL).with_access_token(access_token))
    }
}

/// Listing path for a parent scope; the empty parent addresses predefined roles
fn roles_path(parent: &str) -> String {
    let parent = parent.trim_matches('/');
    if parent.is_empty() {
        "v1/roles".to_string()
    } else {
        format!("v1/{}/roles", parent)
    }
}

#[async_trait]
impl RoleDirectory for GoogleIamClient {
    async fn list_roles(
        &self,
        parent: &str,
        page_token: Option<&str>,
        page_size: Option<u32>,
    ) -> Result<Page<RoleSummary>> {
        let request = self
            .rest
            .get(&roles_path(parent))
            .query(&page_query(page_token, page_size));
        let response: ListRolesResponse = self.rest.send(request).await?;

        Ok(Page {
            items: response.roles,
            next_page_token: response.next_page_token,
        })
    }

    async fn get_role(&self, name: &str) -> Result<RoleDetail> {
        let request = self.rest.get(&format!("v1/{}", name.trim_matches('/')));
        self.rest.send(request).await
    }
}

#[async_trait]
impl PermissionCatalog for GoogleIamClient {
    async fn query_testable_permissions(
        &self,
        full_resource_name: &str,
        page_token: Option<&str>,
        page_size: Option<u32>,
    ) -> Result<Page<PermissionDescriptor>> {
        let body = QueryTestablePermissionsRequest {
            full_resource_name,
            page_token: page_token.filter(|t| !t.is_empty()),
            page_size,
        };
        let request = self
            .rest
            .post("v1/permissions:queryTestablePermissions")
            .json(&body);
        let response: QueryTestablePermissionsResponse = self.rest.send(request).await?;

        Ok(Page {
            items: response.permissions,
            next_page_token: response.next_page_token,
        })
    }
}
