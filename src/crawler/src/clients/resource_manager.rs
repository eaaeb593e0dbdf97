//! Resource manager v1 client

use async_trait::async_trait;
use rolemap_core::{Organization, Page, Project, ResourceHierarchy, Result};
use serde::Deserialize;

use super::{page_query, HttpClientConfig, RestClient, RESOURCE_MANAGER_BASE_URL};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListProjectsResponse {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Organization lookups and project listings
#[derive(Clone)]
pub struct ResourceManagerClient {
    rest: RestClient,
}

impl ResourceManagerClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(config)?,
        })
    }

    /// Client for the public endpoint
    pub fn with_access_token(access_token: Option<String>) -> Result<Self> {
        Self::new(HttpClientConfig::new(RESOURCE_MANAGER_BASE_URL).with_access_token(access_token))
    }
}

#[async_trait]
impl ResourceHierarchy for ResourceManagerClient {
    async fn get_organization(&self, name: &str) -> Result<Organization> {
        let request = self.rest.get(&format!("v1/{}", name.trim_matches('/')));
        self.rest.send(request).await
    }

    async fn list_projects(&self, page_token: Option<&str>) -> Result<Page<Project>> {
        let request = self
            .rest
            .get("v1/projects")
            .query(&page_query(page_token, None));
        let response: ListProjectsResponse = self.rest.send(request).await?;

        Ok(Page {
            items: response.projects,
            next_page_token: response.next_page_token,
        })
    }
}
