//! Router tests with in-memory services

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use rolemap_crawler::memory::{MemoryCatalog, MemoryDirectory, MemoryHierarchy, MemorySink};
use rolemap_crawler::{CrawlMetrics, CrawlMode, CrawlerConfig, ParentResetPolicy};
use rolemap_server::{create_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct Fixture {
    directory: Arc<MemoryDirectory>,
    hierarchy: Arc<MemoryHierarchy>,
    sink: Arc<MemorySink>,
    metrics: Arc<CrawlMetrics>,
}

impl Fixture {
    fn new() -> Self {
        let directory = Arc::new(MemoryDirectory::new());
        directory.add("", "roles/viewer", &["a.get", "a.list"]);
        directory.add("", "roles/editor", &["a.get", "a.update"]);

        let hierarchy = Arc::new(MemoryHierarchy::new());
        hierarchy.add_project("alpha", "ACTIVE", None);
        hierarchy.add_project("beta", "ACTIVE", None);
        directory.add("projects/alpha", "projects/alpha/roles/ops", &["a.get"]);
        directory.add("projects/beta", "projects/beta/roles/ops", &["a.list"]);

        Self {
            directory,
            hierarchy,
            sink: Arc::new(MemorySink::new()),
            metrics: Arc::new(CrawlMetrics::new().unwrap()),
        }
    }

    fn state(&self, mode: CrawlMode, config: CrawlerConfig) -> AppState {
        AppState::new(
            mode,
            config,
            self.directory.clone(),
            self.hierarchy.clone(),
            Arc::new(MemoryCatalog::new()),
            self.sink.clone(),
            self.metrics.clone(),
        )
    }

    fn router(&self, mode: CrawlMode) -> Router {
        create_router(self.state(mode, fast_config()))
    }
}

fn fast_config() -> CrawlerConfig {
    CrawlerConfig {
        rate_per_second: 1000.0,
        burst: 8,
        ..Default::default()
    }
}

async fn get(router: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[cfg(test)]
mod endpoints {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let fixture = Fixture::new();
        let (status, body) = get(fixture.router(CrawlMode::Default), "/_ah/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn test_metrics_after_crawl() {
        let fixture = Fixture::new();
        let router = fixture.router(CrawlMode::Default);

        let (status, _) = get(router.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get(router, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("rolemap_crawl_roles_resolved_total 2"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let fixture = Fixture::new();
        let (status, _) = get(fixture.router(CrawlMode::Default), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[cfg(test)]
mod crawl {
    use super::*;

    #[tokio::test]
    async fn test_crawl_loads_into_sink() {
        let fixture = Fixture::new();
        let (status, body) = get(fixture.router(CrawlMode::Default), "/").await;
        assert_eq!(status, StatusCode::OK);

        let summary: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(summary["mode"], "default");
        assert_eq!(summary["roles"], 2);
        assert_eq!(summary["permissions"], 3);
        assert_eq!(summary["dropped"], 0);
        assert_eq!(summary["loads"].as_array().unwrap().len(), 2);

        assert_eq!(fixture.sink.roles().len(), 2);
        assert_eq!(fixture.sink.permissions().len(), 3);
        let get_permission = fixture
            .sink
            .permissions()
            .into_iter()
            .find(|p| p.name == "a.get")
            .unwrap();
        assert_eq!(get_permission.roles.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_per_parent_loads_each_batch() {
        let fixture = Fixture::new();
        let router = create_router(fixture.state(
            CrawlMode::Project { organization: None },
            CrawlerConfig {
                reset_policy: ParentResetPolicy::ResetPerParent,
                ..fast_config()
            },
        ));

        let (status, body) = get(router, "/").await;
        assert_eq!(status, StatusCode::OK);

        let summary: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(summary["passes"].as_array().unwrap().len(), 2);
        assert_eq!(summary["loads"].as_array().unwrap().len(), 4);
        assert_eq!(fixture.sink.loads(), 4);
    }

    #[tokio::test]
    async fn test_empty_result_still_loads() {
        let fixture = Fixture::new();
        let router = create_router(fixture.state(
            CrawlMode::Project {
                organization: Some("elsewhere".to_string()),
            },
            fast_config(),
        ));

        let (status, _) = get(router, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fixture.sink.loads(), 2);
        assert!(fixture.sink.roles().is_empty());
    }
}

#[cfg(test)]
mod failures {
    use super::*;

    #[tokio::test]
    async fn test_listing_failure_is_500_json() {
        let fixture = Fixture::new();
        fixture.directory.fail_list("", 0);

        let (status, body) = get(fixture.router(CrawlMode::Default), "/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let error: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["status"], 500);
        assert!(error["error"].as_str().unwrap().contains("Listing failed"));
        assert_eq!(fixture.sink.loads(), 0);
    }

    #[tokio::test]
    async fn test_sink_failure_is_500() {
        let fixture = Fixture::new();
        fixture.sink.fail_loads();

        let (status, body) = get(fixture.router(CrawlMode::Default), "/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let error: Value = serde_json::from_slice(&body).unwrap();
        assert!(error["error"].as_str().unwrap().contains("Load failed"));
    }

    #[tokio::test]
    async fn test_rejected_rows_load_no_batch() {
        let fixture = Fixture::new();
        fixture.sink.reject_rows();
        let router = create_router(fixture.state(
            CrawlMode::Project { organization: None },
            CrawlerConfig {
                reset_policy: ParentResetPolicy::ResetPerParent,
                ..fast_config()
            },
        ));

        let (status, _) = get(router, "/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(fixture.sink.loads(), 0);
        assert!(fixture.sink.roles().is_empty());
    }

    #[tokio::test]
    async fn test_missing_organization_is_400() {
        let fixture = Fixture::new();
        let (status, _) = get(
            fixture.router(CrawlMode::Organization(String::new())),
            "/",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_abandons_pending_lookups() {
        let fixture = Fixture::new();
        fixture.directory.set_get_delay(Duration::from_secs(5));

        let state = fixture
            .state(
                CrawlMode::Default,
                CrawlerConfig {
                    rate_per_second: 0.01,
                    burst: 1,
                    max_in_flight: Some(2),
                    ..Default::default()
                },
            )
            .with_crawl_timeout(Some(Duration::from_secs(1)));

        let (status, body) = get(create_router(state), "/").await;
        assert_eq!(status, StatusCode::OK);

        // the lookup already issued completes; the one waiting for a token is abandoned
        let summary: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(summary["roles"], 1);
        assert_eq!(summary["abandoned"], 1);
        assert_eq!(fixture.directory.total_get_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_while_listing_is_503() {
        let fixture = Fixture::new();
        fixture.directory.set_get_delay(Duration::from_secs(5));

        let state = fixture
            .state(
                CrawlMode::Default,
                CrawlerConfig {
                    rate_per_second: 0.01,
                    burst: 1,
                    max_in_flight: Some(1),
                    ..Default::default()
                },
            )
            .with_crawl_timeout(Some(Duration::from_secs(1)));

        // the listing loop is still waiting for an in-flight permit when the timeout fires
        let (status, body) = get(create_router(state), "/").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let error: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["status"], 503);
        assert_eq!(fixture.sink.loads(), 0);
    }
}
