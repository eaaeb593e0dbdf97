use rolemap_core::{PermissionCatalog, ResourceHierarchy, RoleDirectory, WarehouseSink};
use rolemap_crawler::{CrawlMetrics, CrawlMode, Crawler, CrawlerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn RoleDirectory>,
    pub hierarchy: Arc<dyn ResourceHierarchy>,
    pub catalog: Arc<dyn PermissionCatalog>,
    pub sink: Arc<dyn WarehouseSink>,
    pub metrics: Arc<CrawlMetrics>,

    /// Mode every crawl request runs in
    pub mode: CrawlMode,
    pub crawler_config: CrawlerConfig,

    /// Cancel a crawl that runs longer than this
    pub crawl_timeout: Option<Duration>,

    /// Fired on shutdown; every crawl runs under a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        mode: CrawlMode,
        crawler_config: CrawlerConfig,
        directory: Arc<dyn RoleDirectory>,
        hierarchy: Arc<dyn ResourceHierarchy>,
        catalog: Arc<dyn PermissionCatalog>,
        sink: Arc<dyn WarehouseSink>,
        metrics: Arc<CrawlMetrics>,
    ) -> Self {
        Self {
            directory,
            hierarchy,
            catalog,
            sink,
            metrics,
            mode,
            crawler_config,
            crawl_timeout: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_crawl_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.crawl_timeout = timeout;
        self
    }

    /// A crawler for one request, with its own rate limiter
    pub fn crawler(&self) -> rolemap_crawler::Result<Crawler> {
        Crawler::new(
            self.crawler_config.clone(),
            self.directory.clone(),
            self.hierarchy.clone(),
            self.catalog.clone(),
            self.metrics.clone(),
        )
    }
}
