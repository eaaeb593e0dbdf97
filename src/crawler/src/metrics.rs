//! Prometheus metrics for crawl runs

use prometheus::{IntCounter, Opts, Registry};
use std::sync::Arc;

const NAMESPACE: &str = "rolemap";

/// Crawl metrics exposed to Prometheus
pub struct CrawlMetrics {
    /// Listing pages received
    pub pages_listed: IntCounter,

    /// Role summaries received from listings
    pub roles_listed: IntCounter,

    /// Roles resolved and merged
    pub roles_resolved: IntCounter,

    /// Detail lookups that failed
    pub resolve_failures: IntCounter,

    /// Work items abandoned because of cancellation
    pub items_abandoned: IntCounter,

    /// Permissions seeded from the catalog
    pub permissions_seeded: IntCounter,

    /// Parent passes that completed
    pub passes_completed: IntCounter,

    /// Parent passes that failed
    pub passes_failed: IntCounter,

    /// Prometheus registry
    registry: Arc<Registry>,
}

impl CrawlMetrics {
    /// Create crawl metrics registered in a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let counter = IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        let pages_listed = counter("crawl_pages_listed_total", "Listing pages received")?;
        let roles_listed = counter("crawl_roles_listed_total", "Role summaries listed")?;
        let roles_resolved = counter("crawl_roles_resolved_total", "Roles resolved and merged")?;
        let resolve_failures = counter("crawl_resolve_failures_total", "Failed detail lookups")?;
        let items_abandoned = counter(
            "crawl_items_abandoned_total",
            "Work items abandoned after cancellation",
        )?;
        let permissions_seeded = counter(
            "crawl_permissions_seeded_total",
            "Permissions seeded from the testable-permission catalog",
        )?;
        let passes_completed = counter("crawl_passes_completed_total", "Completed parent passes")?;
        let passes_failed = counter("crawl_passes_failed_total", "Failed parent passes")?;

        Ok(Self {
            pages_listed,
            roles_listed,
            roles_resolved,
            resolve_failures,
            items_abandoned,
            permissions_seeded,
            passes_completed,
            passes_failed,
            registry: Arc::new(registry),
        })
    }

    /// Get Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
