//! Crawl orchestration
//!
//! Drives one run: resolves the parent scopes for the selected mode, optionally seeds the
//! permission catalog, then crawls each parent in turn.
//!
//! # Architecture
//!
//! ```text
//! Crawler → PaginatedFetcher (sequential pages)
//!             ↓ one task per summary (bounded by the in-flight semaphore)
//!           RateLimiter.acquire → DetailResolver → AggregationStore.merge_role
//!             ↓
//!           join barrier → next parent
//! ```

pub mod report;

pub use report::{Batch, CrawlReport, PassStats};

use futures::{Stream, StreamExt, TryStreamExt};
use rolemap_core::{
    CoreError, Organization, PermissionCatalog, Project, ResourceHierarchy, RoleDirectory,
    RoleSummary,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{CrawlError, Result};
use crate::limiter::{RateLimiter, MIN_RATE};
use crate::metrics::CrawlMetrics;
use crate::pager::{paginate, PaginatedFetcher};
use crate::resolver::DetailResolver;
use crate::store::AggregationStore;

/// Prefix turning a resource name into a full resource name for catalog queries
const RESOURCE_MANAGER_PREFIX: &str = "//cloudresourcemanager.googleapis.com/";

/// Parent scope used when listing projects fails
const PROJECTS_SCOPE: &str = "projects";

/// Which parents a run crawls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlMode {
    /// Custom roles of one organization, identified by its numeric id
    Organization(String),
    /// Custom roles of every active project, optionally restricted to one organization id
    Project { organization: Option<String> },
    /// Predefined roles (empty parent scope)
    Default,
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Organization(_) => write!(f, "organization"),
            Self::Project { .. } => write!(f, "project"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// What happens to the store between parents of a multi-parent run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentResetPolicy {
    /// Every parent merges into one shared result set
    #[default]
    Accumulate,
    /// Each parent produces its own batch and the store is cleared afterwards
    ResetPerParent,
}

/// Crawler configuration
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Region tag written on every row
    pub region: String,

    /// Detail lookups per second
    pub rate_per_second: f64,

    /// Detail lookups allowed in a burst
    pub burst: u32,

    /// Cap on concurrently running resolve tasks (defaults to `burst`)
    pub max_in_flight: Option<usize>,

    /// Page size requested from listings (service default when unset)
    pub page_size: Option<u32>,

    /// Store handling between parents
    pub reset_policy: ParentResetPolicy,

    /// Seed permissions from the testable-permission catalog before role expansion
    pub seed_permission_catalog: bool,

    /// Full resource name queried for catalog seeding in default mode
    pub catalog_resource: Option<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            region: "global".to_string(),
            rate_per_second: 4.0,
            burst: 4,
            max_in_flight: None,
            page_size: None,
            reset_policy: ParentResetPolicy::Accumulate,
            seed_permission_catalog: true,
            catalog_resource: None,
        }
    }
}

impl CrawlerConfig {
    /// Effective cap on concurrently running resolve tasks
    pub fn in_flight_limit(&self) -> usize {
        self.max_in_flight.unwrap_or(self.burst as usize)
    }

    /// Validate settings that would otherwise fail mid-run
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(CrawlError::configuration("region tag must not be empty"));
        }
        if !self.rate_per_second.is_finite() || self.rate_per_second < MIN_RATE {
            return Err(CrawlError::configuration(format!(
                "rate_per_second must be at least {}",
                MIN_RATE
            )));
        }
        if self.in_flight_limit() == 0 {
            return Err(CrawlError::configuration("max_in_flight must be at least 1"));
        }
        if self.page_size == Some(0) {
            return Err(CrawlError::configuration("page_size must be at least 1"));
        }
        Ok(())
    }
}

enum TaskOutcome {
    Resolved,
    Failed,
    Abandoned,
}

/// State moved into each resolve task
struct ResolveTask {
    resolver: DetailResolver,
    limiter: Arc<RateLimiter>,
    store: Arc<AggregationStore>,
    metrics: Arc<CrawlMetrics>,
    cancel: CancellationToken,
}

impl ResolveTask {
    async fn run(self, summary: RoleSummary) -> TaskOutcome {
        if let Err(e) = self.limiter.acquire(&self.cancel).await {
            warn!("Abandoning role {}: {}", summary.name, CrawlError::from(e));
            self.metrics.items_abandoned.inc();
            return TaskOutcome::Abandoned;
        }

        match self.resolver.resolve(&summary).await {
            Ok(role) => {
                let outcome = self.store.merge_role(role);
                debug!(
                    "Merged role {} (inserted: {}, new permissions: {}, new edges: {})",
                    summary.name,
                    outcome.role_inserted,
                    outcome.permissions_created,
                    outcome.edges_added
                );
                self.metrics.roles_resolved.inc();
                TaskOutcome::Resolved
            }
            Err(e) => {
                warn!("Dropping role {}: {}", summary.name, e);
                self.metrics.resolve_failures.inc();
                TaskOutcome::Failed
            }
        }
    }
}

/// Orchestrates one crawl run
///
/// Build one `Crawler` per run: its rate limiter is shared by every task of the run and by
/// nothing else.
pub struct Crawler {
    hierarchy: Arc<dyn ResourceHierarchy>,
    catalog: Arc<dyn PermissionCatalog>,
    fetcher: PaginatedFetcher,
    resolver: DetailResolver,
    limiter: Arc<RateLimiter>,
    metrics: Arc<CrawlMetrics>,
    config: CrawlerConfig,
}

impl Crawler {
    /// Create a crawler over the three remote services
    pub fn new(
        config: CrawlerConfig,
        directory: Arc<dyn RoleDirectory>,
        hierarchy: Arc<dyn ResourceHierarchy>,
        catalog: Arc<dyn PermissionCatalog>,
        metrics: Arc<CrawlMetrics>,
    ) -> Result<Self> {
        config.validate()?;

        let limiter = Arc::new(RateLimiter::new(config.rate_per_second, config.burst)?);
        let fetcher = PaginatedFetcher::new(directory.clone())
            .with_page_size(config.page_size)
            .with_metrics(metrics.clone());
        let resolver = DetailResolver::new(directory, config.region.clone());

        info!(
            "Crawler initialized with rate={}/s, burst={}, max_in_flight={}, reset_policy={:?}",
            config.rate_per_second,
            config.burst,
            config.in_flight_limit(),
            config.reset_policy
        );

        Ok(Self {
            hierarchy,
            catalog,
            fetcher,
            resolver,
            limiter,
            metrics,
            config,
        })
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// An empty store tagged with this crawler's region
    pub fn new_store(&self) -> Arc<AggregationStore> {
        Arc::new(AggregationStore::new(self.config.region.clone()))
    }

    /// Run `mode` against a fresh store
    pub async fn run(&self, mode: &CrawlMode, cancel: &CancellationToken) -> Result<CrawlReport> {
        self.run_with_store(mode, self.new_store(), cancel).await
    }

    /// Run `mode` against `store`
    ///
    /// On a pass failure the error is returned and `store` keeps whatever earlier parents (and
    /// the failed parent's finished tasks) merged.
    pub async fn run_with_store(
        &self,
        mode: &CrawlMode,
        store: Arc<AggregationStore>,
        cancel: &CancellationToken,
    ) -> Result<CrawlReport> {
        let mut report = CrawlReport::new(mode.to_string(), self.config.region.clone());
        info!("Getting {} roles/permissions", mode);

        let parents = match mode {
            CrawlMode::Organization(id) => {
                let organization = self.resolve_organization(id).await?;
                info!("Organization name {}", organization.name);

                if self.config.seed_permission_catalog {
                    let resource = format!("{}{}", RESOURCE_MANAGER_PREFIX, organization.name);
                    report.permissions_seeded =
                        self.seed_permissions(&resource, &store, cancel).await?;
                }
                vec![organization.name]
            }
            CrawlMode::Project { organization } => self
                .active_projects(organization.as_deref(), cancel)
                .await?
                .iter()
                .map(Project::parent_scope)
                .collect(),
            CrawlMode::Default => {
                if self.config.seed_permission_catalog {
                    if let Some(resource) = &self.config.catalog_resource {
                        report.permissions_seeded =
                            self.seed_permissions(resource, &store, cancel).await?;
                    }
                }
                vec![String::new()]
            }
        };

        for parent in &parents {
            let stats = self.crawl_parent(parent, &store, cancel).await?;
            report.passes.push(stats);

            if self.config.reset_policy == ParentResetPolicy::ResetPerParent {
                report.batches.push(Batch {
                    parent: Some(parent.clone()),
                    snapshot: store.drain(),
                });
            }
        }

        if self.config.reset_policy == ParentResetPolicy::Accumulate {
            report.batches.push(Batch {
                parent: None,
                snapshot: store.snapshot(),
            });
        }

        info!(
            "Run complete: {} parents, {} roles, {} permissions, {} dropped, {} abandoned",
            report.passes.len(),
            report.role_count(),
            report.permission_count(),
            report.failed(),
            report.abandoned()
        );

        Ok(report)
    }

    /// Crawl every role under `parent` into `store`
    ///
    /// Returns once every spawned task has finished. A listing failure (or cancellation while
    /// listing) aborts the tasks still running and fails the pass.
    pub async fn crawl_parent(
        &self,
        parent: &str,
        store: &Arc<AggregationStore>,
        cancel: &CancellationToken,
    ) -> Result<PassStats> {
        let span = info_span!("crawl_pass", parent = %display_scope(parent), pass_id = %Uuid::new_v4());

        let result = self.crawl_parent_inner(parent, store, cancel).instrument(span).await;
        match &result {
            Ok(_) => self.metrics.passes_completed.inc(),
            Err(e) => {
                error!("Pass over {} failed: {}", display_scope(parent), e);
                self.metrics.passes_failed.inc();
            }
        }
        result
    }

    async fn crawl_parent_inner(
        &self,
        parent: &str,
        store: &Arc<AggregationStore>,
        cancel: &CancellationToken,
    ) -> Result<PassStats> {
        let started = Instant::now();
        let mut stats = PassStats::new(parent);
        let semaphore = Arc::new(Semaphore::new(self.config.in_flight_limit()));
        let mut tasks = JoinSet::new();

        info!("Starting pass");
        let summaries = self.fetcher.summaries(parent);
        tokio::pin!(summaries);

        loop {
            let summary = match next_or_cancelled(&mut summaries, cancel, parent).await {
                Ok(Some(summary)) => summary,
                Ok(None) => break,
                Err(e) => {
                    tasks.shutdown().await;
                    return Err(e);
                }
            };
            stats.listed += 1;
            self.metrics.roles_listed.inc();

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.shutdown().await;
                    return Err(CrawlError::listing(parent, CoreError::Cancelled));
                }
                permit = semaphore.clone().acquire_owned() => permit.map_err(|_| {
                    CrawlError::listing(parent, CoreError::invalid("in-flight semaphore closed"))
                })?,
            };

            let task = ResolveTask {
                resolver: self.resolver.clone(),
                limiter: self.limiter.clone(),
                store: store.clone(),
                metrics: self.metrics.clone(),
                cancel: cancel.clone(),
            };
            tasks.spawn(
                async move {
                    let _permit = permit;
                    task.run(summary).await
                }
                .in_current_span(),
            );
        }

        debug!("Listing done, waiting for {} tasks", tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(TaskOutcome::Resolved) => stats.resolved += 1,
                Ok(TaskOutcome::Failed) => stats.failed += 1,
                Ok(TaskOutcome::Abandoned) => stats.abandoned += 1,
                Err(e) => {
                    error!("Resolve task did not complete: {}", e);
                    stats.failed += 1;
                }
            }
        }

        let violations = store.consistency_violations();
        for violation in violations.iter().take(10) {
            warn!("Inconsistent edge: {}", violation);
        }
        stats.violations = violations.len();
        stats.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            "Pass complete: listed={}, resolved={}, failed={}, abandoned={} in {}ms",
            stats.listed, stats.resolved, stats.failed, stats.abandoned, stats.duration_ms
        );
        Ok(stats)
    }

    /// Seed `store` with every permission testable on `full_resource_name`
    ///
    /// Returns the number of permissions created.
    pub async fn seed_permissions(
        &self,
        full_resource_name: &str,
        store: &AggregationStore,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        info!("Seeding permissions testable on {}", full_resource_name);

        let catalog = self.catalog.clone();
        let resource = full_resource_name.to_string();
        let page_size = self.config.page_size;
        let descriptors = paginate(move |token: Option<String>| {
            let catalog = catalog.clone();
            let resource = resource.clone();
            async move {
                catalog
                    .query_testable_permissions(&resource, token.as_deref(), page_size)
                    .await
            }
        })
        .map_err(|e| CrawlError::listing(full_resource_name, e));
        tokio::pin!(descriptors);

        let mut seeded = 0;
        while let Some(descriptor) =
            next_or_cancelled(&mut descriptors, cancel, full_resource_name).await?
        {
            if store.seed_permission(descriptor) {
                seeded += 1;
            }
        }

        self.metrics.permissions_seeded.inc_by(seeded as u64);
        info!("Seeded {} permissions", seeded);
        Ok(seeded)
    }

    /// Active projects, optionally restricted to direct children of one organization id
    pub async fn active_projects(
        &self,
        organization: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Project>> {
        let hierarchy = self.hierarchy.clone();
        let projects = paginate(move |token: Option<String>| {
            let hierarchy = hierarchy.clone();
            async move { hierarchy.list_projects(token.as_deref()).await }
        })
        .map_err(|e| CrawlError::listing(PROJECTS_SCOPE, e));
        tokio::pin!(projects);

        let mut active = Vec::new();
        while let Some(project) = next_or_cancelled(&mut projects, cancel, PROJECTS_SCOPE).await? {
            let in_scope = organization
                .map(|id| project.belongs_to_organization(id))
                .unwrap_or(true);
            if project.is_active() && in_scope {
                active.push(project);
            } else {
                debug!(
                    "Skipping project {} (state {})",
                    project.project_id, project.lifecycle_state
                );
            }
        }

        info!("Found {} active projects", active.len());
        Ok(active)
    }

    async fn resolve_organization(&self, id: &str) -> Result<Organization> {
        let id = id.trim();
        if id.is_empty() {
            return Err(CrawlError::configuration(
                "organization mode requires an organization id",
            ));
        }

        let name = if id.starts_with("organizations/") {
            id.to_string()
        } else {
            format!("organizations/{}", id)
        };

        self.hierarchy
            .get_organization(&name)
            .await
            .map_err(|source| CrawlError::Hierarchy { name, source })
    }
}

/// Next item of a listing, or a listing error if `cancel` fires first
async fn next_or_cancelled<S, T>(
    stream: &mut S,
    cancel: &CancellationToken,
    scope: &str,
) -> Result<Option<T>>
where
    S: Stream<Item = Result<T>> + Unpin,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CrawlError::listing(scope, CoreError::Cancelled)),
        item = stream.next() => item.transpose(),
    }
}

fn display_scope(parent: &str) -> &str {
    if parent.is_empty() {
        "<predefined>"
    } else {
        parent
    }
}
