//! Role/permission crawl engine
//!
//! Enumerates roles under one or more parent scopes, resolves each role's included
//! permissions under a shared rate limit, and merges everything into a deduplicated,
//! bidirectionally linked index ready for a warehouse sink.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rolemap_crawler::clients::{GoogleIamClient, ResourceManagerClient};
//! use rolemap_crawler::{CrawlMetrics, CrawlMode, Crawler, CrawlerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let iam = Arc::new(GoogleIamClient::with_access_token(None)?);
//! let hierarchy = Arc::new(ResourceManagerClient::with_access_token(None)?);
//! let crawler = Crawler::new(
//!     CrawlerConfig::default(),
//!     iam.clone(),
//!     hierarchy,
//!     iam,
//!     Arc::new(CrawlMetrics::new()?),
//! )?;
//!
//! let report = crawler.run(&CrawlMode::Default, &CancellationToken::new()).await?;
//! println!("{} roles", report.role_count());
//! # Ok(())
//! # }
//! ```

pub mod clients;
pub mod error;
pub mod limiter;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod metrics;
pub mod orchestrator;
pub mod pager;
pub mod resolver;
pub mod sink;
pub mod store;

pub use error::{CrawlError, RateLimitError, Result};
pub use limiter::RateLimiter;
pub use metrics::CrawlMetrics;
pub use orchestrator::{
    Batch, CrawlMode, CrawlReport, Crawler, CrawlerConfig, ParentResetPolicy, PassStats,
};
pub use pager::{paginate, PaginatedFetcher};
pub use resolver::DetailResolver;
pub use sink::{load_batch, load_batches, NdjsonSink};
pub use store::{AggregationStore, ConsistencyViolation, LinkOutcome, MergeOutcome, StoreSnapshot};
