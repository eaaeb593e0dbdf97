//! Cursor-driven paged listings
//!
//! `paginate` turns a page-fetching closure into a lazy stream of items; `PaginatedFetcher`
//! applies it to role listings. Both are restartable: every call starts a fresh listing from
//! the first page.

use futures::stream::{self, Stream, TryStreamExt};
use rolemap_core::{CoreError, Page, RoleDirectory, RoleSummary};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::error::CrawlError;
use crate::metrics::CrawlMetrics;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Stream every item of a paged listing, requesting pages until no cursor is returned
///
/// The closure receives the cursor of the page to fetch (`None` for the first page). Pages are
/// requested one at a time and only as the stream is polled. A cursor identical to the one just
/// used ends the stream with an error instead of looping forever.
pub fn paginate<T, F, Fut>(fetch: F) -> impl Stream<Item = rolemap_core::Result<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = rolemap_core::Result<Page<T>>>,
{
    stream::try_unfold((Cursor::Start, fetch), |(cursor, mut fetch)| async move {
        let token = match cursor {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return Ok(None),
        };

        let page = fetch(token.clone()).await?;

        let next = match page.next_token() {
            Some(next) if token.as_deref() == Some(next) => {
                return Err(CoreError::invalid(format!(
                    "service repeated page token '{}'",
                    next
                )));
            }
            Some(next) => Cursor::Next(next.to_string()),
            None => Cursor::Done,
        };

        let items = stream::iter(page.items.into_iter().map(Ok::<T, CoreError>));
        Ok(Some((items, (next, fetch))))
    })
    .try_flatten()
}

/// Paged listing of role summaries for a parent scope
#[derive(Clone)]
pub struct PaginatedFetcher {
    directory: Arc<dyn RoleDirectory>,
    page_size: Option<u32>,
    metrics: Option<Arc<CrawlMetrics>>,
}

impl PaginatedFetcher {
    /// Create a fetcher over a role directory
    pub fn new(directory: Arc<dyn RoleDirectory>) -> Self {
        Self {
            directory,
            page_size: None,
            metrics: None,
        }
    }

    /// Request pages of at most `page_size` items (service default when unset)
    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    /// Count received pages in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<CrawlMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Stream all role summaries under `parent`
    ///
    /// An empty parent lists the predefined roles. Any page failure yields a single
    /// `CrawlError::Listing` and ends the stream.
    pub fn summaries(
        &self,
        parent: &str,
    ) -> impl Stream<Item = Result<RoleSummary, CrawlError>> + Send + 'static {
        let directory = self.directory.clone();
        let page_size = self.page_size;
        let metrics = self.metrics.clone();
        let scope = parent.to_string();
        let error_scope = scope.clone();

        paginate(move |token: Option<String>| {
            let directory = directory.clone();
            let metrics = metrics.clone();
            let scope = scope.clone();
            async move {
                debug!("Listing roles under '{}' (page token: {:?})", scope, token);
                let page = directory
                    .list_roles(&scope, token.as_deref(), page_size)
                    .await?;
                if let Some(metrics) = &metrics {
                    metrics.pages_listed.inc();
                }
                Ok::<_, CoreError>(page)
            }
        })
        .map_err(move |e| CrawlError::listing(error_scope.clone(), e))
    }
}
