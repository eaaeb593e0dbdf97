//! Results of a crawl run

use serde::Serialize;

use crate::store::StoreSnapshot;

/// Counters of one parent pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    /// Parent scope (empty for the predefined scope)
    pub parent: String,
    /// Summaries received from the listing
    pub listed: usize,
    /// Roles resolved and merged
    pub resolved: usize,
    /// Roles dropped because their detail lookup failed
    pub failed: usize,
    /// Roles skipped because the run was cancelled
    pub abandoned: usize,
    /// Broken role → permission edges left after the pass
    pub violations: usize,
    /// Wall time of the pass
    pub duration_ms: u64,
}

impl PassStats {
    pub fn new(parent: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            ..Default::default()
        }
    }
}

/// Rows ready for the warehouse sink
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Batch {
    /// Parent the batch belongs to; `None` when results of all parents were accumulated
    pub parent: Option<String>,
    #[serde(flatten)]
    pub snapshot: StoreSnapshot,
}

/// Outcome of a complete run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlReport {
    /// Mode label (`organization`, `project`, `default`)
    pub mode: String,
    pub region: String,
    /// Permissions seeded from the catalog before role expansion
    pub permissions_seeded: usize,
    pub passes: Vec<PassStats>,
    #[serde(skip)]
    pub batches: Vec<Batch>,
}

impl CrawlReport {
    pub fn new(mode: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            region: region.into(),
            ..Default::default()
        }
    }

    /// Role rows across all batches
    pub fn role_count(&self) -> usize {
        self.batches.iter().map(|b| b.snapshot.roles.len()).sum()
    }

    /// Permission rows across all batches
    pub fn permission_count(&self) -> usize {
        self.batches.iter().map(|b| b.snapshot.permissions.len()).sum()
    }

    /// Roles dropped by failed lookups across all passes
    pub fn failed(&self) -> usize {
        self.passes.iter().map(|p| p.failed).sum()
    }

    /// Roles abandoned after cancellation across all passes
    pub fn abandoned(&self) -> usize {
        self.passes.iter().map(|p| p.abandoned).sum()
    }
}
