//! Error types for the crawl engine

use rolemap_core::CoreError;
use thiserror::Error;

/// Rate limiter wait failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateLimitError {
    /// The cancellation token fired before a token became available
    #[error("wait cancelled before a token was available")]
    Cancelled,
}

/// Crawl engine errors
///
/// Only `Listing`, `Hierarchy` and `Configuration` abort a pass; `Resolve` and `RateLimit`
/// are absorbed by the task that owns the entity.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// A page of a listing could not be retrieved
    #[error("Listing failed for parent '{parent}': {source}")]
    Listing {
        parent: String,
        #[source]
        source: CoreError,
    },

    /// The detail lookup of a single entity failed
    #[error("Resolve failed for '{name}': {source}")]
    Resolve {
        name: String,
        #[source]
        source: CoreError,
    },

    /// Waiting for a rate limiter token failed
    #[error("Rate limiter wait failed: {0}")]
    RateLimit(#[from] RateLimitError),

    /// Organization lookup failed
    #[error("Hierarchy lookup failed for '{name}': {source}")]
    Hierarchy {
        name: String,
        #[source]
        source: CoreError,
    },

    /// Invalid crawler configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CrawlError {
    /// Create a listing error for a parent scope
    pub fn listing(parent: impl Into<String>, source: CoreError) -> Self {
        CrawlError::Listing {
            parent: parent.into(),
            source,
        }
    }

    /// Create a resolve error for an entity
    pub fn resolve(name: impl Into<String>, source: CoreError) -> Self {
        CrawlError::Resolve {
            name: name.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        CrawlError::Configuration(msg.into())
    }

    /// Whether this error aborts the pass it occurred in
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CrawlError::Resolve { .. } | CrawlError::RateLimit(_))
    }
}

/// Result type for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(CrawlError::listing("", CoreError::transport("reset")).is_fatal());
        assert!(CrawlError::configuration("bad").is_fatal());
        assert!(!CrawlError::resolve("roles/a", CoreError::remote(500, "x")).is_fatal());
        assert!(!CrawlError::from(RateLimitError::Cancelled).is_fatal());
    }

    #[test]
    fn test_display() {
        let err = CrawlError::listing("organizations/1", CoreError::remote(403, "denied"));
        assert_eq!(
            err.to_string(),
            "Listing failed for parent 'organizations/1': Remote error (403): denied"
        );
    }
}
