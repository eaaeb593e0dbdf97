//! Warehouse sink trait

use crate::error::Result;
use crate::types::{Permission, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Acknowledgement of one batch load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReceipt {
    /// Destination table
    pub table: String,

    /// Number of rows written
    pub rows: usize,

    /// Sink-specific location of the written batch (file path, job id, ...)
    pub location: String,
}

/// Bulk-load destination for the two output collections
///
/// A load either writes the whole batch or nothing; implementations validate every row before
/// writing the first one.
#[async_trait]
pub trait WarehouseSink: Send + Sync {
    /// Check rows against both tables without writing anything
    async fn validate(&self, _roles: &[Role], _permissions: &[Permission]) -> Result<()> {
        Ok(())
    }

    /// Load role rows
    async fn load_roles(&self, roles: &[Role]) -> Result<LoadReceipt>;

    /// Load permission rows
    async fn load_permissions(&self, permissions: &[Permission]) -> Result<LoadReceipt>;
}
