//! Warehouse sinks

mod ndjson;
mod schema;

pub use ndjson::{NdjsonSink, PERMISSIONS_TABLE, ROLES_TABLE};
pub use schema::{FieldMode, FieldSchema, FieldType, TableSchema};

use rolemap_core::{LoadReceipt, WarehouseSink};
use tracing::info;

use crate::orchestrator::Batch;

/// Load every row of `batch` into `sink`, roles first
///
/// An empty batch still produces two zero-row loads.
pub async fn load_batch(
    sink: &dyn WarehouseSink,
    batch: &Batch,
) -> rolemap_core::Result<Vec<LoadReceipt>> {
    load_batches(sink, std::slice::from_ref(batch)).await
}

/// Load several batches, validating all of them before the first write
///
/// A row rejected in any batch leaves every table untouched.
pub async fn load_batches(
    sink: &dyn WarehouseSink,
    batches: &[Batch],
) -> rolemap_core::Result<Vec<LoadReceipt>> {
    for batch in batches {
        sink.validate(&batch.snapshot.roles, &batch.snapshot.permissions)
            .await?;
    }

    let mut receipts = Vec::with_capacity(batches.len() * 2);
    for batch in batches {
        let roles = sink.load_roles(&batch.snapshot.roles).await?;
        let permissions = sink.load_permissions(&batch.snapshot.permissions).await?;

        info!(
            "Loaded {} roles into {} and {} permissions into {}",
            roles.rows, roles.table, permissions.rows, permissions.table
        );
        receipts.push(roles);
        receipts.push(permissions);
    }
    Ok(receipts)
}
