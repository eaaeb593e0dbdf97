//! Newline-delimited JSON sink
//!
//! Layout: `<root>/<table>/schema.json` plus one `<YYYYMMDD>.ndjson` file per day, to which
//! every load appends.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rolemap_core::{CoreError, LoadReceipt, Permission, Result, Role, WarehouseSink};
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::schema::TableSchema;

/// Default table names
pub const ROLES_TABLE: &str = "roles";
pub const PERMISSIONS_TABLE: &str = "permissions";

/// Sink writing day-partitioned NDJSON files under a root directory
pub struct NdjsonSink {
    root: PathBuf,
    roles: TableSchema,
    permissions: TableSchema,
    partition: Option<NaiveDate>,
}

impl NdjsonSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            roles: TableSchema::roles(ROLES_TABLE),
            permissions: TableSchema::permissions(PERMISSIONS_TABLE),
            partition: None,
        }
    }

    /// Use custom table names
    pub fn with_tables(mut self, roles: impl Into<String>, permissions: impl Into<String>) -> Self {
        self.roles = TableSchema::roles(roles);
        self.permissions = TableSchema::permissions(permissions);
        self
    }

    /// Write into a fixed partition instead of today's (UTC)
    pub fn with_partition(mut self, date: NaiveDate) -> Self {
        self.partition = Some(date);
        self
    }

    fn partition_file(&self, table: &str) -> PathBuf {
        let day = self.partition.unwrap_or_else(|| Utc::now().date_naive());
        self.root
            .join(table)
            .join(format!("{}.ndjson", day.format("%Y%m%d")))
    }

    /// Create the table directory and schema file if missing
    async fn provision(&self, schema: &TableSchema) -> Result<()> {
        let dir = self.root.join(&schema.table);
        fs::create_dir_all(&dir).await?;

        let schema_path = dir.join("schema.json");
        if fs::try_exists(&schema_path).await? {
            return Ok(());
        }

        let content = serde_json::to_vec_pretty(schema)?;
        fs::write(&schema_path, content).await?;
        info!("Provisioned table {} at {}", schema.table, dir.display());
        Ok(())
    }

    /// Validate `rows` and render them as newline-delimited JSON
    fn encode<T: Serialize>(schema: &TableSchema, rows: &[T]) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            let value = serde_json::to_value(row)?;
            schema.validate(index, &value)?;
            serde_json::to_writer(&mut buffer, &value)?;
            buffer.push(b'\n');
        }
        Ok(buffer)
    }

    async fn load<T: Serialize>(&self, schema: &TableSchema, rows: &[T]) -> Result<LoadReceipt> {
        let buffer = Self::encode(schema, rows)?;
        self.provision(schema).await?;

        let path = self.partition_file(&schema.table);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&buffer).await?;
        file.flush().await?;

        debug!("Appended {} rows to {}", rows.len(), path.display());
        Ok(LoadReceipt {
            table: schema.table.clone(),
            rows: rows.len(),
            location: path.display().to_string(),
        })
    }
}

#[async_trait]
impl WarehouseSink for NdjsonSink {
    async fn validate(&self, roles: &[Role], permissions: &[Permission]) -> Result<()> {
        Self::encode(&self.roles, roles).map_err(|e| with_table(&self.roles.table, e))?;
        Self::encode(&self.permissions, permissions)
            .map_err(|e| with_table(&self.permissions.table, e))?;
        Ok(())
    }

    async fn load_roles(&self, roles: &[Role]) -> Result<LoadReceipt> {
        self.load(&self.roles, roles)
            .await
            .map_err(|e| with_table(&self.roles.table, e))
    }

    async fn load_permissions(&self, permissions: &[Permission]) -> Result<LoadReceipt> {
        self.load(&self.permissions, permissions)
            .await
            .map_err(|e| with_table(&self.permissions.table, e))
    }
}

fn with_table(table: &str, error: CoreError) -> CoreError {
    match error {
        e @ CoreError::Sink(_) => e,
        other => CoreError::sink(format!("load into {} failed: {}", table, other)),
    }
}
