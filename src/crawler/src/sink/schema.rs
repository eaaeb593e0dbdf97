//! Table schemas of the two output collections

use rolemap_core::{CoreError, Result};
use serde::Serialize;
use serde_json::Value;

/// Column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    String,
    Boolean,
}

/// Column mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    /// Present and non-empty on every row
    Required,
    /// May be absent or null
    Nullable,
    /// Array of the column type
    Repeated,
}

/// One column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSchema {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub mode: FieldMode,
}

const fn field(name: &'static str, field_type: FieldType, mode: FieldMode) -> FieldSchema {
    FieldSchema {
        name,
        field_type,
        mode,
    }
}

const ROLE_FIELDS: &[FieldSchema] = &[
    field("name", FieldType::String, FieldMode::Required),
    field("title", FieldType::String, FieldMode::Nullable),
    field("stage", FieldType::String, FieldMode::Nullable),
    field("etag", FieldType::String, FieldMode::Nullable),
    field("deleted", FieldType::Boolean, FieldMode::Nullable),
    field("description", FieldType::String, FieldMode::Nullable),
    field("included_permissions", FieldType::String, FieldMode::Repeated),
    field("region", FieldType::String, FieldMode::Required),
];

const PERMISSION_FIELDS: &[FieldSchema] = &[
    field("name", FieldType::String, FieldMode::Required),
    field("region", FieldType::String, FieldMode::Required),
    field("title", FieldType::String, FieldMode::Nullable),
    field("description", FieldType::String, FieldMode::Nullable),
    field("stage", FieldType::String, FieldMode::Nullable),
    field("apiDisabled", FieldType::Boolean, FieldMode::Nullable),
    field("customRolesSupportLevel", FieldType::String, FieldMode::Nullable),
    field("onlyInPredefinedRoles", FieldType::Boolean, FieldMode::Nullable),
    field("primaryPermission", FieldType::String, FieldMode::Nullable),
    field("roles", FieldType::String, FieldMode::Repeated),
];

/// Schema of one output table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    #[serde(skip)]
    pub table: String,
    pub fields: Vec<FieldSchema>,
}

impl TableSchema {
    /// Schema of the role table
    pub fn roles(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: ROLE_FIELDS.to_vec(),
        }
    }

    /// Schema of the permission table
    pub fn permissions(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: PERMISSION_FIELDS.to_vec(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check one serialized row against the schema
    ///
    /// `index` is only used in the error message.
    pub fn validate(&self, index: usize, row: &Value) -> Result<()> {
        let object = row.as_object().ok_or_else(|| {
            CoreError::sink(format!("{} row {}: not a JSON object", self.table, index))
        })?;

        for key in object.keys() {
            if self.field(key).is_none() {
                return Err(CoreError::sink(format!(
                    "{} row {}: unknown column '{}'",
                    self.table, index, key
                )));
            }
        }

        for field in &self.fields {
            let value = object.get(field.name).unwrap_or(&Value::Null);
            let violation = match field.mode {
                FieldMode::Required => match value {
                    Value::String(s) if field.field_type == FieldType::String && !s.is_empty() => None,
                    Value::Bool(_) if field.field_type == FieldType::Boolean => None,
                    Value::Null => Some("required value is missing"),
                    Value::String(s) if s.is_empty() => Some("required value is empty"),
                    _ => Some("wrong type"),
                },
                FieldMode::Nullable => {
                    if value.is_null() || matches_type(field.field_type, value) {
                        None
                    } else {
                        Some("wrong type")
                    }
                }
                FieldMode::Repeated => match value {
                    Value::Null => None,
                    Value::Array(items) if items.iter().all(|v| matches_type(field.field_type, v)) => None,
                    _ => Some("expected an array"),
                },
            };

            if let Some(reason) = violation {
                return Err(CoreError::sink(format!(
                    "{} row {}: column '{}': {}",
                    self.table, index, field.name, reason
                )));
            }
        }

        Ok(())
    }
}

fn matches_type(field_type: FieldType, value: &Value) -> bool {
    match field_type {
        FieldType::String => value.is_string(),
        FieldType::Boolean => value.is_boolean(),
    }
}
