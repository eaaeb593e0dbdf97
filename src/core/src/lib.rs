//! # rolemap core
//!
//! Shared record types, remote service traits, and error handling for the role/permission
//! indexer. The crawler and the server both depend on this crate; it has no runtime of its own.

pub mod types;
pub mod traits;
pub mod error;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use types::{
    Organization, Page, ParentRef, Permission, PermissionAttributes, PermissionDescriptor,
    Project, Role, RoleDetail, RoleSummary,
};
pub use traits::{LoadReceipt, PermissionCatalog, ResourceHierarchy, RoleDirectory, WarehouseSink};
