//! Shared types for the role/permission index

pub mod index;
pub mod remote;

// Re-export commonly used types
pub use index::{Permission, PermissionAttributes, Role};
pub use remote::{
    Organization, Page, ParentRef, PermissionDescriptor, Project, RoleDetail, RoleSummary,
};
