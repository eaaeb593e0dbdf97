//! Collaborator traits: the remote services the crawler reads from and the sink it writes to

pub mod directory;
pub mod hierarchy;
pub mod catalog;
pub mod sink;

// Re-export commonly used traits
pub use directory::RoleDirectory;
pub use hierarchy::ResourceHierarchy;
pub use catalog::PermissionCatalog;
pub use sink::{LoadReceipt, WarehouseSink};
