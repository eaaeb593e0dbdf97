//! HTTP entry point for role/permission crawls
//!
//! `GET /` runs one crawl in the configured mode and loads the result into the configured
//! warehouse sink.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{ModeKind, ServiceConfig};
pub use error::ApiError;
pub use routes::create_router;
pub use server::Server;
pub use state::AppState;
