//! HTTP server for the Contract Version Registry.
//!
//! Exposes deployment submission and history queries over JSON. All
//! versioning decisions are made by [`cvr_core::DeploymentService`]; this
//! crate only maps requests onto it and service errors onto status codes.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ApiError, ServerError, ServerResult};
pub use handler::AppState;
pub use server::CvrServer;
