//! service-core: Shared infrastructure for the finance backend services.
pub mod config;
pub mod error;
pub mod observability;

pub use axum;
pub use mongodb;
pub use serde;
pub use tokio;
pub use tracing;
