//! HTTP API layer.

pub mod endpoints;
pub mod error;
pub mod extract;
pub mod router;
pub mod types;

pub use router::api_router;
pub use types::ApiContext;
