//! API endpoint handlers.

pub mod adherence;
pub mod assistant;
pub mod doses;
pub mod health;
pub mod medications;
pub mod patients;

use uuid::Uuid;

use crate::api::error::ApiError;

/// Parse a path parameter as a UUID.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|e| ApiError::BadRequest(format!("Invalid {what} ID: {e}")))
}
