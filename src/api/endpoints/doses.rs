//! Dose event endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::api::endpoints::parse_id;
use crate::api::error::ApiError;
use crate::api::extract::Json;
use crate::api::types::ApiContext;
use crate::db::doses::{fetch_doses_for_patient, insert_dose, DoseEvent, DoseRecord};

#[derive(Deserialize)]
pub struct RecordDoseRequest {
    pub medication_id: String,
    /// Defaults to the current time when omitted, for hardware triggers
    /// that report only "taken now".
    pub taken_at: Option<NaiveDateTime>,
}

/// `POST /api/doses`
pub async fn record(
    State(ctx): State<ApiContext>,
    Json(req): Json<RecordDoseRequest>,
) -> Result<(StatusCode, Json<DoseEvent>), ApiError> {
    let mid = parse_id(&req.medication_id, "medication")?;
    let conn = ctx.lock_db()?;
    let event = insert_dose(&conn, &mid, req.taken_at)?;
    tracing::info!(medication_id = %mid, taken_at = %event.taken_at, "dose recorded");
    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Serialize)]
pub struct DoseListResponse {
    pub doses: Vec<DoseRecord>,
}

/// `GET /api/patients/:id/doses` — newest first, joined with the
/// medication name and timing.
pub async fn list(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<DoseListResponse>, ApiError> {
    let pid = parse_id(&patient_id, "patient")?;
    let conn = ctx.lock_db()?;
    let doses = fetch_doses_for_patient(&conn, &pid)?;
    Ok(Json(DoseListResponse { doses }))
}
