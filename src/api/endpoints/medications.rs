//! Medication schedule endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;

use crate::api::endpoints::parse_id;
use crate::api::error::ApiError;
use crate::api::extract::Json;
use crate::api::types::ApiContext;
use crate::db::medications::{
    delete_medication, fetch_medications_for_patient, insert_medication, update_medication,
    Medication, MedicationUpdate, NewMedication,
};

/// `POST /api/patients/:id/medications`
pub async fn add(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
    Json(req): Json<NewMedication>,
) -> Result<(StatusCode, Json<Medication>), ApiError> {
    let pid = parse_id(&patient_id, "patient")?;
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("medication name is required".into()));
    }

    let conn = ctx.lock_db()?;
    let medication = insert_medication(&conn, &pid, &req)?;
    tracing::info!(medication_id = %medication.id, patient_id = %pid, "medication added");
    Ok((StatusCode::CREATED, Json(medication)))
}

#[derive(Serialize)]
pub struct MedicationListResponse {
    pub medications: Vec<Medication>,
}

/// `GET /api/patients/:id/medications`
pub async fn list(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<MedicationListResponse>, ApiError> {
    let pid = parse_id(&patient_id, "patient")?;
    let conn = ctx.lock_db()?;
    let medications = fetch_medications_for_patient(&conn, &pid)?;
    Ok(Json(MedicationListResponse { medications }))
}

/// `PUT /api/medications/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(medication_id): Path<String>,
    Json(req): Json<MedicationUpdate>,
) -> Result<Json<Medication>, ApiError> {
    let mid = parse_id(&medication_id, "medication")?;
    let conn = ctx.lock_db()?;
    let medication = update_medication(&conn, &mid, &req)?;
    Ok(Json(medication))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// `DELETE /api/medications/:id` — removes the schedule; recorded dose
/// events are kept.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(medication_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let mid = parse_id(&medication_id, "medication")?;
    let conn = ctx.lock_db()?;
    delete_medication(&conn, &mid)?;
    Ok(Json(DeleteResponse {
        message: "Medication deleted".into(),
    }))
}
