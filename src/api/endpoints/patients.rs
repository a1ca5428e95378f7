//! Patient endpoints: registration, login, profile and the alert flag.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::api::endpoints::parse_id;
use crate::api::error::ApiError;
use crate::api::extract::Json;
use crate::api::types::ApiContext;
use crate::auth;
use crate::db::patients::{
    self, fetch_by_caretaker_email, fetch_by_email, fetch_patient, insert_patient,
    update_patient, NewPatient, Patient, PatientUpdate,
};
use crate::notify;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub bp: String,
    #[serde(default)]
    pub regular_doctor: String,
    #[serde(default)]
    pub caretaker_email: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub patient: Patient,
}

/// `POST /api/patients/register`
pub async fn register(
    State(ctx): State<ApiContext>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "name, email and password are required".into(),
        ));
    }

    let password_hash = auth::hash_password(&req.password);
    let patient = {
        let conn = ctx.lock_db()?;
        insert_patient(
            &conn,
            &NewPatient {
                name: req.name,
                email: req.email,
                password_hash,
                description: req.description,
                bp: req.bp,
                regular_doctor: req.regular_doctor,
                caretaker_email: req.caretaker_email,
            },
        )?
    };

    // Welcome mail is best effort; registration already succeeded.
    if let Some(mailer) = &ctx.mailer {
        let body =
            notify::welcome_patient_body(&patient.name, &patient.email, &patient.caretaker_email);
        if let Err(e) = mailer
            .send(&patient.email, notify::WELCOME_SUBJECT, &body)
            .await
        {
            tracing::warn!(error = %e, "failed to send welcome email");
        }
        if !patient.caretaker_email.is_empty() {
            let body = notify::caretaker_notice_body(&patient.name, &patient.email);
            if let Err(e) = mailer
                .send(&patient.caretaker_email, notify::CARETAKER_SUBJECT, &body)
                .await
            {
                tracing::warn!(error = %e, "failed to send caretaker email");
            }
        }
    }

    tracing::info!(patient_id = %patient.id, "patient registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful".into(),
            patient,
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub role: &'static str,
    pub patient: Patient,
}

/// `POST /api/patients/login`
///
/// The email is checked first as a patient login, then as a caretaker
/// email; caretakers authenticate with their patient's password and see
/// that patient's account.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let conn = ctx.lock_db()?;

    let (role, creds) = if let Some(creds) = fetch_by_email(&conn, &req.email)? {
        ("patient", creds)
    } else if let Some(creds) = fetch_by_caretaker_email(&conn, &req.email)? {
        ("caretaker", creds)
    } else {
        return Err(ApiError::NotFound("user not found".into()));
    };

    let valid = auth::verify_password(&req.password, &creds.password_hash)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !valid {
        return Err(ApiError::Unauthorized);
    }

    Ok(Json(LoginResponse {
        role,
        patient: creds.patient,
    }))
}

/// `GET /api/patients/:id`
pub async fn profile(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&patient_id, "patient")?;
    let conn = ctx.lock_db()?;
    let patient = fetch_patient(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("patient {id} not found")))?;
    Ok(Json(patient))
}

#[derive(Deserialize, Default)]
pub struct UpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub description: Option<String>,
    pub bp: Option<String>,
    pub regular_doctor: Option<String>,
    pub caretaker_email: Option<String>,
}

/// `PUT /api/patients/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&patient_id, "patient")?;
    let password_hash = req.password.as_deref().map(auth::hash_password);

    let conn = ctx.lock_db()?;
    let patient = update_patient(
        &conn,
        &id,
        &PatientUpdate {
            name: req.name,
            email: req.email,
            password_hash,
            description: req.description,
            bp: req.bp,
            regular_doctor: req.regular_doctor,
            caretaker_email: req.caretaker_email,
        },
    )?;
    Ok(Json(patient))
}

#[derive(Serialize)]
pub struct AlertResponse {
    pub message: String,
    pub alert: bool,
}

/// `POST /api/patients/:id/alert` — raise the missed-dose alert.
pub async fn set_alert(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<AlertResponse>, ApiError> {
    let id = parse_id(&patient_id, "patient")?;
    let conn = ctx.lock_db()?;
    patients::set_alert(&conn, &id, true)?;
    Ok(Json(AlertResponse {
        message: "Alert set".into(),
        alert: true,
    }))
}

/// `DELETE /api/patients/:id/alert` — clear the missed-dose alert.
pub async fn clear_alert(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<AlertResponse>, ApiError> {
    let id = parse_id(&patient_id, "patient")?;
    let conn = ctx.lock_db()?;
    patients::set_alert(&conn, &id, false)?;
    Ok(Json(AlertResponse {
        message: "Alert cleared".into(),
        alert: false,
    }))
}
