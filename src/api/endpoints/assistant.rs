//! Support assistant endpoint.

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::api::endpoints::parse_id;
use crate::api::error::ApiError;
use crate::api::extract::Json;
use crate::api::types::ApiContext;
use crate::assistant::{build_patient_context, compose_prompt};
use crate::db::doses::fetch_doses_for_patient;
use crate::db::medications::fetch_medications_for_patient;
use crate::db::patients::fetch_patient;

#[derive(Deserialize)]
pub struct AskRequest {
    pub prompt: String,
    pub patient_id: String,
}

#[derive(Serialize)]
pub struct AskResponse {
    pub ai_response: String,
    pub patient_context: String,
}

/// `POST /api/assistant/ask`
///
/// Builds a context block from the patient's profile, schedules and
/// recent consumption, then forwards the question to the model. The LLM
/// call is blocking, so it runs on a blocking task.
pub async fn ask(
    State(ctx): State<ApiContext>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    if req.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt is required".into()));
    }
    let pid = parse_id(&req.patient_id, "patient")?;

    let assistant = ctx
        .assistant
        .clone()
        .ok_or_else(|| ApiError::AssistantUnavailable("assistant is not configured".into()))?;

    let patient_context = {
        let conn = ctx.lock_db()?;
        let patient = fetch_patient(&conn, &pid)?
            .ok_or_else(|| ApiError::NotFound(format!("patient {pid} not found")))?;
        let medications = fetch_medications_for_patient(&conn, &pid)?;
        let doses = fetch_doses_for_patient(&conn, &pid)?;
        build_patient_context(&patient, &medications, &doses)
    };

    let prompt = compose_prompt(&patient_context, req.prompt.trim());
    let ai_response = tokio::task::spawn_blocking(move || assistant.generate(&prompt))
        .await
        .map_err(|e| ApiError::Internal(format!("assistant task failed: {e}")))??;

    Ok(Json(AskResponse {
        ai_response,
        patient_context,
    }))
}
