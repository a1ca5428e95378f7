//! Adherence report endpoint.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::adherence::{score, DoseSnapshot, ScheduleSnapshot, TimingWindow};
use crate::adherence::{AdherenceSummary, ClassifiedEvent};
use crate::api::endpoints::parse_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::doses::fetch_doses_for_patient;
use crate::db::medications::fetch_medications_for_patient;

#[derive(Serialize)]
pub struct ExpectedHour {
    pub window: TimingWindow,
    pub hour: f64,
}

#[derive(Serialize)]
pub struct AdherenceResponse {
    pub summaries: Vec<AdherenceSummary>,
    pub events: Vec<ClassifiedEvent>,
    /// Canonical window hours, for drawing reference lines on the chart.
    pub expected_hours: Vec<ExpectedHour>,
}

/// `GET /api/patients/:id/adherence`
///
/// Scores the patient's current schedules against their full dose
/// history. A patient with no recorded doses gets an empty report.
pub async fn report(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<AdherenceResponse>, ApiError> {
    let pid = parse_id(&patient_id, "patient")?;

    let (schedules, doses) = {
        let conn = ctx.lock_db()?;
        let schedules: Vec<ScheduleSnapshot> = fetch_medications_for_patient(&conn, &pid)?
            .into_iter()
            .map(|m| ScheduleSnapshot {
                id: m.id,
                name: m.name,
                prescribed_qty: m.prescribed_qty,
                timing: m.timing,
            })
            .collect();
        let doses: Vec<DoseSnapshot> = fetch_doses_for_patient(&conn, &pid)?
            .into_iter()
            .map(|d| DoseSnapshot {
                medication_id: d.medication_id,
                taken_at: d.taken_at,
            })
            .collect();
        (schedules, doses)
    };

    let report = score(&schedules, &doses);
    let expected_hours = TimingWindow::ALL
        .iter()
        .map(|&window| ExpectedHour {
            window,
            hour: window.expected_hour(),
        })
        .collect();

    Ok(Json(AdherenceResponse {
        summaries: report.summaries,
        events: report.events,
        expected_hours,
    }))
}
