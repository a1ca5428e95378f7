//! Dose event repository.
//!
//! One row per recorded medication-taking event. Rows are append-only:
//! there is no update path, and medication deletion leaves events behind.
//! Insertion does not require the medication to still exist — the
//! monitoring trigger may race a caretaker deleting a schedule, and the
//! scoring engine skips orphans.

use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::DatabaseError;

/// A bare dose event row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseEvent {
    pub id: Uuid,
    pub medication_id: Uuid,
    pub taken_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

/// A dose event joined with its medication, as consumed by the scoring
/// engine and the consumption views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseRecord {
    pub id: Uuid,
    pub medication_id: Uuid,
    pub medication_name: String,
    pub timing: String,
    pub prescribed_qty: u32,
    pub taken_at: NaiveDateTime,
}

fn map_dose_event(row: &Row<'_>) -> rusqlite::Result<DoseEvent> {
    Ok(DoseEvent {
        id: row
            .get::<_, String>(0)?
            .parse()
            .unwrap_or_else(|_| Uuid::nil()),
        medication_id: row
            .get::<_, String>(1)?
            .parse()
            .unwrap_or_else(|_| Uuid::nil()),
        taken_at: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Record a dose. `taken_at` defaults to the current local time when the
/// caller does not supply one — this is the only place "now" enters the
/// adherence data path.
pub fn insert_dose(
    conn: &Connection,
    medication_id: &Uuid,
    taken_at: Option<NaiveDateTime>,
) -> Result<DoseEvent, DatabaseError> {
    let id = Uuid::new_v4();
    let now = Local::now().naive_local();
    let taken_at = taken_at.unwrap_or(now);

    conn.execute(
        "INSERT INTO dose_events (id, medication_id, taken_at, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![id.to_string(), medication_id.to_string(), taken_at, now],
    )?;

    let created = conn
        .query_row(
            "SELECT id, medication_id, taken_at, created_at
             FROM dose_events WHERE id = ?1",
            params![id.to_string()],
            map_dose_event,
        )
        .optional()?;
    created.ok_or(DatabaseError::NotFound {
        entity_type: "dose_event".into(),
        id: id.to_string(),
    })
}

/// Fetch every dose event for a patient's medications, joined with the
/// medication name/timing/quantity, newest first. Events whose medication
/// has been deleted are not part of any patient's view and are excluded
/// by the join.
pub fn fetch_doses_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<DoseRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.medication_id, m.name, m.timing, m.prescribed_qty, d.taken_at
         FROM dose_events d
         INNER JOIN medications m ON m.id = d.medication_id
         WHERE m.patient_id = ?1
         ORDER BY d.taken_at DESC, d.id ASC",
    )?;
    let rows = stmt
        .query_map(params![patient_id.to_string()], |row| {
            Ok(DoseRecord {
                id: row
                    .get::<_, String>(0)?
                    .parse()
                    .unwrap_or_else(|_| Uuid::nil()),
                medication_id: row
                    .get::<_, String>(1)?
                    .parse()
                    .unwrap_or_else(|_| Uuid::nil()),
                medication_name: row.get(2)?,
                timing: row.get(3)?,
                prescribed_qty: row.get(4)?,
                taken_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
