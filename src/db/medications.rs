//! Medication schedule repository.
//!
//! A schedule carries the prescribed quantity (the denominator for the
//! adherence ratio) and a comma-separated list of timing-window labels
//! ("Morning", "Afternoon", "Evening"). Deleting a schedule leaves its
//! dose events behind; the scoring engine tolerates the orphans.

use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::DatabaseError;

/// Default timing when a schedule is created without one, mirroring the
/// schema default.
pub const DEFAULT_TIMING: &str = "Morning";

/// A prescribed medication schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub prescribed_qty: u32,
    pub timing: String,
    pub doctor: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Input for creating a schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMedication {
    pub name: String,
    pub prescribed_qty: u32,
    pub timing: Option<String>,
    pub doctor: Option<String>,
}

/// Partial schedule update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicationUpdate {
    pub name: Option<String>,
    pub prescribed_qty: Option<u32>,
    pub timing: Option<String>,
    pub doctor: Option<String>,
}

fn map_medication(row: &Row<'_>) -> rusqlite::Result<Medication> {
    Ok(Medication {
        id: row
            .get::<_, String>(0)?
            .parse()
            .unwrap_or_else(|_| Uuid::nil()),
        patient_id: row
            .get::<_, String>(1)?
            .parse()
            .unwrap_or_else(|_| Uuid::nil()),
        name: row.get(2)?,
        prescribed_qty: row.get(3)?,
        timing: row.get(4)?,
        doctor: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const MEDICATION_COLUMNS: &str =
    "id, patient_id, name, prescribed_qty, timing, doctor, created_at, updated_at";

/// Insert a schedule for a patient. Fails with `NotFound` when the
/// patient does not exist.
pub fn insert_medication(
    conn: &Connection,
    patient_id: &Uuid,
    new: &NewMedication,
) -> Result<Medication, DatabaseError> {
    let patient_exists: Option<String> = conn
        .query_row(
            "SELECT id FROM patients WHERE id = ?1",
            params![patient_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    if patient_exists.is_none() {
        return Err(DatabaseError::NotFound {
            entity_type: "patient".into(),
            id: patient_id.to_string(),
        });
    }

    let timing = match new.timing.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => DEFAULT_TIMING.to_string(),
    };

    let id = Uuid::new_v4();
    let now = Local::now().naive_local();
    conn.execute(
        "INSERT INTO medications (
            id, patient_id, name, prescribed_qty, timing, doctor,
            created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            id.to_string(),
            patient_id.to_string(),
            new.name.trim(),
            new.prescribed_qty,
            timing,
            new.doctor.as_deref().unwrap_or("").trim(),
            now,
        ],
    )?;

    fetch_medication(conn, &id)?.ok_or(DatabaseError::NotFound {
        entity_type: "medication".into(),
        id: id.to_string(),
    })
}

/// Fetch a single schedule by ID.
pub fn fetch_medication(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Medication>, DatabaseError> {
    let found = conn
        .query_row(
            &format!("SELECT {MEDICATION_COLUMNS} FROM medications WHERE id = ?1"),
            params![id.to_string()],
            map_medication,
        )
        .optional()?;
    Ok(found)
}

/// Fetch every schedule belonging to a patient, oldest first.
pub fn fetch_medications_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Medication>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEDICATION_COLUMNS} FROM medications
         WHERE patient_id = ?1
         ORDER BY created_at ASC, id ASC"
    ))?;
    let rows = stmt
        .query_map(params![patient_id.to_string()], map_medication)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Apply a partial update and return the fresh row.
pub fn update_medication(
    conn: &Connection,
    id: &Uuid,
    update: &MedicationUpdate,
) -> Result<Medication, DatabaseError> {
    let now = Local::now().naive_local();
    let changed = conn.execute(
        "UPDATE medications SET
            name = COALESCE(?2, name),
            prescribed_qty = COALESCE(?3, prescribed_qty),
            timing = COALESCE(?4, timing),
            doctor = COALESCE(?5, doctor),
            updated_at = ?6
         WHERE id = ?1",
        params![
            id.to_string(),
            update.name.as_deref().map(str::trim),
            update.prescribed_qty,
            update.timing.as_deref().map(str::trim),
            update.doctor.as_deref().map(str::trim),
            now,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "medication".into(),
            id: id.to_string(),
        });
    }

    fetch_medication(conn, id)?.ok_or(DatabaseError::NotFound {
        entity_type: "medication".into(),
        id: id.to_string(),
    })
}

/// Delete a schedule. Dose events referencing it are left in place.
pub fn delete_medication(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM medications WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "medication".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}
