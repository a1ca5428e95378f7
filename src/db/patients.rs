//! Patient repository — registration, lookup, profile updates and the
//! missed-dose alert flag.
//!
//! Emails are normalized (trimmed, lowercased) on the way in so that
//! login and caretaker matching are case-insensitive.

use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::DatabaseError;

/// A patient profile as served to clients. The password hash never
/// leaves the repository except inside [`PatientCredentials`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub description: String,
    pub bp: String,
    pub regular_doctor: String,
    pub caretaker_email: String,
    pub alert: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Patient plus stored password hash, for credential verification only.
#[derive(Debug, Clone)]
pub struct PatientCredentials {
    pub patient: Patient,
    pub password_hash: String,
}

/// Input for registration.
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub description: String,
    pub bp: String,
    pub regular_doctor: String,
    pub caretaker_email: String,
}

/// Partial profile update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub description: Option<String>,
    pub bp: Option<String>,
    pub regular_doctor: Option<String>,
    pub caretaker_email: Option<String>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn map_credentials(row: &Row<'_>) -> rusqlite::Result<PatientCredentials> {
    Ok(PatientCredentials {
        patient: Patient {
            id: row
                .get::<_, String>(0)?
                .parse()
                .unwrap_or_else(|_| Uuid::nil()),
            name: row.get(1)?,
            email: row.get(2)?,
            description: row.get(4)?,
            bp: row.get(5)?,
            regular_doctor: row.get(6)?,
            caretaker_email: row.get(7)?,
            alert: row.get::<_, i64>(8)? != 0,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        },
        password_hash: row.get(3)?,
    })
}

const PATIENT_COLUMNS: &str = "id, name, email, password_hash, description, bp,
         regular_doctor, caretaker_email, alert, created_at, updated_at";

/// Insert a new patient. Fails with `DuplicateEmail` when the email is
/// already registered.
pub fn insert_patient(conn: &Connection, new: &NewPatient) -> Result<Patient, DatabaseError> {
    let email = normalize_email(&new.email);

    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM patients WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(DatabaseError::DuplicateEmail(email));
    }

    let id = Uuid::new_v4();
    let now = Local::now().naive_local();
    conn.execute(
        "INSERT INTO patients (
            id, name, email, password_hash, description, bp,
            regular_doctor, caretaker_email, alert, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9)",
        params![
            id.to_string(),
            new.name.trim(),
            email,
            new.password_hash,
            new.description,
            new.bp,
            new.regular_doctor,
            normalize_email(&new.caretaker_email),
            now,
        ],
    )?;

    fetch_patient(conn, &id)?.ok_or(DatabaseError::NotFound {
        entity_type: "patient".into(),
        id: id.to_string(),
    })
}

/// Fetch a single patient by ID.
pub fn fetch_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let found = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
            params![id.to_string()],
            map_credentials,
        )
        .optional()?;
    Ok(found.map(|c| c.patient))
}

/// Fetch a patient (with stored hash) by their own login email.
pub fn fetch_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<PatientCredentials>, DatabaseError> {
    let found = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE email = ?1"),
            params![normalize_email(email)],
            map_credentials,
        )
        .optional()?;
    Ok(found)
}

/// Fetch the patient a caretaker email is registered against.
/// The earliest-registered patient wins when several share a caretaker.
pub fn fetch_by_caretaker_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<PatientCredentials>, DatabaseError> {
    let found = conn
        .query_row(
            &format!(
                "SELECT {PATIENT_COLUMNS} FROM patients
                 WHERE caretaker_email = ?1 AND caretaker_email != ''
                 ORDER BY created_at ASC LIMIT 1"
            ),
            params![normalize_email(email)],
            map_credentials,
        )
        .optional()?;
    Ok(found)
}

/// Apply a partial profile update and return the fresh row.
pub fn update_patient(
    conn: &Connection,
    id: &Uuid,
    update: &PatientUpdate,
) -> Result<Patient, DatabaseError> {
    let current = fetch_patient(conn, id)?.ok_or(DatabaseError::NotFound {
        entity_type: "patient".into(),
        id: id.to_string(),
    })?;

    if let Some(email) = &update.email {
        let email = normalize_email(email);
        if email != current.email {
            let taken: Option<String> = conn
                .query_row(
                    "SELECT id FROM patients WHERE email = ?1 AND id != ?2",
                    params![email, id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            if taken.is_some() {
                return Err(DatabaseError::DuplicateEmail(email));
            }
        }
    }

    let now = Local::now().naive_local();
    conn.execute(
        "UPDATE patients SET
            name = COALESCE(?2, name),
            email = COALESCE(?3, email),
            password_hash = COALESCE(?4, password_hash),
            description = COALESCE(?5, description),
            bp = COALESCE(?6, bp),
            regular_doctor = COALESCE(?7, regular_doctor),
            caretaker_email = COALESCE(?8, caretaker_email),
            updated_at = ?9
         WHERE id = ?1",
        params![
            id.to_string(),
            update.name.as_deref().map(str::trim),
            update.email.as_deref().map(normalize_email),
            update.password_hash,
            update.description,
            update.bp,
            update.regular_doctor,
            update.caretaker_email.as_deref().map(normalize_email),
            now,
        ],
    )?;

    fetch_patient(conn, id)?.ok_or(DatabaseError::NotFound {
        entity_type: "patient".into(),
        id: id.to_string(),
    })
}

/// Set or clear the missed-dose alert flag.
pub fn set_alert(conn: &Connection, id: &Uuid, alert: bool) -> Result<(), DatabaseError> {
    let now = Local::now().naive_local();
    let changed = conn.execute(
        "UPDATE patients SET alert = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), alert as i64, now],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "patient".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn new_patient(name: &str, email: &str) -> NewPatient {
        NewPatient {
            name: name.into(),
            email: email.into(),
            password_hash: "hash".into(),
            description: String::new(),
            bp: String::new(),
            regular_doctor: String::new(),
            caretaker_email: String::new(),
        }
    }

    #[test]
    fn insert_and_fetch_roundtrip() {
        let conn = open_memory_database().unwrap();
        let created = insert_patient(&conn, &new_patient("Asha", "Asha@Example.COM")).unwrap();
        assert_eq!(created.email, "asha@example.com");
        assert!(!created.alert);

        let fetched = fetch_patient(&conn, &created.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Asha");
    }

    #[test]
    fn duplicate_email_rejected() {
        let conn = open_memory_database().unwrap();
        insert_patient(&conn, &new_patient("A", "same@example.com")).unwrap();
        let err = insert_patient(&conn, &new_patient("B", "SAME@example.com")).unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateEmail(_)));
    }

    #[test]
    fn lookup_by_email_returns_hash() {
        let conn = open_memory_database().unwrap();
        insert_patient(&conn, &new_patient("Asha", "asha@example.com")).unwrap();
        let creds = fetch_by_email(&conn, "ASHA@example.com").unwrap().unwrap();
        assert_eq!(creds.password_hash, "hash");
        assert_eq!(creds.patient.name, "Asha");
    }

    #[test]
    fn lookup_by_caretaker_email() {
        let conn = open_memory_database().unwrap();
        let mut new = new_patient("Asha", "asha@example.com");
        new.caretaker_email = "Care@Example.com".into();
        insert_patient(&conn, &new).unwrap();

        let creds = fetch_by_caretaker_email(&conn, "care@example.com")
            .unwrap()
            .unwrap();
        assert_eq!(creds.patient.email, "asha@example.com");

        // Blank caretaker emails never match
        insert_patient(&conn, &new_patient("Solo", "solo@example.com")).unwrap();
        assert!(fetch_by_caretaker_email(&conn, "").unwrap().is_none());
    }

    #[test]
    fn partial_update_leaves_other_fields() {
        let conn = open_memory_database().unwrap();
        let created = insert_patient(&conn, &new_patient("Asha", "asha@example.com")).unwrap();

        let updated = update_patient(
            &conn,
            &created.id,
            &PatientUpdate {
                bp: Some("120/80".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.bp, "120/80");
        assert_eq!(updated.name, "Asha");
        assert_eq!(updated.email, "asha@example.com");
    }

    #[test]
    fn update_to_taken_email_rejected() {
        let conn = open_memory_database().unwrap();
        insert_patient(&conn, &new_patient("A", "a@example.com")).unwrap();
        let b = insert_patient(&conn, &new_patient("B", "b@example.com")).unwrap();

        let err = update_patient(
            &conn,
            &b.id,
            &PatientUpdate {
                email: Some("a@example.com".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateEmail(_)));
    }

    #[test]
    fn alert_flag_set_and_clear() {
        let conn = open_memory_database().unwrap();
        let created = insert_patient(&conn, &new_patient("Asha", "asha@example.com")).unwrap();

        set_alert(&conn, &created.id, true).unwrap();
        assert!(fetch_patient(&conn, &created.id).unwrap().unwrap().alert);

        set_alert(&conn, &created.id, false).unwrap();
        assert!(!fetch_patient(&conn, &created.id).unwrap().unwrap().alert);
    }

    #[test]
    fn alert_on_missing_patient_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = set_alert(&conn, &Uuid::new_v4(), true).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
