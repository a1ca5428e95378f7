pub mod doses;
pub mod medications;
pub mod patients;
pub mod sqlite;

pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },
}
