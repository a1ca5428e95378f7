//! Shared types for the API layer.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::assistant::LlmGenerate;
use crate::notify::Mailer;

/// Shared context for all API routes.
///
/// The SQLite connection is behind a mutex; handlers hold the guard only
/// for the duration of their queries. Assistant and mailer are optional:
/// the API runs without them and the affected endpoints degrade.
#[derive(Clone)]
pub struct ApiContext {
    db: Arc<Mutex<Connection>>,
    pub assistant: Option<Arc<dyn LlmGenerate>>,
    pub mailer: Option<Arc<Mailer>>,
}

impl ApiContext {
    pub fn new(
        conn: Connection,
        assistant: Option<Arc<dyn LlmGenerate>>,
        mailer: Option<Arc<Mailer>>,
    ) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            assistant,
            mailer,
        }
    }

    /// Lock the database connection for a handler's queries.
    pub fn lock_db(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn context_without_optional_services() {
        let ctx = ApiContext::new(open_memory_database().unwrap(), None, None);
        assert!(ctx.assistant.is_none());
        assert!(ctx.mailer.is_none());
        assert!(ctx.lock_db().is_ok());
    }
}
