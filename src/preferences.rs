use crate::errors::{AppError, AppResult};
use crate::models::LeadFilters;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

pub const LEAD_FILTERS_KEY: &str = "leadFilters";

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS preferences (
    key TEXT PRIMARY KEY,
    value_json TEXT NOT NULL,
    updated_at TEXT NOT NULL
);";

/// Key-value slots that outlive a session. Values are stored as JSON text.
#[derive(Debug)]
pub struct PreferenceStore {
    conn: Mutex<Connection>,
}

impl PreferenceStore {
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(AppError::from)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn get_raw(&self, key: &str) -> AppResult<Option<String>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("preferences mutex poisoned".to_string()))?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM preferences WHERE key = ?1",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(raw)
    }

    pub fn put_raw(&self, key: &str, value_json: &str) -> AppResult<()> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("preferences mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO preferences (key, value_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![key, value_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Saved filters, or defaults when the slot is empty or holds something unreadable.
    pub fn load_filters(&self) -> AppResult<LeadFilters> {
        let Some(raw) = self.get_raw(LEAD_FILTERS_KEY)? else {
            return Ok(LeadFilters::default());
        };

        match serde_json::from_str::<LeadFilters>(&raw) {
            Ok(filters) => Ok(filters),
            Err(error) => {
                tracing::warn!(error = %error, "failed to parse saved filters, using defaults");
                Ok(LeadFilters::default())
            }
        }
    }

    pub fn save_filters(&self, filters: &LeadFilters) -> AppResult<()> {
        let raw = serde_json::to_string(filters)?;
        self.put_raw(LEAD_FILTERS_KEY, &raw)
    }
}
