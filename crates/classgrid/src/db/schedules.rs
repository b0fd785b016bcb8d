use async_trait::async_trait;
use rusqlite::OptionalExtension;
use std::sync::Mutex;
use tracing::info;

use super::{lock_conn, open_connection};
use crate::error::StoreError;
use crate::store::{SavedSchedule, ScheduleStore};

/// Saved schedules in the `saved_schedules` table, sections stored as JSON.
pub struct SqliteScheduleStore {
    db: Mutex<rusqlite::Connection>,
}

impl SqliteScheduleStore {
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let conn = open_connection(db_path)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }
}

/// Raw row before the sections column is decoded
struct SavedRow {
    id: String,
    user_id: String,
    name: String,
    sections: String,
    saved_at: chrono::DateTime<chrono::Utc>,
}

impl SavedRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            sections: row.get(3)?,
            saved_at: row.get(4)?,
        })
    }

    fn decode(self) -> Result<SavedSchedule, StoreError> {
        Ok(SavedSchedule {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            sections: serde_json::from_str(&self.sections)?,
            saved_at: self.saved_at,
        })
    }
}

const SELECT_SAVED: &str = "SELECT id, user_id, name, sections, saved_at
     FROM saved_schedules
     WHERE user_id = ?
     ORDER BY saved_at DESC, rowid DESC";

#[async_trait]
impl ScheduleStore for SqliteScheduleStore {
    async fn save(&self, schedule: SavedSchedule) -> Result<(), StoreError> {
        let sections = serde_json::to_string(&schedule.sections)?;
        let db = lock_conn(&self.db);
        // REPLACE gives the row a fresh rowid, so it sorts as the newest save
        db.execute(
            "INSERT OR REPLACE INTO saved_schedules (id, user_id, name, sections, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (
                &schedule.id,
                &schedule.user_id,
                &schedule.name,
                sections,
                schedule.saved_at,
            ),
        )?;
        info!(
            user_id = %schedule.user_id,
            schedule_id = %schedule.id,
            sections = schedule.sections.len(),
            "Schedule saved"
        );
        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<SavedSchedule>, StoreError> {
        let rows = {
            let db = lock_conn(&self.db);
            let mut stmt = db.prepare(SELECT_SAVED)?;
            let rows = stmt
                .query_map([user_id], SavedRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        rows.into_iter().map(SavedRow::decode).collect()
    }

    async fn load_latest(&self, user_id: &str) -> Result<Option<SavedSchedule>, StoreError> {
        let sql = format!("{} LIMIT 1", SELECT_SAVED);
        let row = {
            let db = lock_conn(&self.db);
            let row = db
                .query_row(&sql, [user_id], SavedRow::from_row)
                .optional()?;
            row
        };
        row.map(SavedRow::decode).transpose()
    }
}
