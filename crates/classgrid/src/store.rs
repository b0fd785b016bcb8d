//! Schedule persistence keyed by user identity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::schedule::Schedule;
use crate::types::Section;

/// One named schedule as it was saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSchedule {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub sections: Vec<Section>,
    pub saved_at: DateTime<Utc>,
}

impl SavedSchedule {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, sections: Vec<Section>) -> Self {
        Self {
            id: new_schedule_id(),
            user_id: user_id.into(),
            name: name.into(),
            sections,
            saved_at: Utc::now(),
        }
    }

    pub fn schedule(&self) -> Schedule {
        Schedule::from_sections(self.sections.clone())
    }
}

/// Random 16-character hex id.
pub fn new_schedule_id() -> String {
    let value: u64 = rand::thread_rng().gen();
    format!("{:016x}", value)
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Inserts or replaces (by id) a saved schedule.
    async fn save(&self, schedule: SavedSchedule) -> Result<(), StoreError>;

    /// Every schedule the user has saved, newest first.
    async fn list(&self, user_id: &str) -> Result<Vec<SavedSchedule>, StoreError>;

    /// The most recently saved schedule, if any.
    async fn load_latest(&self, user_id: &str) -> Result<Option<SavedSchedule>, StoreError>;

    /// Sections of the latest schedule, or none for a new user.
    async fn load_sections(&self, user_id: &str) -> Result<Vec<Section>, StoreError> {
        Ok(self
            .load_latest(user_id)
            .await?
            .map(|saved| saved.sections)
            .unwrap_or_default())
    }
}

/// Process-local store, for tests and runs without a database.
#[derive(Default)]
pub struct MemoryScheduleStore {
    // Kept in save order per user
    schedules: DashMap<String, Vec<SavedSchedule>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn save(&self, schedule: SavedSchedule) -> Result<(), StoreError> {
        let mut entry = self.schedules.entry(schedule.user_id.clone()).or_default();
        entry.retain(|existing| existing.id != schedule.id);
        entry.push(schedule);
        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<SavedSchedule>, StoreError> {
        let mut saved: Vec<SavedSchedule> = self
            .schedules
            .get(user_id)
            .map(|entry| entry.iter().rev().cloned().collect())
            .unwrap_or_default();
        // Stable, so equal timestamps keep the later save first
        saved.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(saved)
    }

    async fn load_latest(&self, user_id: &str) -> Result<Option<SavedSchedule>, StoreError> {
        Ok(self.list(user_id).await?.into_iter().next())
    }
}

/// Persists every schedule published on `schedules` under the record `id`.
///
/// Saves run one at a time; snapshots published while a save is in flight
/// collapse into the newest one. The task ends when the sender is dropped.
pub fn spawn_autosave(
    store: Arc<dyn ScheduleStore>,
    id: String,
    user_id: String,
    name: String,
    mut schedules: watch::Receiver<Arc<Schedule>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(user_id = %user_id, schedule_id = %id, "Autosave started");

        while schedules.changed().await.is_ok() {
            let snapshot = schedules.borrow_and_update().clone();
            let saved = SavedSchedule {
                id: id.clone(),
                user_id: user_id.clone(),
                name: name.clone(),
                sections: snapshot.sections().to_vec(),
                saved_at: Utc::now(),
            };

            match store.save(saved).await {
                Ok(()) => debug!(user_id = %user_id, sections = snapshot.len(), "Schedule autosaved"),
                Err(e) => warn!(user_id = %user_id, error = %e, "Autosave failed"),
            }
        }

        info!(user_id = %user_id, "Autosave stopped");
    })
}
