//! Workout context: the cached view of workouts handed to the UI, plus the
//! template callbacks the UI drives.
//!
//! Writes go through the data manager first; the cache only changes after
//! the store accepts the write. Failed writes are also published as
//! [`StorageEvent::WriteFailed`] so the UI can show a non-blocking notice.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::context::cache::{CachePhase, WriteThroughCache};
use crate::storage::data_manager::{sort_by_date_desc, DataManager};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::kv::KeyValueBackend;
use crate::workouts::types::{CompletedWorkout, WorkoutTemplate};

/// Notifications for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageEvent {
    /// The workout cache was reloaded from storage.
    Refreshed { count: usize },
    /// A write was rejected; the cache was left as it was.
    WriteFailed {
        operation: &'static str,
        message: String,
    },
}

/// Insert keeping date-descending order, after any workouts with the same
/// date, which is where a reload would put it.
fn insert_sorted(workouts: &mut Vec<CompletedWorkout>, workout: CompletedWorkout) {
    let pos = workouts
        .iter()
        .position(|w| w.date < workout.date)
        .unwrap_or(workouts.len());
    workouts.insert(pos, workout);
}

pub struct WorkoutContext<B> {
    data: Arc<DataManager<B>>,
    cache: WriteThroughCache<CompletedWorkout>,
    event_tx: broadcast::Sender<StorageEvent>,
}

impl<B: KeyValueBackend> WorkoutContext<B> {
    pub fn new(data: Arc<DataManager<B>>) -> Self {
        let (tx, _) = broadcast::channel(64);

        Self {
            data,
            cache: WriteThroughCache::new(),
            event_tx: tx,
        }
    }

    /// Subscribe to storage events.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.event_tx.subscribe()
    }

    pub fn data_manager(&self) -> &Arc<DataManager<B>> {
        &self.data
    }

    pub fn phase(&self) -> CachePhase {
        self.cache.phase()
    }

    /// Cached workouts, most recent first. May be stale if another writer
    /// touched the store; call [`Self::refresh_workouts`] for a fresh copy.
    pub fn workouts(&self) -> Vec<CompletedWorkout> {
        self.cache.snapshot()
    }

    /// Initialize storage and reload the cache from it.
    ///
    /// A failed initialization is reported but does not stop the reload,
    /// which degrades to whatever can be read.
    pub fn refresh_workouts(&self) -> StorageResult<usize> {
        let count = self.cache.refresh(|| {
            if let Err(e) = self.data.initialize_storage() {
                self.report("initialize storage", &e);
            }
            let mut workouts = self.data.get_workouts();
            sort_by_date_desc(&mut workouts);
            Ok(workouts)
        })?;

        tracing::debug!("Workout cache refreshed with {} entries", count);
        let _ = self.event_tx.send(StorageEvent::Refreshed { count });
        Ok(count)
    }

    /// Persist a new workout, then add it to the cache.
    pub fn add_workout(&self, workout: CompletedWorkout) -> StorageResult<()> {
        self.cache
            .commit(
                || self.data.save_workout(&workout),
                |items, _| insert_sorted(items, workout.clone()),
            )
            .inspect_err(|e| self.report("add workout", e))
    }

    /// Replace a stored workout, then swap it in the cache.
    pub fn update_workout(&self, workout: CompletedWorkout) -> StorageResult<()> {
        self.cache
            .commit(
                || self.data.update_workout(&workout),
                |items, _| {
                    items.retain(|w| w.id != workout.id);
                    insert_sorted(items, workout.clone());
                },
            )
            .inspect_err(|e| self.report("update workout", e))
    }

    /// Delete a workout, then drop it from the cache. Unknown ids are a
    /// no-op.
    pub fn delete_workout(&self, id: &str) -> StorageResult<()> {
        self.cache
            .commit(
                || self.data.delete_workout(id),
                |items, _| items.retain(|w| w.id != id),
            )
            .inspect_err(|e| self.report("delete workout", e))
    }

    // ========== Template callbacks ==========

    pub fn get_templates(&self) -> Vec<WorkoutTemplate> {
        self.data.get_templates()
    }

    pub fn save_template(&self, template: &WorkoutTemplate) -> StorageResult<()> {
        self.data
            .save_template(template)
            .inspect_err(|e| self.report("save template", e))
    }

    pub fn delete_template(&self, id: &str) -> StorageResult<()> {
        self.data
            .delete_template(id)
            .inspect_err(|e| self.report("delete template", e))
    }

    /// Mark a template as used now and return it, ready to start a workout.
    pub fn select_template(&self, id: &str) -> StorageResult<WorkoutTemplate> {
        self.data
            .mark_template_used(id, Utc::now())
            .inspect_err(|e| self.report("select template", e))
    }

    fn report(&self, operation: &'static str, error: &StorageError) {
        tracing::warn!("Failed to {}: {}", operation, error);
        let _ = self.event_tx.send(StorageEvent::WriteFailed {
            operation,
            message: error.to_string(),
        });
    }
}
