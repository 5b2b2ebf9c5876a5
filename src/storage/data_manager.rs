//! Domain storage engine for workouts and templates.
//!
//! Every mutation is a full read-modify-write of one collection performed
//! under a single lock acquisition, with no await point inside. Callers may
//! wrap these calls in async code, but the operations themselves stay
//! synchronous so two mutations can never interleave.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::kv::{Collection, KeyValueBackend, KeyValueStore};
use crate::storage::schema::{CURRENT_SCHEMA_VERSION, MIGRATIONS, SCHEMA_VERSION_KEY};
use crate::workouts::types::{CompletedWorkout, WorkoutTemplate};

/// Filter for [`DataManager::query_workouts`].
#[derive(Debug, Clone, Default)]
pub struct WorkoutQuery {
    /// Inclusive lower bound on `date`
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `date`
    pub until: Option<DateTime<Utc>>,
    /// Only workouts containing this exercise (case-insensitive)
    pub exercise: Option<String>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl WorkoutQuery {
    pub fn matches(&self, workout: &CompletedWorkout) -> bool {
        if self.since.is_some_and(|since| workout.date < since) {
            return false;
        }
        if self.until.is_some_and(|until| workout.date > until) {
            return false;
        }
        match &self.exercise {
            Some(name) => workout.contains_exercise(name),
            None => true,
        }
    }
}

/// Sort workouts most recent first.
///
/// The sort is stable: workouts sharing a timestamp keep their insertion
/// order.
pub fn sort_by_date_desc(workouts: &mut [CompletedWorkout]) {
    workouts.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Reject malformed workouts before any write.
pub fn validate_workout(workout: &CompletedWorkout) -> StorageResult<()> {
    if workout.id.trim().is_empty() {
        return Err(StorageError::ValidationError("workout id is empty".into()));
    }
    for exercise in &workout.exercises {
        if exercise.name.trim().is_empty() {
            return Err(StorageError::ValidationError(format!(
                "workout {} has an exercise without a name",
                workout.id
            )));
        }
        if exercise
            .sets
            .iter()
            .any(|s| !s.weight.is_finite() || s.weight < 0.0)
        {
            return Err(StorageError::ValidationError(format!(
                "workout {} has an invalid weight in '{}'",
                workout.id, exercise.name
            )));
        }
    }
    Ok(())
}

/// Reject malformed templates before any write.
pub fn validate_template(template: &WorkoutTemplate) -> StorageResult<()> {
    if template.id.trim().is_empty() {
        return Err(StorageError::ValidationError("template id is empty".into()));
    }
    if template.name.trim().is_empty() {
        return Err(StorageError::ValidationError(format!(
            "template {} has no name",
            template.id
        )));
    }
    for exercise in &template.exercises {
        if exercise.name.trim().is_empty() {
            return Err(StorageError::ValidationError(format!(
                "template {} has an exercise without a name",
                template.id
            )));
        }
        if exercise
            .sets
            .iter()
            .filter_map(|s| s.weight)
            .any(|w| !w.is_finite() || w < 0.0)
        {
            return Err(StorageError::ValidationError(format!(
                "template {} has an invalid weight in '{}'",
                template.id, exercise.name
            )));
        }
    }
    Ok(())
}

/// Owner of the persisted workouts and templates collections.
pub struct DataManager<B> {
    store: Mutex<KeyValueStore<B>>,
}

impl<B: KeyValueBackend> DataManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            store: Mutex::new(KeyValueStore::new(backend)),
        }
    }

    fn store(&self) -> MutexGuard<'_, KeyValueStore<B>> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ensure both collections exist and bring them to the current schema
    /// version.
    pub fn initialize_storage(&self) -> StorageResult<()> {
        let mut store = self.store();

        let stored = read_schema_version(&store)?;
        if stored > CURRENT_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchema {
                found: stored,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }

        store.initialize_storage()?;

        if stored < CURRENT_SCHEMA_VERSION {
            run_migrations(&mut store, stored)?;
            store.set_raw(SCHEMA_VERSION_KEY, &CURRENT_SCHEMA_VERSION.to_string())?;
            tracing::info!(
                "Collections migrated from version {} to {}",
                stored,
                CURRENT_SCHEMA_VERSION
            );
        }

        Ok(())
    }

    /// Stored schema version (0 when no marker has been written).
    pub fn schema_version(&self) -> StorageResult<u32> {
        read_schema_version(&self.store())
    }

    // ========== Workouts ==========

    /// All workouts in insertion order.
    pub fn get_workouts(&self) -> Vec<CompletedWorkout> {
        self.store().get_collection(Collection::Workouts)
    }

    /// All workouts, most recent first.
    pub fn get_workouts_sorted(&self) -> Vec<CompletedWorkout> {
        let mut workouts = self.get_workouts();
        sort_by_date_desc(&mut workouts);
        workouts
    }

    pub fn get_workout(&self, id: &str) -> Option<CompletedWorkout> {
        self.get_workouts().into_iter().find(|w| w.id == id)
    }

    /// Workouts matching the query, most recent first.
    pub fn query_workouts(&self, query: &WorkoutQuery) -> Vec<CompletedWorkout> {
        let mut workouts: Vec<CompletedWorkout> = self
            .get_workouts()
            .into_iter()
            .filter(|w| query.matches(w))
            .collect();
        sort_by_date_desc(&mut workouts);
        if let Some(limit) = query.limit {
            workouts.truncate(limit);
        }
        workouts
    }

    /// Append a new workout. Fails if the id is already taken.
    pub fn save_workout(&self, workout: &CompletedWorkout) -> StorageResult<()> {
        validate_workout(workout)?;

        let mut store = self.store();
        let mut workouts: Vec<CompletedWorkout> = store.try_get_collection(Collection::Workouts)?;
        if workouts.iter().any(|w| w.id == workout.id) {
            return Err(StorageError::ValidationError(format!(
                "workout {} already exists",
                workout.id
            )));
        }

        workouts.push(workout.clone());
        store.set_collection(Collection::Workouts, &workouts)?;
        tracing::debug!("Saved workout {} ({} total)", workout.id, workouts.len());
        Ok(())
    }

    /// Replace an existing workout wholesale, keeping its position.
    pub fn update_workout(&self, workout: &CompletedWorkout) -> StorageResult<()> {
        validate_workout(workout)?;

        let mut store = self.store();
        let mut workouts: Vec<CompletedWorkout> = store.try_get_collection(Collection::Workouts)?;
        let slot = workouts
            .iter_mut()
            .find(|w| w.id == workout.id)
            .ok_or_else(|| StorageError::NotFound(format!("Workout {}", workout.id)))?;
        *slot = workout.clone();

        store.set_collection(Collection::Workouts, &workouts)?;
        tracing::debug!("Updated workout {}", workout.id);
        Ok(())
    }

    /// Remove a workout. Unknown ids are ignored.
    pub fn delete_workout(&self, id: &str) -> StorageResult<()> {
        let mut store = self.store();
        let mut workouts: Vec<CompletedWorkout> = store.try_get_collection(Collection::Workouts)?;
        let before = workouts.len();
        workouts.retain(|w| w.id != id);
        if workouts.len() == before {
            return Ok(());
        }

        store.set_collection(Collection::Workouts, &workouts)?;
        tracing::debug!("Deleted workout {}", id);
        Ok(())
    }

    // ========== Templates ==========

    /// All templates in insertion order.
    pub fn get_templates(&self) -> Vec<WorkoutTemplate> {
        self.store().get_collection(Collection::Templates)
    }

    pub fn get_template(&self, id: &str) -> Option<WorkoutTemplate> {
        self.get_templates().into_iter().find(|t| t.id == id)
    }

    /// Templates ordered by `last_used`, most recent first; never-used
    /// templates come last in insertion order.
    pub fn get_templates_by_recent_use(&self) -> Vec<WorkoutTemplate> {
        let mut templates = self.get_templates();
        templates.sort_by(|a, b| b.last_used.cmp(&a.last_used));
        templates
    }

    pub fn templates_by_category(&self, category: &str) -> Vec<WorkoutTemplate> {
        self.get_templates()
            .into_iter()
            .filter(|t| t.category.as_deref() == Some(category))
            .collect()
    }

    /// Insert a template, or replace the one with the same id in place.
    pub fn save_template(&self, template: &WorkoutTemplate) -> StorageResult<()> {
        validate_template(template)?;

        let mut store = self.store();
        let mut templates: Vec<WorkoutTemplate> =
            store.try_get_collection(Collection::Templates)?;
        match templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template.clone(),
            None => templates.push(template.clone()),
        }

        store.set_collection(Collection::Templates, &templates)?;
        tracing::debug!("Saved template {}", template.id);
        Ok(())
    }

    /// Remove a template. Unknown ids are ignored; workouts started from the
    /// template are left untouched.
    pub fn delete_template(&self, id: &str) -> StorageResult<()> {
        let mut store = self.store();
        let mut templates: Vec<WorkoutTemplate> =
            store.try_get_collection(Collection::Templates)?;
        let before = templates.len();
        templates.retain(|t| t.id != id);
        if templates.len() == before {
            return Ok(());
        }

        store.set_collection(Collection::Templates, &templates)?;
        tracing::debug!("Deleted template {}", id);
        Ok(())
    }

    /// Stamp `last_used` on a template and return the updated copy.
    pub fn mark_template_used(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<WorkoutTemplate> {
        let mut store = self.store();
        let mut templates: Vec<WorkoutTemplate> =
            store.try_get_collection(Collection::Templates)?;
        let template = templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StorageError::NotFound(format!("Template {}", id)))?;
        template.last_used = Some(at);
        let updated = template.clone();

        store.set_collection(Collection::Templates, &templates)?;
        Ok(updated)
    }
}

fn read_schema_version<B: KeyValueBackend>(store: &KeyValueStore<B>) -> StorageResult<u32> {
    match store.get_raw(SCHEMA_VERSION_KEY)? {
        Some(raw) => raw.trim().parse().map_err(|_| {
            StorageError::Serialization(format!("invalid schema version marker '{}'", raw))
        }),
        None => Ok(0),
    }
}

/// Apply every migration above `from`. Steps must be idempotent: a failure
/// between the collection writes and the marker write reruns them.
fn run_migrations<B: KeyValueBackend>(
    store: &mut KeyValueStore<B>,
    from: u32,
) -> StorageResult<()> {
    let mut workouts = store.get_raw_collection(Collection::Workouts)?;
    let mut templates = store.get_raw_collection(Collection::Templates)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > from) {
        (migration.apply)(&mut workouts, &mut templates);
        tracing::info!(
            "Applied collection migration v{}: {}",
            migration.version,
            migration.description
        );
    }

    store.set_collection(Collection::Workouts, &workouts)?;
    store.set_collection(Collection::Templates, &templates)?;
    Ok(())
}
