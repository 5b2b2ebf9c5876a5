//! Storage engine: the single owner of every local store.
//!
//! Built once at startup and handed to consumers by reference; there are no
//! global store handles.

use std::sync::Arc;

use crate::context::WorkoutContext;
use crate::photos::PhotoStore;
use crate::storage::config::StorageConfig;
use crate::storage::data_manager::DataManager;
use crate::storage::error::StorageResult;
use crate::storage::kv::SqliteKeyValue;

pub struct StorageEngine {
    data: Arc<DataManager<SqliteKeyValue>>,
    photos: PhotoStore,
    workouts: WorkoutContext<SqliteKeyValue>,
}

impl StorageEngine {
    /// Open both stores under the configured data directory and load the
    /// workout cache.
    pub async fn open(config: &StorageConfig) -> StorageResult<Self> {
        let backend = SqliteKeyValue::open(&config.kv_path(), config.kv_quota())?;
        let photos = PhotoStore::initialize(config.photo_path(), config.thumbnail_max_edge).await?;

        tracing::info!("Storage opened in {}", config.data_dir.display());
        Self::assemble(backend, photos)
    }

    /// Engine backed entirely by memory (for testing).
    pub async fn open_in_memory() -> StorageResult<Self> {
        let defaults = StorageConfig::default();
        let backend = SqliteKeyValue::open_in_memory(defaults.kv_quota())?;
        let photos = PhotoStore::initialize_in_memory(defaults.thumbnail_max_edge).await?;
        Self::assemble(backend, photos)
    }

    fn assemble(backend: SqliteKeyValue, photos: PhotoStore) -> StorageResult<Self> {
        let data = Arc::new(DataManager::new(backend));
        data.initialize_storage()?;

        let workouts = WorkoutContext::new(Arc::clone(&data));
        workouts.refresh_workouts()?;

        Ok(Self {
            data,
            photos,
            workouts,
        })
    }

    pub fn data(&self) -> &Arc<DataManager<SqliteKeyValue>> {
        &self.data
    }

    pub fn photos(&self) -> &PhotoStore {
        &self.photos
    }

    pub fn workouts(&self) -> &WorkoutContext<SqliteKeyValue> {
        &self.workouts
    }
}
