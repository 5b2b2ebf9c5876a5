//! Storage module: key-value and blob stores, the data manager and config.

pub mod blob;
pub mod config;
pub mod data_manager;
pub mod error;
pub mod kv;
pub mod schema;

pub use blob::BlobStore;
pub use config::{load_config, load_config_from, save_config, ConfigError, StorageConfig};
pub use data_manager::{sort_by_date_desc, DataManager, WorkoutQuery};
pub use error::{StorageError, StorageResult};
pub use kv::{Collection, KeyValueBackend, KeyValueStore, MemoryKeyValue, SqliteKeyValue};
