//! LiftLog - local-first persistence core
//!
//! Durable on-device storage for a personal strength-training tracker:
//! workouts and templates in a synchronous key-value store, progress photos
//! in an asynchronous indexed blob store, and a write-through cache that
//! keeps the UI's view of workouts consistent with what was persisted.

pub mod context;
pub mod engine;
pub mod photos;
pub mod storage;
pub mod workouts;

// Re-export commonly used types
pub use context::{StorageEvent, WorkoutContext};
pub use engine::StorageEngine;
pub use photos::{PhotoStore, ProgressPhoto};
pub use storage::{DataManager, StorageConfig, StorageError};
pub use workouts::{CompletedWorkout, WorkoutTemplate};
