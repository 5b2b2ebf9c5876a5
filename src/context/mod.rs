//! Cached views over the storage engine for UI consumers.

pub mod cache;
pub mod workout_context;

pub use cache::{CachePhase, WriteThroughCache};
pub use workout_context::{StorageEvent, WorkoutContext};
