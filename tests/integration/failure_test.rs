//! Storage failure scenarios: quota exhaustion and disabled storage.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use liftlog::storage::{DataManager, MemoryKeyValue, SqliteKeyValue, StorageError};
use liftlog::workouts::{CompletedWorkout, Exercise, WorkoutSet};
use liftlog::{StorageEvent, WorkoutContext};

fn workout(id: &str, day: u32) -> CompletedWorkout {
    CompletedWorkout {
        id: id.to_string(),
        date: Utc.with_ymd_and_hms(2024, 4, day, 6, 0, 0).unwrap(),
        name: None,
        template_id: None,
        exercises: vec![Exercise::new("Overhead Press", vec![WorkoutSet::new(40.0, 5); 5])],
    }
}

#[test]
fn test_quota_exhaustion_keeps_cache_intact() {
    let backend = MemoryKeyValue::new();
    let ctx = WorkoutContext::new(Arc::new(DataManager::new(backend.clone())));
    ctx.refresh_workouts().unwrap();
    ctx.add_workout(workout("a", 1)).unwrap();
    ctx.add_workout(workout("b", 2)).unwrap();
    let before = ctx.workouts();
    let mut events = ctx.subscribe();

    backend.set_quota(Some(backend.used_bytes() + 10));
    let err = ctx.add_workout(workout("c", 3)).unwrap_err();

    assert!(matches!(err, StorageError::StorageUnavailable(_)));
    assert_eq!(ctx.workouts(), before);
    assert_eq!(ctx.data_manager().get_workouts().len(), 2);
    assert!(matches!(
        events.try_recv().unwrap(),
        StorageEvent::WriteFailed { operation: "add workout", .. }
    ));
}

#[test]
fn test_sqlite_quota_exhaustion() {
    let dm = DataManager::new(SqliteKeyValue::open_in_memory(Some(600)).unwrap());
    dm.initialize_storage().unwrap();

    let mut saved = 0;
    let err = loop {
        match dm.save_workout(&workout(&format!("w{}", saved), 1 + saved % 28)) {
            Ok(()) => saved += 1,
            Err(e) => break e,
        }
    };

    assert!(err.is_unavailable());
    assert!(saved > 0);
    assert_eq!(dm.get_workouts().len(), saved as usize);
}

#[test]
fn test_disabled_storage_reads_empty_and_rejects_writes() {
    let backend = MemoryKeyValue::new();
    let dm = DataManager::new(backend.clone());
    dm.initialize_storage().unwrap();
    dm.save_workout(&workout("a", 1)).unwrap();

    backend.set_available(false);
    assert!(dm.get_workouts().is_empty());
    assert!(dm.get_templates().is_empty());
    assert!(dm.save_workout(&workout("b", 2)).unwrap_err().is_unavailable());
    assert!(dm.initialize_storage().unwrap_err().is_unavailable());

    backend.set_available(true);
    assert_eq!(dm.get_workouts().len(), 1);
}
