//! Workout ordering and round-trip scenarios across the data manager and
//! the workout context.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use liftlog::storage::{DataManager, MemoryKeyValue, SqliteKeyValue};
use liftlog::workouts::{CompletedWorkout, Exercise, WorkoutSet};
use liftlog::WorkoutContext;

fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn workout(id: &str, when: DateTime<Utc>) -> CompletedWorkout {
    CompletedWorkout {
        id: id.to_string(),
        date: when,
        name: Some(format!("Session {}", id)),
        template_id: None,
        exercises: vec![
            Exercise::new("Bench Press", vec![WorkoutSet::new(70.0, 8), WorkoutSet::new(72.5, 6)]),
            Exercise::new("Row", vec![WorkoutSet::new(50.0, 12)]),
        ],
    }
}

#[test]
fn test_descending_order_with_stable_ties() {
    let dm = DataManager::new(MemoryKeyValue::new());
    dm.initialize_storage().unwrap();

    dm.save_workout(&workout("first", date(2024, 1, 1))).unwrap();
    dm.save_workout(&workout("tie-a", date(2024, 1, 3))).unwrap();
    dm.save_workout(&workout("tie-b", date(2024, 1, 3))).unwrap();

    let ids: Vec<_> = dm.get_workouts_sorted().into_iter().map(|w| w.id).collect();
    assert_eq!(ids, vec!["tie-a", "tie-b", "first"]);
}

#[test]
fn test_roundtrip_through_sqlite_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kv.db");
    let mut w = workout("persisted", date(2024, 5, 20));
    w.exercises[0].sets[0].rest_time = Some(150);
    w.exercises[0].sets[0].target_reps = Some(8);

    {
        let dm = DataManager::new(SqliteKeyValue::open(&path, None).unwrap());
        dm.initialize_storage().unwrap();
        dm.save_workout(&w).unwrap();
    }

    let dm = DataManager::new(SqliteKeyValue::open(&path, None).unwrap());
    dm.initialize_storage().unwrap();
    assert_eq!(dm.get_workouts(), vec![w]);
}

#[test]
fn test_repeated_initialization_keeps_data() {
    let backend = MemoryKeyValue::new();
    let dm = DataManager::new(backend.clone());
    dm.initialize_storage().unwrap();
    dm.save_workout(&workout("a", date(2024, 2, 2))).unwrap();
    let once = dm.get_workouts();

    for _ in 0..5 {
        DataManager::new(backend.clone()).initialize_storage().unwrap();
    }
    assert_eq!(dm.get_workouts(), once);
}

#[test]
fn test_context_cache_agrees_with_store() {
    let dm = Arc::new(DataManager::new(MemoryKeyValue::new()));
    let ctx = WorkoutContext::new(Arc::clone(&dm));
    ctx.refresh_workouts().unwrap();

    ctx.add_workout(workout("jan1", date(2024, 1, 1))).unwrap();
    ctx.add_workout(workout("jan3", date(2024, 1, 3))).unwrap();
    ctx.add_workout(workout("jan3b", date(2024, 1, 3))).unwrap();
    ctx.delete_workout("jan1").unwrap();

    assert_eq!(ctx.workouts(), dm.get_workouts_sorted());
}
