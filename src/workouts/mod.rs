//! Workout and template domain types.

pub mod types;

pub use types::{
    generate_id, CompletedWorkout, Exercise, TemplateExercise, TemplateSet, WorkoutSet,
    WorkoutTemplate, DEFAULT_REST_SECONDS,
};
