//! Workout and template types.
//!
//! These are the shapes persisted under the `"workouts"` and `"templates"`
//! keys. Field names are camelCase on disk so data written by earlier
//! releases of the app stays readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default rest between sets, in seconds.
pub const DEFAULT_REST_SECONDS: u32 = 90;

/// Generate a collision-resistant entity id: millisecond timestamp plus a
/// random suffix.
pub fn generate_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..9])
}

/// One performed set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSet {
    /// Load in kilograms
    pub weight: f64,
    /// Repetitions actually performed
    pub reps: u32,
    /// Rest taken after the set, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_time: Option<u32>,
    /// Repetitions the template asked for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_reps: Option<u32>,
}

impl WorkoutSet {
    /// Create a set with only weight and reps.
    pub fn new(weight: f64, reps: u32) -> Self {
        Self {
            weight,
            reps,
            rest_time: None,
            target_reps: None,
        }
    }

    /// Volume of the set (weight x reps).
    pub fn volume(&self) -> f64 {
        self.weight * self.reps as f64
    }
}

/// An exercise within a completed workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub name: String,
    pub sets: Vec<WorkoutSet>,
}

impl Exercise {
    pub fn new(name: impl Into<String>, sets: Vec<WorkoutSet>) -> Self {
        Self {
            name: name.into(),
            sets,
        }
    }
}

/// A finished workout session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedWorkout {
    /// Unique identifier, fixed at creation
    pub id: String,
    /// When the workout was performed (primary sort key)
    pub date: DateTime<Utc>,
    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Template the workout was started from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    /// Exercises in the order they were performed
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

impl CompletedWorkout {
    /// Create a workout with a freshly generated id.
    pub fn new(date: DateTime<Utc>, exercises: Vec<Exercise>) -> Self {
        Self {
            id: generate_id(),
            date,
            name: None,
            template_id: None,
            exercises,
        }
    }

    /// Total volume across all exercises.
    pub fn total_volume(&self) -> f64 {
        self.exercises
            .iter()
            .flat_map(|e| e.sets.iter())
            .map(WorkoutSet::volume)
            .sum()
    }

    /// Total number of sets.
    pub fn set_count(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }

    /// Whether any exercise matches the given name (case-insensitive).
    pub fn contains_exercise(&self, name: &str) -> bool {
        self.exercises
            .iter()
            .any(|e| e.name.eq_ignore_ascii_case(name))
    }
}

/// A planned set inside a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSet {
    pub target_reps: u32,
    /// Planned rest after the set, in seconds
    #[serde(default = "default_rest")]
    pub rest_time: u32,
    /// Suggested starting load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

fn default_rest() -> u32 {
    DEFAULT_REST_SECONDS
}

impl TemplateSet {
    pub fn new(target_reps: u32, rest_time: u32) -> Self {
        Self {
            target_reps,
            rest_time,
            weight: None,
        }
    }
}

/// An exercise within a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateExercise {
    pub name: String,
    pub sets: Vec<TemplateSet>,
}

impl TemplateExercise {
    pub fn new(name: impl Into<String>, sets: Vec<TemplateSet>) -> Self {
        Self {
            name: name.into(),
            sets,
        }
    }
}

/// A reusable workout plan.
///
/// Exercise structure is replaced wholesale on edit; only `last_used` is
/// ever updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutTemplate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Last time a workout was started from this template
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exercises: Vec<TemplateExercise>,
}

impl WorkoutTemplate {
    /// Create a template with a freshly generated id.
    pub fn new(name: impl Into<String>, exercises: Vec<TemplateExercise>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            category: None,
            description: None,
            last_used: None,
            exercises,
        }
    }

    /// Start a workout from this template: one exercise per template
    /// exercise, with target reps and rest carried over and the suggested
    /// load (or zero) as the weight.
    pub fn start_workout(&self, date: DateTime<Utc>) -> CompletedWorkout {
        let exercises = self
            .exercises
            .iter()
            .map(|te| Exercise {
                name: te.name.clone(),
                sets: te
                    .sets
                    .iter()
                    .map(|ts| WorkoutSet {
                        weight: ts.weight.unwrap_or(0.0),
                        reps: ts.target_reps,
                        rest_time: Some(ts.rest_time),
                        target_reps: Some(ts.target_reps),
                    })
                    .collect(),
            })
            .collect();

        CompletedWorkout {
            id: generate_id(),
            date,
            name: Some(self.name.clone()),
            template_id: Some(self.id.clone()),
            exercises,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_id_is_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert!(a.contains('-'));
    }

    #[test]
    fn test_workout_json_uses_camel_case() {
        let mut set = WorkoutSet::new(100.0, 5);
        set.rest_time = Some(120);
        set.target_reps = Some(5);
        let mut workout = CompletedWorkout::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            vec![Exercise::new("Squat", vec![set])],
        );
        workout.template_id = Some("t1".to_string());

        let json = serde_json::to_string(&workout).unwrap();
        assert!(json.contains("\"restTime\":120"));
        assert!(json.contains("\"targetReps\":5"));
        assert!(json.contains("\"templateId\":\"t1\""));
        assert!(json.contains("2024-01-01T09:00:00Z"));
    }

    #[test]
    fn test_template_set_defaults_rest() {
        let set: TemplateSet = serde_json::from_str(r#"{"targetReps":8}"#).unwrap();
        assert_eq!(set.rest_time, DEFAULT_REST_SECONDS);
        assert_eq!(set.weight, None);
    }

    #[test]
    fn test_workout_volume_and_sets() {
        let workout = CompletedWorkout::new(
            Utc::now(),
            vec![
                Exercise::new("Bench", vec![WorkoutSet::new(80.0, 5), WorkoutSet::new(80.0, 5)]),
                Exercise::new("Row", vec![WorkoutSet::new(60.0, 10)]),
            ],
        );
        assert_eq!(workout.set_count(), 3);
        assert_eq!(workout.total_volume(), 1400.0);
        assert!(workout.contains_exercise("bench"));
        assert!(!workout.contains_exercise("Deadlift"));
    }

    #[test]
    fn test_start_workout_from_template() {
        let mut set = TemplateSet::new(8, 60);
        set.weight = Some(40.0);
        let template = WorkoutTemplate::new(
            "Push Day",
            vec![TemplateExercise::new("Press", vec![set, TemplateSet::new(10, 60)])],
        );

        let workout = template.start_workout(Utc::now());
        assert_eq!(workout.template_id.as_deref(), Some(template.id.as_str()));
        assert_eq!(workout.name.as_deref(), Some("Push Day"));
        assert_eq!(workout.exercises[0].sets.len(), 2);
        assert_eq!(workout.exercises[0].sets[0].weight, 40.0);
        assert_eq!(workout.exercises[0].sets[1].weight, 0.0);
        assert_eq!(workout.exercises[0].sets[1].target_reps, Some(10));
        assert_ne!(workout.id, template.id);
    }
}
