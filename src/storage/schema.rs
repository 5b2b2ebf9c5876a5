//! Persisted layout definitions: key names, schema versions, migrations and
//! the SQL behind both SQLite-backed stores.

use serde_json::Value;

use crate::workouts::DEFAULT_REST_SECONDS;

/// Key holding the schema version marker in the key-value store.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Current version of the key-value collection layout.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Table backing [`crate::storage::kv::SqliteKeyValue`].
pub const KV_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS kv_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// One step of the collection migration chain.
pub struct Migration {
    /// Version the data is at after this step runs
    pub version: u32,
    pub description: &'static str,
    /// Rewrites the raw workouts and templates collections in place
    pub apply: fn(&mut Vec<Value>, &mut Vec<Value>),
}

/// Ordered migration chain. Steps whose `version` is above the stored marker
/// run in order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "ensure every workout carries an exercises list",
        apply: migrate_v1,
    },
    Migration {
        version: 2,
        description: "explicit template lastUsed and per-set rest time",
        apply: migrate_v2,
    },
];

fn migrate_v1(workouts: &mut Vec<Value>, _templates: &mut Vec<Value>) {
    for workout in workouts.iter_mut() {
        if let Value::Object(map) = workout {
            map.entry("exercises")
                .or_insert_with(|| Value::Array(Vec::new()));
        }
    }
}

fn migrate_v2(_workouts: &mut Vec<Value>, templates: &mut Vec<Value>) {
    for template in templates.iter_mut() {
        let Value::Object(map) = template else {
            continue;
        };
        map.entry("lastUsed").or_insert(Value::Null);

        let Some(Value::Array(exercises)) = map.get_mut("exercises") else {
            continue;
        };
        for exercise in exercises.iter_mut() {
            let Some(Value::Array(sets)) = exercise.get_mut("sets") else {
                continue;
            };
            for set in sets.iter_mut() {
                if let Value::Object(set) = set {
                    set.entry("restTime")
                        .or_insert_with(|| Value::from(DEFAULT_REST_SECONDS));
                }
            }
        }
    }
}

/// Version of the blob store layout this build creates.
pub const BLOB_STORE_VERSION: i32 = 1;

/// Version bookkeeping table of the blob store.
pub const BLOB_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS blob_store_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Additive upgrade steps for the blob store, keyed by the version they
/// produce. Steps may only create; never drop an index or table an earlier
/// version created.
pub const BLOB_UPGRADES: &[(i32, &str)] = &[(
    1,
    r#"
CREATE TABLE IF NOT EXISTS progress_photos (
    id TEXT PRIMARY KEY NOT NULL,
    date TEXT NOT NULL,
    category TEXT NOT NULL,
    thumbnail TEXT NOT NULL,
    full_image TEXT NOT NULL,
    notes TEXT
);

CREATE INDEX IF NOT EXISTS idx_photos_category ON progress_photos(category);
CREATE INDEX IF NOT EXISTS idx_photos_date ON progress_photos(date);
"#,
)];
