//! Progress photo types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workouts::generate_id;

/// A progress photo with both of its persisted encodings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPhoto {
    /// Primary key in the blob store
    pub id: String,
    /// When the photo was taken (indexed)
    pub date: DateTime<Utc>,
    /// Free-form grouping such as "front" or "side" (indexed)
    pub category: String,
    /// Small preview as a data URL
    pub thumbnail: String,
    /// Full-resolution image as a data URL
    pub full_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ProgressPhoto {
    /// Create a photo with a freshly generated id.
    pub fn new(
        date: DateTime<Utc>,
        category: impl Into<String>,
        thumbnail: String,
        full_image: String,
    ) -> Self {
        Self {
            id: generate_id(),
            date,
            category: category.into(),
            thumbnail,
            full_image,
            notes: None,
        }
    }
}

/// Outcome of a bulk photo import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// Photos skipped because their id already existed
    pub skipped: usize,
}
