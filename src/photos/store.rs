//! Domain-level photo operations over the blob store.
//!
//! Read operations never fail: an underlying error is logged and an empty
//! result returned so the gallery can always render. Writes surface their
//! errors to the caller.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::photos::encoding::{bytes_to_data_url, make_thumbnail, mime_for_path, read_image_file};
use crate::photos::types::{ImportReport, ProgressPhoto};
use crate::storage::blob::BlobStore;
use crate::storage::error::{StorageError, StorageResult};
use crate::workouts::generate_id;

/// Sole owner of the progress photo blob store.
#[derive(Clone)]
pub struct PhotoStore {
    blobs: BlobStore,
    thumbnail_edge: u32,
}

impl PhotoStore {
    /// Open the blob store at `path`, creating the object store and its
    /// indexes on first run.
    pub async fn initialize(path: PathBuf, thumbnail_edge: u32) -> StorageResult<Self> {
        let blobs = BlobStore::open(path).await?;
        Ok(Self::from_blob_store(blobs, thumbnail_edge))
    }

    /// In-memory photo store (for testing).
    pub async fn initialize_in_memory(thumbnail_edge: u32) -> StorageResult<Self> {
        let blobs = BlobStore::open_in_memory().await?;
        Ok(Self::from_blob_store(blobs, thumbnail_edge))
    }

    pub fn from_blob_store(blobs: BlobStore, thumbnail_edge: u32) -> Self {
        Self {
            blobs,
            thumbnail_edge,
        }
    }

    /// Every stored photo, unordered.
    pub async fn get_all_photos(&self) -> Vec<ProgressPhoto> {
        self.blobs.get_all().await.unwrap_or_else(|e| {
            tracing::warn!("Loading photos failed: {}", e);
            Vec::new()
        })
    }

    pub async fn get_photo(&self, id: &str) -> Option<ProgressPhoto> {
        self.blobs.get(id).await.unwrap_or_else(|e| {
            tracing::warn!("Loading photo {} failed: {}", id, e);
            None
        })
    }

    /// Photos in one category, looked up through the category index.
    pub async fn get_photos_by_category(&self, category: &str) -> Vec<ProgressPhoto> {
        self.blobs
            .get_by_category(category)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Loading '{}' photos failed: {}", category, e);
                Vec::new()
            })
    }

    /// Photos taken within `[from, to]`, oldest first.
    pub async fn get_photos_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<ProgressPhoto> {
        self.blobs
            .get_by_date_range(from, to)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Loading photos between {} and {} failed: {}", from, to, e);
                Vec::new()
            })
    }

    /// Insert a photo. Fails with `DuplicateId` if the id is taken.
    pub async fn add_photo(&self, photo: ProgressPhoto) -> StorageResult<()> {
        if photo.id.trim().is_empty() {
            return Err(StorageError::ValidationError("photo id is empty".into()));
        }
        if photo.category.trim().is_empty() {
            return Err(StorageError::ValidationError(format!(
                "photo {} has no category",
                photo.id
            )));
        }

        let id = photo.id.clone();
        self.blobs.insert(photo).await?;
        tracing::debug!("Stored photo {}", id);
        Ok(())
    }

    /// Delete a photo. Unknown ids are ignored.
    pub async fn delete_photo(&self, id: &str) -> StorageResult<()> {
        if self.blobs.delete(id).await? {
            tracing::debug!("Deleted photo {}", id);
        }
        Ok(())
    }

    pub async fn count_photos(&self) -> StorageResult<usize> {
        self.blobs.count().await
    }

    /// Read an image file, build both encodings and store it as a new photo.
    pub async fn capture_photo(
        &self,
        path: &Path,
        category: &str,
        date: DateTime<Utc>,
        notes: Option<String>,
    ) -> StorageResult<ProgressPhoto> {
        let bytes = read_image_file(path).await?;
        let full_image = bytes_to_data_url(&bytes, mime_for_path(path));

        let edge = self.thumbnail_edge;
        let thumbnail =
            tokio::task::spawn_blocking(move || make_thumbnail(&bytes, edge)).await??;

        let photo = ProgressPhoto {
            id: generate_id(),
            date,
            category: category.to_string(),
            thumbnail,
            full_image,
            notes,
        };
        self.add_photo(photo.clone()).await?;
        Ok(photo)
    }

    /// Insert photos one at a time, awaiting each insert before issuing the
    /// next so they land in the given order. Duplicates are skipped; any
    /// other failure stops the import.
    pub async fn import_photos(&self, photos: Vec<ProgressPhoto>) -> StorageResult<ImportReport> {
        let mut report = ImportReport::default();

        for photo in photos {
            match self.add_photo(photo).await {
                Ok(()) => report.imported += 1,
                Err(StorageError::DuplicateId(id)) => {
                    tracing::debug!("Skipping existing photo {}", id);
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "Imported {} photos ({} already present)",
            report.imported,
            report.skipped
        );
        Ok(report)
    }
}
