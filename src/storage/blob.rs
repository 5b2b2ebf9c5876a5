//! Asynchronous indexed blob store for progress photos.
//!
//! Backed by SQLite and driven through `spawn_blocking`, so every call is a
//! suspension point for the caller. Each write runs in its own transaction.
//! Two writes issued without awaiting the first are not ordered; callers
//! that need ordering await each before issuing the next.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::photos::types::ProgressPhoto;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::schema::{BLOB_STORE_VERSION, BLOB_UPGRADES, BLOB_VERSION_TABLE};

const PHOTO_COLUMNS: &str = "id, date, category, thumbnail, full_image, notes";

/// Handle to the photo object store. Clones share one connection.
#[derive(Clone)]
pub struct BlobStore {
    conn: Arc<Mutex<Connection>>,
}

impl BlobStore {
    /// Open or create the store at the given path, applying any pending
    /// additive upgrades.
    pub async fn open(path: PathBuf) -> StorageResult<Self> {
        let conn = tokio::task::spawn_blocking(move || -> StorageResult<Connection> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::StorageUnavailable(e.to_string()))?;
            }
            let mut conn = Connection::open(&path)?;
            upgrade(&mut conn)?;
            Ok(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory store (for testing).
    pub async fn open_in_memory() -> StorageResult<Self> {
        let conn = tokio::task::spawn_blocking(|| -> StorageResult<Connection> {
            let mut conn = Connection::open_in_memory()?;
            upgrade(&mut conn)?;
            Ok(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut guard)
        })
        .await?
    }

    /// Layout version currently applied.
    pub async fn version(&self) -> StorageResult<i32> {
        self.run(|conn| stored_version(conn)).await
    }

    /// Insert a new photo. The primary key is enforced at insert.
    pub async fn insert(&self, photo: ProgressPhoto) -> StorageResult<()> {
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let result = tx.execute(
                "INSERT INTO progress_photos (id, date, category, thumbnail, full_image, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    photo.id,
                    format_date(&photo.date),
                    photo.category,
                    photo.thumbnail,
                    photo.full_image,
                    photo.notes,
                ],
            );

            match result.map_err(StorageError::from) {
                Ok(_) => {}
                Err(StorageError::DuplicateId(_)) => {
                    return Err(StorageError::DuplicateId(photo.id));
                }
                Err(e) => return Err(e),
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get(&self, id: &str) -> StorageResult<Option<ProgressPhoto>> {
        let id = id.to_string();
        self.run(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM progress_photos WHERE id = ?1", PHOTO_COLUMNS),
                    params![id],
                    PhotoRow::from_row,
                )
                .optional()?;
            row.map(PhotoRow::into_photo).transpose()
        })
        .await
    }

    /// Every photo, in no guaranteed order.
    pub async fn get_all(&self) -> StorageResult<Vec<ProgressPhoto>> {
        self.run(|conn| {
            query_photos(
                conn,
                &format!("SELECT {} FROM progress_photos", PHOTO_COLUMNS),
                params![],
            )
        })
        .await
    }

    /// Photos with the given category, looked up through the category index.
    pub async fn get_by_category(&self, category: &str) -> StorageResult<Vec<ProgressPhoto>> {
        let category = category.to_string();
        self.run(move |conn| {
            query_photos(
                conn,
                &format!(
                    "SELECT {} FROM progress_photos INDEXED BY idx_photos_category
                     WHERE category = ?1",
                    PHOTO_COLUMNS
                ),
                params![category],
            )
        })
        .await
    }

    /// Photos taken within `[from, to]`, oldest first, through the date index.
    pub async fn get_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StorageResult<Vec<ProgressPhoto>> {
        let (from, to) = (format_date(&from), format_date(&to));
        self.run(move |conn| {
            query_photos(
                conn,
                &format!(
                    "SELECT {} FROM progress_photos INDEXED BY idx_photos_date
                     WHERE date >= ?1 AND date <= ?2 ORDER BY date",
                    PHOTO_COLUMNS
                ),
                params![from, to],
            )
        })
        .await
    }

    /// Delete by id. Returns whether a photo was removed.
    pub async fn delete(&self, id: &str) -> StorageResult<bool> {
        let id = id.to_string();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM progress_photos WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
    }

    pub async fn count(&self) -> StorageResult<usize> {
        self.run(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM progress_photos", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}

/// Fixed-width UTC timestamp at full precision, so string order in the
/// date index matches chronological order and reads return the exact date.
fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn stored_version(conn: &Connection) -> StorageResult<i32> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM blob_store_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Bring the store up to [`BLOB_STORE_VERSION`]. Each step commits with its
/// version record.
fn upgrade(conn: &mut Connection) -> StorageResult<()> {
    conn.execute_batch(BLOB_VERSION_TABLE)?;
    let current = stored_version(conn)?;

    if current > BLOB_STORE_VERSION {
        return Err(StorageError::UnsupportedSchema {
            found: current as u32,
            supported: BLOB_STORE_VERSION as u32,
        });
    }

    for (version, sql) in BLOB_UPGRADES.iter().filter(|(v, _)| *v > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO blob_store_version (version, applied_at) VALUES (?1, ?2)",
            params![version, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        tracing::info!("Photo store upgraded to version {}", version);
    }

    Ok(())
}

fn query_photos(
    conn: &Connection,
    sql: &str,
    args: &[&dyn rusqlite::ToSql],
) -> StorageResult<Vec<ProgressPhoto>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, PhotoRow::from_row)?;

    let mut photos = Vec::new();
    for row in rows {
        photos.push(row?.into_photo()?);
    }
    Ok(photos)
}

/// Raw photo row before the date is parsed.
struct PhotoRow {
    id: String,
    date: String,
    category: String,
    thumbnail: String,
    full_image: String,
    notes: Option<String>,
}

impl PhotoRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            date: row.get(1)?,
            category: row.get(2)?,
            thumbnail: row.get(3)?,
            full_image: row.get(4)?,
            notes: row.get(5)?,
        })
    }

    fn into_photo(self) -> StorageResult<ProgressPhoto> {
        let date = DateTime::parse_from_rfc3339(&self.date)
            .map_err(|e| StorageError::Serialization(format!("photo {}: {}", self.id, e)))?
            .with_timezone(&Utc);

        Ok(ProgressPhoto {
            id: self.id,
            date,
            category: self.category,
            thumbnail: self.thumbnail,
            full_image: self.full_image,
            notes: self.notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn photo(id: &str, category: &str, day: u32) -> ProgressPhoto {
        ProgressPhoto {
            id: id.to_string(),
            date: Utc.with_ymd_and_hms(2024, 3, day, 7, 30, 0).unwrap(),
            category: category.to_string(),
            thumbnail: "data:image/jpeg;base64,AA==".to_string(),
            full_image: "data:image/jpeg;base64,AAAA".to_string(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_open_applies_current_version() {
        let store = BlobStore::open_in_memory().await.unwrap();
        assert_eq!(store.version().await.unwrap(), BLOB_STORE_VERSION);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_get_delete() {
        let store = BlobStore::open_in_memory().await.unwrap();
        let mut p = photo("p1", "front", 1);
        p.notes = Some("week 1".into());

        store.insert(p.clone()).await.unwrap();
        assert_eq!(store.get("p1").await.unwrap(), Some(p));

        assert!(store.delete("p1").await.unwrap());
        assert!(!store.delete("p1").await.unwrap());
        assert_eq!(store.get("p1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = BlobStore::open_in_memory().await.unwrap();
        store.insert(photo("p1", "front", 1)).await.unwrap();

        let err = store.insert(photo("p1", "side", 2)).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateId(ref id) if id == "p1"));
        assert_eq!(store.get("p1").await.unwrap().unwrap().category, "front");
    }

    #[tokio::test]
    async fn test_date_range_uses_inclusive_bounds() {
        let store = BlobStore::open_in_memory().await.unwrap();
        for (id, day) in [("a", 1), ("b", 5), ("c", 10)] {
            store.insert(photo(id, "front", day)).await.unwrap();
        }

        let from = Utc.with_ymd_and_hms(2024, 3, 5, 7, 30, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap();
        let ids: Vec<_> = store
            .get_by_date_range(from, to)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_sub_millisecond_dates_are_preserved() {
        let store = BlobStore::open_in_memory().await.unwrap();
        let mut p = photo("precise", "front", 1);
        p.date = Utc
            .with_ymd_and_hms(2024, 3, 1, 7, 0, 0)
            .unwrap()
            .checked_add_signed(chrono::Duration::microseconds(1500))
            .unwrap();
        store.insert(p.clone()).await.unwrap();

        assert_eq!(store.get("precise").await.unwrap(), Some(p.clone()));

        let from = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let before = Utc
            .with_ymd_and_hms(2024, 3, 1, 7, 0, 0)
            .unwrap()
            .checked_add_signed(chrono::Duration::microseconds(1200))
            .unwrap();
        assert!(store.get_by_date_range(from, before).await.unwrap().is_empty());
        assert_eq!(
            store.get_by_date_range(from, p.date).await.unwrap(),
            vec![p]
        );
    }

    #[tokio::test]
    async fn test_reopen_keeps_data_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photos.db");

        {
            let store = BlobStore::open(path.clone()).await.unwrap();
            store.insert(photo("p1", "back", 2)).await.unwrap();
        }

        let store = BlobStore::open(path).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.version().await.unwrap(), BLOB_STORE_VERSION);
    }

    #[tokio::test]
    async fn test_newer_store_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photos.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(BLOB_VERSION_TABLE).unwrap();
            conn.execute(
                "INSERT INTO blob_store_version (version, applied_at) VALUES (7, 'x')",
                [],
            )
            .unwrap();
        }

        let err = BlobStore::open(path).await.err().unwrap();
        assert!(matches!(err, StorageError::UnsupportedSchema { found: 7, .. }));
    }
}
