//! Photo store index and bulk import scenarios.

use std::collections::HashSet;

use chrono::{Duration, TimeZone, Utc};
use liftlog::photos::{ImportReport, PhotoStore, ProgressPhoto};

fn photos(category: &str, count: usize) -> Vec<ProgressPhoto> {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap();
    (0..count)
        .map(|i| ProgressPhoto {
            id: format!("{}-{}", category, i),
            date: start + Duration::days(i as i64),
            category: category.to_string(),
            thumbnail: "data:image/jpeg;base64,AA==".to_string(),
            full_image: "data:image/jpeg;base64,AAAA".to_string(),
            notes: Some(format!("{} week {}", category, i)),
        })
        .collect()
}

#[tokio::test]
async fn test_category_lookup_returns_exact_set() {
    let store = PhotoStore::initialize_in_memory(64).await.unwrap();
    let front = photos("front", 4);
    let side = photos("side", 3);

    for p in front.iter().chain(side.iter()) {
        store.add_photo(p.clone()).await.unwrap();
    }

    let expected: HashSet<_> = front.iter().map(|p| p.id.clone()).collect();
    let found: HashSet<_> = store
        .get_photos_by_category("front")
        .await
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(found, expected);

    let side_found = store.get_photos_by_category("side").await;
    assert_eq!(side_found.len(), 3);
    assert!(side_found.iter().all(|p| p.category == "side"));
}

#[tokio::test]
async fn test_bulk_import_then_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photos.db");

    {
        let store = PhotoStore::initialize(path.clone(), 64).await.unwrap();
        let report = store.import_photos(photos("back", 5)).await.unwrap();
        assert_eq!(report, ImportReport { imported: 5, skipped: 0 });
    }

    let store = PhotoStore::initialize(path, 64).await.unwrap();
    let again = store.import_photos(photos("back", 6)).await.unwrap();
    assert_eq!(again, ImportReport { imported: 1, skipped: 5 });

    let mut all = store.get_all_photos().await;
    all.sort_by_key(|p| p.date);
    assert_eq!(all, photos("back", 6));
}
