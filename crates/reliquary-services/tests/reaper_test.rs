//! Reaper and sweep tests

mod helpers;

use chrono::Utc;
use helpers::{jpeg_fixture, setup_pipeline};
use reliquary_core::{AssetState, MediaAsset, MediaKind};
use uuid::Uuid;

#[tokio::test]
async fn test_detach_removes_record_and_files() {
    let t = setup_pipeline().await;
    let binding = Uuid::new_v4();

    let staged = t
        .pipeline
        .stage(
            None,
            MediaKind::GalleryPhoto,
            "g1",
            "icon.jpg",
            jpeg_fixture(400, 300),
        )
        .await
        .unwrap();
    let promoted = t.pipeline.promote(staged.id, binding).await.unwrap();
    let durable_dir = t.codec.durable_dir(&promoted);
    assert!(durable_dir.exists());

    t.pipeline.detach(promoted.id).await.unwrap();

    let row = sqlx::query_as::<_, MediaAsset>("SELECT * FROM media_assets WHERE id = ?")
        .bind(promoted.id)
        .fetch_optional(&t.pool)
        .await
        .unwrap();
    assert!(row.is_none());
    assert!(!durable_dir.exists());
    assert!(t.pipeline.list_synced(binding).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_detach_staged_asset_clears_staging_tree() {
    let t = setup_pipeline().await;

    let staged = t
        .pipeline
        .stage(
            None,
            MediaKind::SupportingDocument,
            "g1",
            "inventory.pdf",
            b"pdfbytes".to_vec(),
        )
        .await
        .unwrap();
    let staging_dir = t.codec.staging_dir(&staged);
    assert!(staging_dir.exists());

    t.pipeline.detach(staged.id).await.unwrap();

    assert!(!staging_dir.exists());
    let row = sqlx::query_as::<_, MediaAsset>("SELECT * FROM media_assets WHERE id = ?")
        .bind(staged.id)
        .fetch_optional(&t.pool)
        .await
        .unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn test_detach_missing_asset_is_not_found() {
    let t = setup_pipeline().await;
    let err = t.pipeline.detach(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");
}

// Scenario: an owning entity with three synced photos disappears; all
// three records and all six files go with it.
#[tokio::test]
async fn test_reap_cascade_clears_every_bound_asset() {
    let t = setup_pipeline().await;
    let binding = Uuid::new_v4();

    let mut durable_dirs = Vec::new();
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        let staged = t
            .pipeline
            .stage(
                None,
                MediaKind::GalleryPhoto,
                "g1",
                name,
                jpeg_fixture(400, 300),
            )
            .await
            .unwrap();
        let promoted = t.pipeline.promote(staged.id, binding).await.unwrap();

        let primary = t.codec.durable_path(&promoted);
        assert!(primary.exists());
        assert!(t.codec.rendition_path(&primary).exists());
        durable_dirs.push(t.codec.durable_dir(&promoted));
    }

    let outcome = t.pipeline.reap_cascade(binding).await.unwrap();

    assert_eq!(outcome.reaped, 3);
    assert!(outcome.failed_files.is_empty());
    for dir in &durable_dirs {
        assert!(!dir.exists());
    }

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_assets WHERE binding = ?")
        .bind(binding)
        .fetch_one(&t.pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_reap_cascade_on_unbound_entity_is_noop() {
    let t = setup_pipeline().await;
    let outcome = t.pipeline.reap_cascade(Uuid::new_v4()).await.unwrap();
    assert_eq!(outcome.reaped, 0);
    assert!(outcome.failed_files.is_empty());
}

#[tokio::test]
async fn test_sweep_reaps_only_stale_staged_assets() {
    let t = setup_pipeline().await;

    let stale = t
        .pipeline
        .stage(
            None,
            MediaKind::GalleryPhoto,
            "g1",
            "forgotten.jpg",
            jpeg_fixture(100, 100),
        )
        .await
        .unwrap();
    let fresh = t
        .pipeline
        .stage(
            None,
            MediaKind::GalleryPhoto,
            "g1",
            "pending.jpg",
            jpeg_fixture(100, 100),
        )
        .await
        .unwrap();

    // age the first upload past the 24h retention window
    sqlx::query("UPDATE media_assets SET staged_at = ? WHERE id = ?")
        .bind(Utc::now() - chrono::Duration::hours(48))
        .bind(stale.id)
        .execute(&t.pool)
        .await
        .unwrap();

    let reaped = t.pipeline.sweep_stale().await.unwrap();
    assert_eq!(reaped, 1);

    assert!(!t.codec.staging_path(&stale).exists());
    assert!(t.codec.staging_path(&fresh).exists());

    let rows: Vec<MediaAsset> = sqlx::query_as("SELECT * FROM media_assets")
        .fetch_all(&t.pool)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, fresh.id);
    assert_eq!(rows[0].state, AssetState::Staged);
}

#[tokio::test]
async fn test_sweep_ignores_synced_assets() {
    let t = setup_pipeline().await;
    let binding = Uuid::new_v4();

    let staged = t
        .pipeline
        .stage(
            None,
            MediaKind::GalleryPhoto,
            "g1",
            "icon.jpg",
            jpeg_fixture(100, 100),
        )
        .await
        .unwrap();
    let promoted = t.pipeline.promote(staged.id, binding).await.unwrap();

    // even an ancient synced_at/staged_at pair is not sweep material
    sqlx::query("UPDATE media_assets SET staged_at = ? WHERE id = ?")
        .bind(Utc::now() - chrono::Duration::hours(900))
        .bind(promoted.id)
        .execute(&t.pool)
        .await
        .unwrap();

    let reaped = t.pipeline.sweep_stale().await.unwrap();
    assert_eq!(reaped, 0);
    assert!(t.codec.durable_path(&promoted).exists());
}
