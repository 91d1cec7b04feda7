use chrono::{DateTime, Utc};
use reliquary_core::{AppError, AssetState, MediaAsset, MediaKind};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

/// Repository over the media asset index.
///
/// Reads go against the pool; state transitions take an explicit
/// transaction handle so the caller draws the boundary around claim +
/// filesystem work. Transactions must lead with their conditional write
/// (never a plain read) so SQLite's writer lock is taken at claim time.
#[derive(Clone)]
pub struct AssetStore {
    pool: SqlitePool,
}

impl AssetStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin().await?)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "insert"))]
    pub async fn insert(&self, asset: &MediaAsset) -> Result<MediaAsset, AppError> {
        let row = sqlx::query_as::<_, MediaAsset>(
            r#"
            INSERT INTO media_assets (
                id, owner_ref, binding, group_tag, kind,
                storage_dir, extension, state, staged_at, synced_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(asset.id)
        .bind(asset.owner_ref)
        .bind(asset.binding)
        .bind(&asset.group_tag)
        .bind(asset.kind)
        .bind(&asset.storage_dir)
        .bind(&asset.extension)
        .bind(asset.state)
        .bind(asset.staged_at)
        .bind(asset.synced_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get(&self, id: Uuid) -> Result<MediaAsset, AppError> {
        sqlx::query_as::<_, MediaAsset>("SELECT * FROM media_assets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("media asset {}", id)))
    }

    /// Staged assets of one upload batch, oldest first
    pub async fn find_staged(
        &self,
        group_tag: &str,
        kind: MediaKind,
    ) -> Result<Vec<MediaAsset>, AppError> {
        let rows = sqlx::query_as::<_, MediaAsset>(
            r#"
            SELECT * FROM media_assets
            WHERE group_tag = ? AND kind = ? AND state = ?
            ORDER BY staged_at
            "#,
        )
        .bind(group_tag)
        .bind(kind)
        .bind(AssetState::Staged)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Synced assets bound to an owning entity, optionally narrowed to one
    /// kind, oldest promotion first
    pub async fn find_synced(
        &self,
        binding: Uuid,
        kind: Option<MediaKind>,
    ) -> Result<Vec<MediaAsset>, AppError> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query_as::<_, MediaAsset>(
                    r#"
                    SELECT * FROM media_assets
                    WHERE binding = ? AND state = ? AND kind = ?
                    ORDER BY synced_at
                    "#,
                )
                .bind(binding)
                .bind(AssetState::Synced)
                .bind(kind)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, MediaAsset>(
                    r#"
                    SELECT * FROM media_assets
                    WHERE binding = ? AND state = ?
                    ORDER BY synced_at
                    "#,
                )
                .bind(binding)
                .bind(AssetState::Synced)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows)
    }

    /// One SYNCED asset, read under the caller's transaction
    pub async fn get_synced(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        id: Uuid,
    ) -> Result<MediaAsset, AppError> {
        sqlx::query_as::<_, MediaAsset>(
            "SELECT * FROM media_assets WHERE id = ? AND state = ?",
        )
        .bind(id)
        .bind(AssetState::Synced)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("synced media asset {}", id)))
    }

    /// Staged assets older than the cutoff, for the retention sweep
    pub async fn find_stale_staged(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<MediaAsset>, AppError> {
        let rows = sqlx::query_as::<_, MediaAsset>(
            r#"
            SELECT * FROM media_assets
            WHERE state = ? AND staged_at < ?
            ORDER BY staged_at
            "#,
        )
        .bind(AssetState::Staged)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Every asset in the index, for consistency audits
    pub async fn all(&self) -> Result<Vec<MediaAsset>, AppError> {
        let rows =
            sqlx::query_as::<_, MediaAsset>("SELECT * FROM media_assets ORDER BY staged_at")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    /// Claim the STAGED→SYNCED edge. The `state = 'staged'` guard is the
    /// optimistic lock: a concurrent second promotion finds no row and
    /// gets `Conflict`.
    #[tracing::instrument(skip(self, tx), fields(db.table = "media_assets", db.operation = "update"))]
    pub async fn claim_synced(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        id: Uuid,
        binding: Uuid,
        now: DateTime<Utc>,
    ) -> Result<MediaAsset, AppError> {
        let claimed = sqlx::query_as::<_, MediaAsset>(
            r#"
            UPDATE media_assets
            SET state = ?, binding = ?, synced_at = ?
            WHERE id = ? AND state = ?
            RETURNING *
            "#,
        )
        .bind(AssetState::Synced)
        .bind(binding)
        .bind(now)
        .bind(id)
        .bind(AssetState::Staged)
        .fetch_optional(&mut **tx)
        .await?;

        match claimed {
            Some(row) => Ok(row),
            None => Err(self.transition_failure(tx, id, "staged").await),
        }
    }

    /// An unmatched conditional write is `Conflict` when the row exists in
    /// another state and `NotFound` when the id does not resolve at all.
    async fn transition_failure(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        id: Uuid,
        wanted: &str,
    ) -> AppError {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM media_assets WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&mut **tx)
        .await;

        match exists {
            Ok(0) => AppError::NotFound(format!("media asset {}", id)),
            Ok(_) => AppError::Conflict(format!("media asset {} is not {}", id, wanted)),
            Err(e) => AppError::Database(e),
        }
    }

    /// Correct the recorded extension (sniffed content format disagreed
    /// with the declared one)
    pub async fn update_extension(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        id: Uuid,
        extension: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE media_assets SET extension = ? WHERE id = ?")
            .bind(extension)
            .bind(id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("media asset {}", id)));
        }
        Ok(())
    }

    /// Confirm an in-place content replacement on a SYNCED asset
    #[tracing::instrument(skip(self, tx), fields(db.table = "media_assets", db.operation = "update"))]
    pub async fn confirm_replacement(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        id: Uuid,
        extension: &str,
        now: DateTime<Utc>,
    ) -> Result<MediaAsset, AppError> {
        let confirmed = sqlx::query_as::<_, MediaAsset>(
            r#"
            UPDATE media_assets
            SET extension = ?, synced_at = ?
            WHERE id = ? AND state = ?
            RETURNING *
            "#,
        )
        .bind(extension)
        .bind(now)
        .bind(id)
        .bind(AssetState::Synced)
        .fetch_optional(&mut **tx)
        .await?;

        match confirmed {
            Some(row) => Ok(row),
            None => Err(self.transition_failure(tx, id, "synced").await),
        }
    }

    /// Consume a STAGED row that is being folded into a replacement. The
    /// state guard rejects a staged asset that was promoted or consumed
    /// concurrently.
    #[tracing::instrument(skip(self, tx), fields(db.table = "media_assets", db.operation = "delete"))]
    pub async fn consume_staged(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        id: Uuid,
    ) -> Result<MediaAsset, AppError> {
        let consumed = sqlx::query_as::<_, MediaAsset>(
            "DELETE FROM media_assets WHERE id = ? AND state = ? RETURNING *",
        )
        .bind(id)
        .bind(AssetState::Staged)
        .fetch_optional(&mut **tx)
        .await?;

        match consumed {
            Some(row) => Ok(row),
            None => Err(self.transition_failure(tx, id, "staged").await),
        }
    }

    /// Remove a row outright, any state
    #[tracing::instrument(skip(self, tx), fields(db.table = "media_assets", db.operation = "delete"))]
    pub async fn delete(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        id: Uuid,
    ) -> Result<MediaAsset, AppError> {
        sqlx::query_as::<_, MediaAsset>("DELETE FROM media_assets WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("media asset {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (AssetStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("index.db").display());
        let pool = crate::connect(&url).await.unwrap();
        (AssetStore::new(pool), dir)
    }

    fn staged_asset(group_tag: &str, kind: MediaKind) -> MediaAsset {
        MediaAsset {
            id: Uuid::new_v4(),
            owner_ref: Some(Uuid::new_v4()),
            binding: None,
            group_tag: group_tag.to_string(),
            kind,
            storage_dir: Uuid::new_v4().simple().to_string(),
            extension: ".jpg".to_string(),
            state: AssetState::Staged,
            staged_at: Utc::now(),
            synced_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let (store, _dir) = test_store().await;
        let asset = staged_asset("g1", MediaKind::GalleryPhoto);

        let inserted = store.insert(&asset).await.unwrap();
        assert_eq!(inserted.id, asset.id);
        assert_eq!(inserted.state, AssetState::Staged);

        let fetched = store.get(asset.id).await.unwrap();
        assert_eq!(fetched.storage_dir, asset.storage_dir);
        assert_eq!(fetched.kind, MediaKind::GalleryPhoto);
        assert!(fetched.binding.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (store, _dir) = test_store().await;
        let err = store.get(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_storage_dir_uniqueness_enforced() {
        let (store, _dir) = test_store().await;
        let asset = staged_asset("g1", MediaKind::GalleryPhoto);
        store.insert(&asset).await.unwrap();

        let mut twin = staged_asset("g1", MediaKind::GalleryPhoto);
        twin.storage_dir = asset.storage_dir.clone();
        assert!(store.insert(&twin).await.is_err());
    }

    #[tokio::test]
    async fn test_claim_synced_once() {
        let (store, _dir) = test_store().await;
        let asset = staged_asset("g1", MediaKind::GalleryPhoto);
        store.insert(&asset).await.unwrap();
        let binding = Uuid::new_v4();

        let mut tx = store.begin().await.unwrap();
        let claimed = store
            .claim_synced(&mut tx, asset.id, binding, Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(claimed.state, AssetState::Synced);
        assert_eq!(claimed.binding, Some(binding));
        assert!(claimed.synced_at.is_some());

        // second claim hits the state guard
        let mut tx = store.begin().await.unwrap();
        let err = store
            .claim_synced(&mut tx, asset.id, binding, Utc::now())
            .await
            .unwrap_err();
        tx.rollback().await.unwrap();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_claim_rollback_leaves_staged() {
        let (store, _dir) = test_store().await;
        let asset = staged_asset("g1", MediaKind::GalleryPhoto);
        store.insert(&asset).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        store
            .claim_synced(&mut tx, asset.id, Uuid::new_v4(), Utc::now())
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        let fetched = store.get(asset.id).await.unwrap();
        assert_eq!(fetched.state, AssetState::Staged);
        assert!(fetched.binding.is_none());
    }

    #[tokio::test]
    async fn test_find_staged_filters_group_and_kind() {
        let (store, _dir) = test_store().await;
        store
            .insert(&staged_asset("g1", MediaKind::GalleryPhoto))
            .await
            .unwrap();
        store
            .insert(&staged_asset("g1", MediaKind::GalleryVideo))
            .await
            .unwrap();
        store
            .insert(&staged_asset("g2", MediaKind::GalleryPhoto))
            .await
            .unwrap();

        let staged = store
            .find_staged("g1", MediaKind::GalleryPhoto)
            .await
            .unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].group_tag, "g1");
        assert_eq!(staged[0].kind, MediaKind::GalleryPhoto);
    }

    #[tokio::test]
    async fn test_find_synced_by_binding() {
        let (store, _dir) = test_store().await;
        let binding = Uuid::new_v4();

        for _ in 0..2 {
            let asset = staged_asset("g1", MediaKind::GalleryPhoto);
            store.insert(&asset).await.unwrap();
            let mut tx = store.begin().await.unwrap();
            store
                .claim_synced(&mut tx, asset.id, binding, Utc::now())
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }
        store
            .insert(&staged_asset("g1", MediaKind::GalleryPhoto))
            .await
            .unwrap();

        let synced = store.find_synced(binding, None).await.unwrap();
        assert_eq!(synced.len(), 2);
        assert!(synced.iter().all(|a| a.binding == Some(binding)));

        let photos = store
            .find_synced(binding, Some(MediaKind::GalleryPhoto))
            .await
            .unwrap();
        assert_eq!(photos.len(), 2);
        let videos = store
            .find_synced(binding, Some(MediaKind::GalleryVideo))
            .await
            .unwrap();
        assert!(videos.is_empty());
    }

    #[tokio::test]
    async fn test_consume_staged_guards_state() {
        let (store, _dir) = test_store().await;
        let asset = staged_asset("g1", MediaKind::GalleryPhoto);
        store.insert(&asset).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let consumed = store.consume_staged(&mut tx, asset.id).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(consumed.id, asset.id);

        // the row is gone entirely now
        let mut tx = store.begin().await.unwrap();
        let err = store.consume_staged(&mut tx, asset.id).await.unwrap_err();
        tx.rollback().await.unwrap();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_claim_unknown_id_is_not_found() {
        let (store, _dir) = test_store().await;
        let mut tx = store.begin().await.unwrap();
        let err = store
            .claim_synced(&mut tx, Uuid::new_v4(), Uuid::new_v4(), Utc::now())
            .await
            .unwrap_err();
        tx.rollback().await.unwrap();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_find_stale_staged_uses_cutoff() {
        let (store, _dir) = test_store().await;
        let mut old = staged_asset("g1", MediaKind::GalleryPhoto);
        old.staged_at = Utc::now() - chrono::Duration::hours(48);
        store.insert(&old).await.unwrap();
        store
            .insert(&staged_asset("g1", MediaKind::GalleryPhoto))
            .await
            .unwrap();

        let cutoff = Utc::now() - chrono::Duration::hours(24);
        let stale = store.find_stale_staged(cutoff).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, old.id);
    }

    #[tokio::test]
    async fn test_delete_any_state() {
        let (store, _dir) = test_store().await;
        let asset = staged_asset("g1", MediaKind::GalleryPhoto);
        store.insert(&asset).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let removed = store.delete(&mut tx, asset.id).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(removed.id, asset.id);

        let mut tx = store.begin().await.unwrap();
        let err = store.delete(&mut tx, asset.id).await.unwrap_err();
        tx.rollback().await.unwrap();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
