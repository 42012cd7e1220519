use async_trait::async_trait;
use chunkvault_common::{FileId, FileStatus, Sha256Digest};

use crate::{DataStore, DataStoreError, Fetch, Persist, Result, now_rfc3339};

const UPSERT_QUERY: &str = r#"
    INSERT INTO files (file_id, owner_id, name, mime, size, chunk_count, digest, version, status, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
    ON CONFLICT(file_id) DO UPDATE SET
        name = excluded.name,
        mime = excluded.mime,
        size = excluded.size,
        chunk_count = excluded.chunk_count,
        digest = excluded.digest,
        version = excluded.version,
        status = excluded.status,
        updated_at = excluded.updated_at
"#;

/// Row projection of a `File` (§3). `digest` is the whole-file SHA-256.
#[derive(sqlx::FromRow, Clone, Debug)]
pub struct FileRecord {
    pub file_id: String,
    pub owner_id: String,
    pub name: String,
    pub mime: String,
    pub size: i64,
    pub chunk_count: i64,
    pub digest: Vec<u8>,
    pub version: i64,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl FileRecord {
    pub fn new_uploading(
        file_id: FileId,
        owner_id: &str,
        name: &str,
        mime: &str,
        size: u64,
        chunk_count: u32,
        digest: Sha256Digest,
    ) -> Self {
        let now = now_rfc3339();
        Self {
            file_id: file_id.to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            mime: mime.to_string(),
            size: size as i64,
            chunk_count: chunk_count as i64,
            digest: digest.as_bytes().to_vec(),
            version: 1,
            status: FileStatus::Uploading.as_str().to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn status(&self) -> Option<FileStatus> {
        FileStatus::parse(&self.status)
    }

    pub fn digest(&self) -> Option<Sha256Digest> {
        let arr: [u8; 32] = self.digest.clone().try_into().ok()?;
        Some(Sha256Digest::from_hex(&hex::encode(arr)).ok()?)
    }
}

#[async_trait]
impl Persist<FileRecord> for DataStore {
    async fn store_all(&self, items: Vec<FileRecord>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool().begin().await?;
        for entry in items {
            sqlx::query(UPSERT_QUERY)
                .bind(entry.file_id)
                .bind(entry.owner_id)
                .bind(entry.name)
                .bind(entry.mime)
                .bind(entry.size)
                .bind(entry.chunk_count)
                .bind(entry.digest)
                .bind(entry.version)
                .bind(entry.status)
                .bind(entry.created_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn store(&self, item: FileRecord) -> Result<()> {
        sqlx::query(UPSERT_QUERY)
            .bind(item.file_id)
            .bind(item.owner_id)
            .bind(item.name)
            .bind(item.mime)
            .bind(item.size)
            .bind(item.chunk_count)
            .bind(item.digest)
            .bind(item.version)
            .bind(item.status)
            .bind(item.created_at)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Fetch<FileId, FileRecord> for DataStore {
    async fn fetch_by(&self, key: &FileId) -> Result<FileRecord> {
        let mut results = self.fetch_many(&[*key]).await?;
        results.pop().ok_or(DataStoreError::NotFound)
    }

    async fn fetch_many(&self, keys: &[FileId]) -> Result<Vec<FileRecord>> {
        if keys.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = (1..=keys.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!("SELECT * FROM files WHERE file_id IN ({placeholders})");

        let mut query = sqlx::query_as::<_, FileRecord>(&sql);
        for id in keys {
            query = query.bind(id.to_string());
        }
        Ok(query.fetch_all(self.pool()).await?)
    }
}

impl DataStore {
    /// Lists a user's files, most recently updated first (§4.2 listing scan).
    pub async fn list_files_for_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files WHERE owner_id = $1 ORDER BY updated_at DESC",
        )
        .bind(owner_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Updates a file's status, bumping `updated_at`. This is the only
    /// allowed way to drive the `uploading -> completed|failed` and
    /// `completed -> verified|corrupted` transitions (§3 lifecycle).
    pub async fn update_file_status(&self, file_id: &FileId, status: FileStatus) -> Result<()> {
        let rows = sqlx::query(
            "UPDATE files SET status = $1, updated_at = $2 WHERE file_id = $3",
        )
        .bind(status.as_str())
        .bind(now_rfc3339())
        .bind(file_id.to_string())
        .execute(self.pool())
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(DataStoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup;
    use chunkvault_common::Sha256Digest;

    fn sample(owner: &str) -> FileRecord {
        FileRecord::new_uploading(
            FileId::new(),
            owner,
            "init.txt",
            "text/plain",
            1024,
            1,
            Sha256Digest::compute(b"hello"),
        )
    }

    #[tokio::test]
    async fn store_then_fetch_round_trips() {
        let store = setup().await;
        let entry = sample("alice");
        let file_id = FileId::parse(&entry.file_id).unwrap();

        store.store(entry).await.unwrap();
        let fetched: FileRecord = store.fetch_by(&file_id).await.unwrap();
        assert_eq!(fetched.name, "init.txt");
        assert_eq!(fetched.status().unwrap(), FileStatus::Uploading);
    }

    #[tokio::test]
    async fn upsert_on_conflict_updates_in_place() {
        let store = setup().await;
        let mut entry = sample("bob");
        let file_id = FileId::parse(&entry.file_id).unwrap();
        store.store(entry.clone()).await.unwrap();

        entry.name = "renamed.txt".to_string();
        store.store(entry).await.unwrap();

        let fetched: FileRecord = store.fetch_by(&file_id).await.unwrap();
        assert_eq!(fetched.name, "renamed.txt");
    }

    #[tokio::test]
    async fn update_status_bumps_updated_at_and_rejects_unknown_id() {
        let store = setup().await;
        let entry = sample("carol");
        let file_id = FileId::parse(&entry.file_id).unwrap();
        store.store(entry).await.unwrap();

        store
            .update_file_status(&file_id, FileStatus::Completed)
            .await
            .unwrap();
        let fetched: FileRecord = store.fetch_by(&file_id).await.unwrap();
        assert_eq!(fetched.status().unwrap(), FileStatus::Completed);

        let missing = FileId::new();
        let err = store
            .update_file_status(&missing, FileStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, DataStoreError::NotFound));
    }

    #[tokio::test]
    async fn list_for_owner_orders_by_updated_at_desc() {
        let store = setup().await;
        let a = sample("dora");
        let b = sample("dora");
        let b_id = FileId::parse(&b.file_id).unwrap();
        store.store(a).await.unwrap();
        store.store(b).await.unwrap();

        // Touch `b` so its updated_at is strictly the latest.
        store
            .update_file_status(&b_id, FileStatus::Completed)
            .await
            .unwrap();

        let listed = store.list_files_for_owner("dora").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].file_id, b_id.to_string());
    }
}
