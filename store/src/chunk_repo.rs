use async_trait::async_trait;
use chunkvault_common::{ChunkId, ChunkIndex, ChunkStatus, FileId, Sha256Digest};

use crate::file_repo::FileRecord;
use crate::{DataStore, DataStoreError, Fetch, Persist, Result, now_rfc3339};

const UPSERT_QUERY: &str = r#"
    INSERT INTO chunks (chunk_id, file_id, chunk_index, length, digest, status, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT(chunk_id) DO UPDATE SET
        length = excluded.length,
        digest = excluded.digest,
        status = excluded.status
"#;

/// Row projection of a `Chunk` (§3).
#[derive(sqlx::FromRow, Clone, Debug)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub file_id: String,
    pub chunk_index: i64,
    pub length: i64,
    pub digest: Vec<u8>,
    pub status: String,
    pub created_at: String,
}

impl ChunkRecord {
    pub fn new_pending(
        chunk_id: ChunkId,
        file_id: FileId,
        chunk_index: ChunkIndex,
        length: u64,
        digest: Sha256Digest,
    ) -> Self {
        Self {
            chunk_id: chunk_id.to_string(),
            file_id: file_id.to_string(),
            chunk_index: chunk_index as i64,
            length: length as i64,
            digest: digest.as_bytes().to_vec(),
            status: ChunkStatus::Pending.as_str().to_string(),
            created_at: now_rfc3339(),
        }
    }

    pub fn status(&self) -> Option<ChunkStatus> {
        ChunkStatus::parse(&self.status)
    }

    pub fn digest(&self) -> Option<Sha256Digest> {
        let arr: [u8; 32] = self.digest.clone().try_into().ok()?;
        Sha256Digest::from_hex(&hex::encode(arr)).ok()
    }
}

#[async_trait]
impl Persist<ChunkRecord> for DataStore {
    async fn store_all(&self, items: Vec<ChunkRecord>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool().begin().await?;
        for entry in items {
            sqlx::query(UPSERT_QUERY)
                .bind(entry.chunk_id)
                .bind(entry.file_id)
                .bind(entry.chunk_index)
                .bind(entry.length)
                .bind(entry.digest)
                .bind(entry.status)
                .bind(entry.created_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn store(&self, item: ChunkRecord) -> Result<()> {
        sqlx::query(UPSERT_QUERY)
            .bind(item.chunk_id)
            .bind(item.file_id)
            .bind(item.chunk_index)
            .bind(item.length)
            .bind(item.digest)
            .bind(item.status)
            .bind(item.created_at)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Fetch<ChunkId, ChunkRecord> for DataStore {
    async fn fetch_by(&self, key: &ChunkId) -> Result<ChunkRecord> {
        let mut results = self.fetch_many(&[*key]).await?;
        results.pop().ok_or(DataStoreError::NotFound)
    }

    async fn fetch_many(&self, keys: &[ChunkId]) -> Result<Vec<ChunkRecord>> {
        if keys.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = (1..=keys.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!("SELECT * FROM chunks WHERE chunk_id IN ({placeholders})");

        let mut query = sqlx::query_as::<_, ChunkRecord>(&sql);
        for id in keys {
            query = query.bind(id.to_string());
        }
        Ok(query.fetch_all(self.pool()).await?)
    }
}

impl DataStore {
    /// Lists a file's chunks in original offset order (§4.1 assembly order).
    pub async fn list_chunks_for_file(&self, file_id: &FileId) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query_as::<_, ChunkRecord>(
            "SELECT * FROM chunks WHERE file_id = $1 ORDER BY chunk_index ASC",
        )
        .bind(file_id.to_string())
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn update_chunk_status(&self, chunk_id: &ChunkId, status: ChunkStatus) -> Result<()> {
        let rows = sqlx::query("UPDATE chunks SET status = $1 WHERE chunk_id = $2")
            .bind(status.as_str())
            .bind(chunk_id.to_string())
            .execute(self.pool())
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(DataStoreError::NotFound);
        }
        Ok(())
    }

    /// Marks a chunk `failed` after its replication task has exhausted
    /// retries (§5 Replicate task). A terminal state, never retried again
    /// by the task runner itself.
    pub async fn mark_chunk_failed(&self, chunk_id: &ChunkId) -> Result<()> {
        self.update_chunk_status(chunk_id, ChunkStatus::Failed).await
    }

    /// Inserts a `File` row together with its `Chunk` rows in one
    /// transaction (§4.1 step 2): a file never exists in the store without
    /// its full chunk manifest alongside it.
    pub async fn create_file_with_chunks(
        &self,
        file: FileRecord,
        chunks: Vec<ChunkRecord>,
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"INSERT INTO files (file_id, owner_id, name, mime, size, chunk_count, digest, version, status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)"#,
        )
        .bind(file.file_id)
        .bind(file.owner_id)
        .bind(file.name)
        .bind(file.mime)
        .bind(file.size)
        .bind(file.chunk_count)
        .bind(file.digest)
        .bind(file.version)
        .bind(file.status)
        .bind(file.created_at)
        .execute(&mut *tx)
        .await?;

        for entry in chunks {
            sqlx::query(
                r#"INSERT INTO chunks (chunk_id, file_id, chunk_index, length, digest, status, created_at)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
            )
            .bind(entry.chunk_id)
            .bind(entry.file_id)
            .bind(entry.chunk_index)
            .bind(entry.length)
            .bind(entry.digest)
            .bind(entry.status)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup;

    fn sample_file(owner: &str, chunk_count: u32) -> FileRecord {
        FileRecord::new_uploading(
            FileId::new(),
            owner,
            "movie.mp4",
            "video/mp4",
            4096,
            chunk_count,
            Sha256Digest::compute(b"movie bytes"),
        )
    }

    #[tokio::test]
    async fn create_file_with_chunks_is_atomic_and_ordered() {
        let store = setup().await;
        let file = sample_file("erin", 3);
        let file_id = FileId::parse(&file.file_id).unwrap();

        let chunks = (0..3)
            .map(|i| {
                ChunkRecord::new_pending(
                    ChunkId::new(),
                    file_id,
                    i,
                    1024,
                    Sha256Digest::compute(format!("chunk-{i}").as_bytes()),
                )
            })
            .collect::<Vec<_>>();

        store.create_file_with_chunks(file, chunks).await.unwrap();

        let listed = store.list_chunks_for_file(&file_id).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].chunk_index, 0);
        assert_eq!(listed[2].chunk_index, 2);
    }

    #[tokio::test]
    async fn chunk_cascade_deletes_with_parent_file() {
        let store = setup().await;
        let file = sample_file("frank", 1);
        let file_id = FileId::parse(&file.file_id).unwrap();
        let chunk = ChunkRecord::new_pending(
            ChunkId::new(),
            file_id,
            0,
            512,
            Sha256Digest::compute(b"sole chunk"),
        );
        store
            .create_file_with_chunks(file, vec![chunk])
            .await
            .unwrap();

        sqlx::query("DELETE FROM files WHERE file_id = $1")
            .bind(file_id.to_string())
            .execute(store.pool())
            .await
            .unwrap();

        let remaining = store.list_chunks_for_file(&file_id).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn update_status_then_mark_failed() {
        let store = setup().await;
        let file = sample_file("gina", 1);
        let file_id = FileId::parse(&file.file_id).unwrap();
        let chunk_id = ChunkId::new();
        let chunk = ChunkRecord::new_pending(
            chunk_id,
            file_id,
            0,
            10,
            Sha256Digest::compute(b"x"),
        );
        store
            .create_file_with_chunks(file, vec![chunk])
            .await
            .unwrap();

        store
            .update_chunk_status(&chunk_id, ChunkStatus::Stored)
            .await
            .unwrap();
        let fetched: ChunkRecord = store.fetch_by(&chunk_id).await.unwrap();
        assert_eq!(fetched.status().unwrap(), ChunkStatus::Stored);

        store.mark_chunk_failed(&chunk_id).await.unwrap();
        let fetched: ChunkRecord = store.fetch_by(&chunk_id).await.unwrap();
        assert_eq!(fetched.status().unwrap(), ChunkStatus::Failed);
    }
}
