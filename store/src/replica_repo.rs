use async_trait::async_trait;
use chunkvault_common::{ChunkId, ChunkStatus, NodeId, ReplicaId};

use crate::{DataStore, DataStoreError, Fetch, Persist, Result, now_rfc3339};

/// Row projection of a `Replica` (§3): one (chunk, node) placement.
#[derive(sqlx::FromRow, Clone, Debug)]
pub struct ReplicaRecord {
    pub replica_id: String,
    pub chunk_id: String,
    pub node_id: String,
    pub created_at: String,
}

impl ReplicaRecord {
    pub fn new(chunk_id: ChunkId, node_id: &NodeId) -> Self {
        Self {
            replica_id: ReplicaId::new().to_string(),
            chunk_id: chunk_id.to_string(),
            node_id: node_id.as_str().to_string(),
            created_at: now_rfc3339(),
        }
    }
}

#[async_trait]
impl Persist<ReplicaRecord> for DataStore {
    async fn store_all(&self, items: Vec<ReplicaRecord>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool().begin().await?;
        for entry in items {
            sqlx::query(
                r#"INSERT INTO replicas (replica_id, chunk_id, node_id, created_at)
                   VALUES ($1, $2, $3, $4)
                   ON CONFLICT(chunk_id, node_id) DO NOTHING"#,
            )
            .bind(entry.replica_id)
            .bind(entry.chunk_id)
            .bind(entry.node_id)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn store(&self, item: ReplicaRecord) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO replicas (replica_id, chunk_id, node_id, created_at)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT(chunk_id, node_id) DO NOTHING"#,
        )
        .bind(item.replica_id)
        .bind(item.chunk_id)
        .bind(item.node_id)
        .bind(item.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Fetch<ReplicaId, ReplicaRecord> for DataStore {
    async fn fetch_by(&self, key: &ReplicaId) -> Result<ReplicaRecord> {
        let mut results = self.fetch_many(&[*key]).await?;
        results.pop().ok_or(DataStoreError::NotFound)
    }

    async fn fetch_many(&self, keys: &[ReplicaId]) -> Result<Vec<ReplicaRecord>> {
        if keys.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = (1..=keys.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!("SELECT * FROM replicas WHERE replica_id IN ({placeholders})");

        let mut query = sqlx::query_as::<_, ReplicaRecord>(&sql);
        for id in keys {
            query = query.bind(id.to_string());
        }
        Ok(query.fetch_all(self.pool()).await?)
    }
}

impl DataStore {
    /// All known placements of a chunk, in no particular order — callers
    /// that need a read order shuffle this themselves (§4.3 download path).
    pub async fn list_replicas_for_chunk(&self, chunk_id: &ChunkId) -> Result<Vec<ReplicaRecord>> {
        let rows = sqlx::query_as::<_, ReplicaRecord>(
            "SELECT * FROM replicas WHERE chunk_id = $1",
        )
        .bind(chunk_id.to_string())
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Records successful placements and flips the chunk to `stored` in one
    /// transaction (§5 Replicate task, success path). `ON CONFLICT DO
    /// NOTHING` on `(chunk_id, node_id)` makes this safe to call again if a
    /// task is redelivered after its result already landed: the duplicate
    /// retry never produces a second Replica row for the same placement.
    pub async fn mark_chunk_stored_with_replicas(
        &self,
        chunk_id: &ChunkId,
        node_ids: &[NodeId],
    ) -> Result<()> {
        if node_ids.is_empty() {
            return Err(DataStoreError::Fatal(
                "cannot mark a chunk stored with zero replicas".to_string(),
            ));
        }

        let mut tx = self.pool().begin().await?;

        for node_id in node_ids {
            sqlx::query(
                r#"INSERT INTO replicas (replica_id, chunk_id, node_id, created_at)
                   VALUES ($1, $2, $3, $4)
                   ON CONFLICT(chunk_id, node_id) DO NOTHING"#,
            )
            .bind(ReplicaId::new().to_string())
            .bind(chunk_id.to_string())
            .bind(node_id.as_str())
            .bind(now_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        let rows = sqlx::query("UPDATE chunks SET status = $1 WHERE chunk_id = $2")
            .bind(ChunkStatus::Stored.as_str())
            .bind(chunk_id.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(DataStoreError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_repo::FileRecord;
    use crate::{chunk_repo::ChunkRecord, setup};
    use chunkvault_common::{FileId, Sha256Digest};

    async fn seed_chunk(store: &DataStore) -> ChunkId {
        let file = FileRecord::new_uploading(
            FileId::new(),
            "hank",
            "archive.zip",
            "application/zip",
            2048,
            1,
            Sha256Digest::compute(b"archive"),
        );
        let file_id = FileId::parse(&file.file_id).unwrap();
        let chunk_id = ChunkId::new();
        let chunk = ChunkRecord::new_pending(chunk_id, file_id, 0, 2048, Sha256Digest::compute(b"c"));
        store.create_file_with_chunks(file, vec![chunk]).await.unwrap();
        chunk_id
    }

    #[tokio::test]
    async fn mark_stored_inserts_replicas_and_flips_status() {
        let store = setup().await;
        let chunk_id = seed_chunk(&store).await;
        let nodes = vec![NodeId::from("http://node-a"), NodeId::from("http://node-b")];

        store
            .mark_chunk_stored_with_replicas(&chunk_id, &nodes)
            .await
            .unwrap();

        let replicas = store.list_replicas_for_chunk(&chunk_id).await.unwrap();
        assert_eq!(replicas.len(), 2);

        let chunk: ChunkRecord = store.fetch_by(&chunk_id).await.unwrap();
        assert_eq!(chunk.status().unwrap(), ChunkStatus::Stored);
    }

    #[tokio::test]
    async fn retrying_the_same_placement_does_not_duplicate_replicas() {
        let store = setup().await;
        let chunk_id = seed_chunk(&store).await;
        let nodes = vec![NodeId::from("http://node-a")];

        store
            .mark_chunk_stored_with_replicas(&chunk_id, &nodes)
            .await
            .unwrap();
        store
            .mark_chunk_stored_with_replicas(&chunk_id, &nodes)
            .await
            .unwrap();

        let replicas = store.list_replicas_for_chunk(&chunk_id).await.unwrap();
        assert_eq!(replicas.len(), 1);
    }

    #[tokio::test]
    async fn marking_an_unknown_chunk_stored_fails() {
        let store = setup().await;
        let nodes = vec![NodeId::from("http://node-a")];
        let err = store
            .mark_chunk_stored_with_replicas(&ChunkId::new(), &nodes)
            .await
            .unwrap_err();
        assert!(matches!(err, DataStoreError::NotFound));
    }
}
