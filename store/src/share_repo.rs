use async_trait::async_trait;
use chunkvault_common::{FileId, ShareId, ShareToken};

use crate::{DataStore, DataStoreError, Fetch, Persist, Result, now_rfc3339};

/// Row projection of a `Share` (§3): an unguessable link granting
/// unauthenticated read access to one file, optionally time-boxed.
#[derive(sqlx::FromRow, Clone, Debug)]
pub struct ShareRecord {
    pub share_id: String,
    pub file_id: String,
    pub owner_id: String,
    pub token: String,
    pub expires_at: Option<String>,
    pub access_count: i64,
    pub created_at: String,
}

impl ShareRecord {
    pub fn new(file_id: FileId, owner_id: &str, expires_at: Option<String>) -> Self {
        Self {
            share_id: ShareId::new().to_string(),
            file_id: file_id.to_string(),
            owner_id: owner_id.to_string(),
            token: ShareToken::new().to_string(),
            expires_at,
            access_count: 0,
            created_at: now_rfc3339(),
        }
    }

    pub fn is_expired_at(&self, now_rfc3339: &str) -> bool {
        match &self.expires_at {
            Some(expiry) => expiry.as_str() <= now_rfc3339,
            None => false,
        }
    }
}

#[async_trait]
impl Persist<ShareRecord> for DataStore {
    async fn store_all(&self, items: Vec<ShareRecord>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool().begin().await?;
        for entry in items {
            sqlx::query(
                r#"INSERT INTO shares (share_id, file_id, owner_id, token, expires_at, access_count, created_at)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
            )
            .bind(entry.share_id)
            .bind(entry.file_id)
            .bind(entry.owner_id)
            .bind(entry.token)
            .bind(entry.expires_at)
            .bind(entry.access_count)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn store(&self, item: ShareRecord) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO shares (share_id, file_id, owner_id, token, expires_at, access_count, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(item.share_id)
        .bind(item.file_id)
        .bind(item.owner_id)
        .bind(item.token)
        .bind(item.expires_at)
        .bind(item.access_count)
        .bind(item.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Fetch<ShareId, ShareRecord> for DataStore {
    async fn fetch_by(&self, key: &ShareId) -> Result<ShareRecord> {
        let mut results = self.fetch_many(&[*key]).await?;
        results.pop().ok_or(DataStoreError::NotFound)
    }

    async fn fetch_many(&self, keys: &[ShareId]) -> Result<Vec<ShareRecord>> {
        if keys.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = (1..=keys.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!("SELECT * FROM shares WHERE share_id IN ({placeholders})");

        let mut query = sqlx::query_as::<_, ShareRecord>(&sql);
        for id in keys {
            query = query.bind(id.to_string());
        }
        Ok(query.fetch_all(self.pool()).await?)
    }
}

impl DataStore {
    pub async fn fetch_share_by_token(&self, token: &ShareToken) -> Result<ShareRecord> {
        sqlx::query_as::<_, ShareRecord>("SELECT * FROM shares WHERE token = $1")
            .bind(token.to_string())
            .fetch_optional(self.pool())
            .await?
            .ok_or(DataStoreError::NotFound)
    }

    /// Bumps a share's access counter after a successful `FetchShared`
    /// (§4.4). Best-effort bookkeeping, not part of the auth decision.
    pub async fn increment_share_access(&self, share_id: &ShareId) -> Result<()> {
        let rows = sqlx::query("UPDATE shares SET access_count = access_count + 1 WHERE share_id = $1")
            .bind(share_id.to_string())
            .execute(self.pool())
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(DataStoreError::NotFound);
        }
        Ok(())
    }

    /// Deletes every share whose `expires_at` has passed (§5 ExpireShares
    /// task). Returns the number of rows removed so the task can log it.
    pub async fn delete_expired_shares(&self, now_rfc3339: &str) -> Result<u64> {
        let rows = sqlx::query(
            "DELETE FROM shares WHERE expires_at IS NOT NULL AND expires_at <= $1",
        )
        .bind(now_rfc3339)
        .execute(self.pool())
        .await?
        .rows_affected();
        Ok(rows)
    }
}
