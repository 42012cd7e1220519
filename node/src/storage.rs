use std::path::{Path, PathBuf};

use chunkvault_common::{ChunkId, Sha256Digest};
use thiserror::Error;

/// Hard ceiling on a single chunk body (§4.3, §6).
pub const MAX_CHUNK_SIZE: usize = 100 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("chunk payload of {0} bytes exceeds the node limit of {1} bytes")]
    TooLarge(usize, usize),
    #[error("chunk not found")]
    NotFound,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Clone, Copy, Debug, Default, serde::Serialize)]
pub struct ChunkInfo {
    pub size: u64,
    pub exists: bool,
}

#[derive(Clone, Copy, Debug, Default, serde::Serialize)]
pub struct StorageStats {
    pub used_bytes: u64,
    pub chunk_count: u64,
    pub free_bytes: u64,
}

/// A content-addressed blob store with no knowledge of files (§4.3): the
/// node only ever sees a chunk id and its bytes. Entries are sharded under a
/// two-character prefix of the chunk id so no single directory accumulates
/// an unbounded entry count.
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn shard_dir(&self, chunk_id: &ChunkId) -> PathBuf {
        let id = chunk_id.to_string();
        self.root.join(&id[..2])
    }

    fn chunk_path(&self, chunk_id: &ChunkId) -> PathBuf {
        self.shard_dir(chunk_id).join(chunk_id.to_string())
    }

    /// Writes a chunk's bytes, returning their SHA-256 digest. Overwrites
    /// any existing blob at the same id: concurrent PUTs of the same id
    /// converge because, by construction, identical ids carry identical
    /// payloads (§4.3).
    pub async fn put(&self, chunk_id: &ChunkId, bytes: &[u8]) -> Result<Sha256Digest> {
        if bytes.len() > MAX_CHUNK_SIZE {
            return Err(StorageError::TooLarge(bytes.len(), MAX_CHUNK_SIZE));
        }
        tokio::fs::create_dir_all(self.shard_dir(chunk_id)).await?;
        tokio::fs::write(self.chunk_path(chunk_id), bytes).await?;
        Ok(Sha256Digest::compute(bytes))
    }

    pub async fn get(&self, chunk_id: &ChunkId) -> Result<Vec<u8>> {
        match tokio::fs::read(self.chunk_path(chunk_id)).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Best-effort unlink (§4.3): deleting an already-absent chunk is not
    /// an error.
    pub async fn delete(&self, chunk_id: &ChunkId) -> Result<()> {
        match tokio::fs::remove_file(self.chunk_path(chunk_id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    pub async fn info(&self, chunk_id: &ChunkId) -> Result<ChunkInfo> {
        match tokio::fs::metadata(self.chunk_path(chunk_id)).await {
            Ok(meta) => Ok(ChunkInfo {
                size: meta.len(),
                exists: true,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Walks every shard directory to total used bytes and chunk count, and
    /// reports free space on the backing volume (§4.3 health/stats).
    pub async fn stats(&self) -> Result<StorageStats> {
        let root = self.root.clone();
        let (used_bytes, chunk_count) = tokio::task::spawn_blocking(move || walk_dir(&root))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        let free_bytes = free_space(&self.root);

        Ok(StorageStats {
            used_bytes,
            chunk_count,
            free_bytes,
        })
    }
}

fn walk_dir(root: &Path) -> std::result::Result<(u64, u64), std::io::Error> {
    let mut used = 0u64;
    let mut count = 0u64;
    if !root.exists() {
        return Ok((0, 0));
    }
    for shard in std::fs::read_dir(root)? {
        let shard = shard?;
        if !shard.file_type()?.is_dir() {
            continue;
        }
        for entry in std::fs::read_dir(shard.path())? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                used += entry.metadata()?.len();
                count += 1;
            }
        }
    }
    Ok((used, count))
}

fn free_space(root: &Path) -> u64 {
    use sysinfo::Disks;
    let disks = Disks::new_with_refreshed_list();
    disks
        .iter()
        .filter(|d| root.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .map(|d| d.available_space())
        .unwrap_or(0)
}
