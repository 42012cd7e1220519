use std::time::Duration;

use chunkvault_cache::{Cache, CacheNamespace};
use chunkvault_common::{ChunkId, FileId, Sha256Digest};
use chunkvault_store::{now_rfc3339, ChunkRecord, Fetch, FileRecord};
use rand::seq::SliceRandom;

use crate::error::{CoordinatorError, Result};
use crate::CoordinatorContext;

const CHUNK_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// The concatenated bytes of a resolved file, in chunk-index order.
pub struct FileBody {
    pub file: FileRecord,
    pub bytes: Vec<u8>,
}

/// `FetchFile(owner, fileId) -> ByteStream | error` (§4.1).
pub async fn fetch_file(ctx: &CoordinatorContext, owner_id: &str, file_id: FileId) -> Result<FileBody> {
    let file: FileRecord = ctx.store.fetch_by(&file_id).await?;
    if file.owner_id != owner_id {
        return Err(CoordinatorError::AuthDenied);
    }
    let bytes = assemble_chunks(ctx, &file_id).await?;
    Ok(FileBody { file, bytes })
}

/// `FetchShared(token) -> ByteStream | error` (§4.1). Unlike `FetchFile`
/// this has no owner to check against — validity is the share's own
/// expiry — and a successful read bumps the share's access counter.
pub async fn fetch_shared(ctx: &CoordinatorContext, token: &chunkvault_common::ShareToken) -> Result<FileBody> {
    let share = ctx.store.fetch_share_by_token(token).await?;
    let now = now_rfc3339();
    if share.is_expired_at(&now) {
        return Err(CoordinatorError::Expired);
    }

    let share_id = chunkvault_common::ShareId::parse(&share.share_id)
        .map_err(|_| CoordinatorError::Fatal("malformed share id in store".into()))?;
    let file_id = FileId::parse(&share.file_id)
        .map_err(|_| CoordinatorError::Fatal("malformed file id in store".into()))?;

    let file: FileRecord = ctx.store.fetch_by(&file_id).await?;
    let bytes = assemble_chunks(ctx, &file_id).await?;
    ctx.store.increment_share_access(&share_id).await?;
    Ok(FileBody { file, bytes })
}

/// Resolves every Chunk of `file_id` in ascending index order: cache first,
/// then a shuffled walk of its Replica nodes, treating a digest mismatch as
/// a miss rather than a hard failure (§4.1 download path, §4.5 ChunkData
/// namespace).
async fn assemble_chunks(ctx: &CoordinatorContext, file_id: &FileId) -> Result<Vec<u8>> {
    let chunks = ctx.store.list_chunks_for_file(file_id).await?;
    let mut body = Vec::new();
    for chunk in chunks {
        let bytes = resolve_chunk(ctx, &chunk).await?;
        body.extend_from_slice(&bytes);
    }
    Ok(body)
}

async fn resolve_chunk(ctx: &CoordinatorContext, chunk: &ChunkRecord) -> Result<Vec<u8>> {
    let chunk_id = ChunkId::parse(&chunk.chunk_id)
        .map_err(|_| CoordinatorError::Fatal("malformed chunk id in store".into()))?;
    let expected = chunk
        .digest()
        .ok_or_else(|| CoordinatorError::Fatal("malformed chunk digest in store".into()))?;
    let cache_key = chunk_id.to_string();

    if let Some(bytes) = ctx.cache.get(CacheNamespace::ChunkData, &cache_key).await {
        if Sha256Digest::compute(&bytes) == expected {
            return Ok(bytes);
        }
    }

    let mut replicas = ctx.store.list_replicas_for_chunk(&chunk_id).await?;
    replicas.shuffle(&mut rand::thread_rng());

    for replica in replicas {
        if let Some(bytes) = fetch_from_node(ctx, &replica.node_id, chunk_id).await {
            if Sha256Digest::compute(&bytes) == expected {
                ctx.cache
                    .set(CacheNamespace::ChunkData, &cache_key, bytes.clone())
                    .await;
                return Ok(bytes);
            }
            log::warn!("chunk {chunk_id} replica at {} failed digest check", replica.node_id);
        }
    }

    Err(CoordinatorError::ChunkUnavailable)
}

async fn fetch_from_node(ctx: &CoordinatorContext, node_base_url: &str, chunk_id: ChunkId) -> Option<Vec<u8>> {
    let response = ctx
        .client
        .get(format!("{node_base_url}/chunk/{chunk_id}"))
        .timeout(CHUNK_FETCH_TIMEOUT)
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.bytes().await.ok().map(|b| b.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::{store_file, UploadRequest};
    use chunkvault_cache::InMemoryCache;
    use chunkvault_common::ChunkVaultConfig;
    use chunkvault_store::DataStore;
    use std::sync::Arc;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    #[derive(serde::Serialize)]
    struct FakePutResponse {
        chunk_id: String,
        checksum: String,
        size: usize,
        status: &'static str,
    }

    fn stored_response(request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(FakePutResponse {
            chunk_id: "ignored".to_string(),
            checksum: Sha256Digest::compute(&request.body).to_hex(),
            size: request.body.len(),
            status: "stored",
        })
    }

    async fn uploaded_fixture(data: &[u8]) -> (CoordinatorContext, FileId, Vec<MockServer>) {
        let mut servers = Vec::new();
        for _ in 0..3 {
            let server = MockServer::start().await;
            servers.push(server);
        }
        for server in &servers {
            Mock::given(method("POST"))
                .and(path_regex("^/chunk/.*$"))
                .respond_with(stored_response)
                .mount(server)
                .await;
        }

        let store = DataStore::new("sqlite::memory:").await.unwrap();
        let cache = InMemoryCache::default();
        let mut config = ChunkVaultConfig::default();
        config.chunk_size = 4 * 1024 * 1024;
        config.replication_factor = 3;
        config.storage_nodes = servers.iter().map(|s| s.uri()).collect();
        config.fan_out = 4;
        let ctx = CoordinatorContext {
            store: Arc::new(store),
            cache: Arc::new(cache),
            client: reqwest::Client::new(),
            config,
        };

        let file_id = store_file(
            &ctx,
            UploadRequest {
                owner_id: "rana".to_string(),
                name: "f.bin".to_string(),
                mime: "application/octet-stream".to_string(),
            },
            data,
        )
        .await
        .unwrap();

        for server in &servers {
            Mock::given(method("GET"))
                .and(path_regex("^/chunk/.*$"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(data.to_vec()))
                .mount(server)
                .await;
        }

        (ctx, file_id, servers)
    }

    #[tokio::test]
    async fn download_reassembles_bytes_in_order() {
        let data = vec![0x09u8; 1024];
        let (ctx, file_id, _servers) = uploaded_fixture(&data).await;

        let body = fetch_file(&ctx, "rana", file_id).await.unwrap();
        assert_eq!(body.bytes, data);
    }

    #[tokio::test]
    async fn wrong_owner_is_denied() {
        let data = vec![0x0Au8; 256];
        let (ctx, file_id, _servers) = uploaded_fixture(&data).await;

        let err = fetch_file(&ctx, "someone-else", file_id).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::AuthDenied));
    }

    #[tokio::test]
    async fn survives_loss_of_all_but_one_replica() {
        let data = vec![0x0Bu8; 256];
        let (ctx, file_id, servers) = uploaded_fixture(&data).await;

        for server in &servers[..2] {
            server.reset().await;
            Mock::given(method("GET"))
                .and(path_regex("^/chunk/.*$"))
                .respond_with(ResponseTemplate::new(404))
                .mount(server)
                .await;
        }

        let body = fetch_file(&ctx, "rana", file_id).await.unwrap();
        assert_eq!(body.bytes, data);
    }
}
