use std::time::Duration;

use chunkvault_common::{ChunkId, FileId, FileStatus, Sha256Digest};
use chunkvault_store::{DataStore, DataStoreError};

use crate::{Result, TaskError};

const REPLICA_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorruptedChunk {
    pub chunk_id: ChunkId,
    pub expected_checksum: String,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    Corrupted { corrupted_chunks: Vec<CorruptedChunk> },
}

fn classify_store_error(err: DataStoreError) -> TaskError {
    match err {
        DataStoreError::Db(e) => TaskError::Transient(e.to_string()),
        DataStoreError::Migration(e) => TaskError::Fatal(e.to_string()),
        DataStoreError::NotFound => TaskError::Fatal("file row vanished mid-verification".into()),
        DataStoreError::Fatal(msg) => TaskError::Fatal(msg),
    }
}

async fn fetch_one_replica(
    client: &reqwest::Client,
    node_base_url: &str,
    chunk_id: ChunkId,
) -> Option<Vec<u8>> {
    let response = client
        .get(format!("{node_base_url}/chunk/{chunk_id}"))
        .timeout(REPLICA_FETCH_TIMEOUT)
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.bytes().await.ok().map(|b| b.to_vec())
}

/// For every Chunk of `file_id`, fetches one surviving replica, recomputes
/// its SHA-256, and compares against the stored digest (§4.4 VerifyFile).
/// Marks the File `verified` or `corrupted` and returns the corrupted-chunk
/// list with the expected checksum for each mismatch.
pub async fn verify_file(
    client: &reqwest::Client,
    store: &DataStore,
    file_id: FileId,
) -> Result<VerifyOutcome> {
    let chunks = store
        .list_chunks_for_file(&file_id)
        .await
        .map_err(classify_store_error)?;

    let mut corrupted = Vec::new();

    for chunk in chunks {
        let chunk_id = ChunkId::parse(&chunk.chunk_id)
            .map_err(|_| TaskError::Fatal("malformed chunk id in store".into()))?;
        let expected_checksum = hex::encode(&chunk.digest);

        let replicas = store
            .list_replicas_for_chunk(&chunk_id)
            .await
            .map_err(classify_store_error)?;

        let mut recovered = None;
        for replica in &replicas {
            if let Some(bytes) = fetch_one_replica(client, &replica.node_id, chunk_id).await {
                recovered = Some(bytes);
                break;
            }
        }

        match recovered {
            Some(bytes) => {
                let digest = Sha256Digest::compute(&bytes);
                if digest.to_hex() != expected_checksum {
                    corrupted.push(CorruptedChunk {
                        chunk_id,
                        expected_checksum,
                        error: None,
                    });
                }
            }
            None => corrupted.push(CorruptedChunk {
                chunk_id,
                expected_checksum,
                error: Some("chunk_not_found".to_string()),
            }),
        }
    }

    let status = if corrupted.is_empty() {
        FileStatus::Verified
    } else {
        FileStatus::Corrupted
    };
    store
        .update_file_status(&file_id, status)
        .await
        .map_err(classify_store_error)?;

    if corrupted.is_empty() {
        Ok(VerifyOutcome::Verified)
    } else {
        Ok(VerifyOutcome::Corrupted {
            corrupted_chunks: corrupted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkvault_common::NodeId;
    use chunkvault_store::{ChunkRecord, FileRecord};
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn seed_file_with_chunk(store: &DataStore, node_url: &str, digest: Sha256Digest) -> FileId {
        let file = FileRecord::new_uploading(
            FileId::new(),
            "mona",
            "f.bin",
            "application/octet-stream",
            4,
            1,
            digest,
        );
        let file_id = FileId::parse(&file.file_id).unwrap();
        let chunk_id = ChunkId::new();
        let chunk = ChunkRecord::new_pending(chunk_id, file_id, 0, 4, digest);
        store
            .create_file_with_chunks(file, vec![chunk])
            .await
            .unwrap();
        store
            .mark_chunk_stored_with_replicas(&chunk_id, &[NodeId::from(node_url)])
            .await
            .unwrap();
        file_id
    }

    #[tokio::test]
    async fn matching_bytes_transition_file_to_verified() {
        let store = DataStore::new("sqlite::memory:").await.unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex("^/chunk/.*$"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"good".to_vec()))
            .mount(&server)
            .await;

        let file_id =
            seed_file_with_chunk(&store, &server.uri(), Sha256Digest::compute(b"good")).await;

        let outcome = verify_file(&reqwest::Client::new(), &store, file_id)
            .await
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::Verified);
    }

    #[tokio::test]
    async fn mismatched_bytes_transition_file_to_corrupted() {
        let store = DataStore::new("sqlite::memory:").await.unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex("^/chunk/.*$"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"zzzz".to_vec()))
            .mount(&server)
            .await;

        let file_id =
            seed_file_with_chunk(&store, &server.uri(), Sha256Digest::compute(b"good")).await;

        let outcome = verify_file(&reqwest::Client::new(), &store, file_id)
            .await
            .unwrap();
        match outcome {
            VerifyOutcome::Corrupted { corrupted_chunks } => assert_eq!(corrupted_chunks.len(), 1),
            other => panic!("expected corrupted outcome, got {other:?}"),
        }
    }
}
