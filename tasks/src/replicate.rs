use std::time::Duration;

use chunkvault_common::{quorum, ChunkId, NodeId, Sha256Digest};
use chunkvault_store::{DataStore, DataStoreError};
use futures::future::join_all;
use serde::Deserialize;

use crate::{Result, TaskError};

/// Shape of a storage node's PUT response (node/src/lib.rs's `PutResponse`).
/// Only the field this module cares about is named; unknown fields are
/// ignored by serde's default struct deserialization.
#[derive(Deserialize)]
struct PutResponse {
    checksum: String,
}

/// Retry envelope for the Replicate task (§4.4): up to 3 attempts, 60-second
/// linear backoff between them.
pub const MAX_RETRIES: u32 = 3;
pub const RETRY_BACKOFF_SECS: u64 = 60;

/// Hard/soft timeouts a task-runner worker pool should enforce around a
/// single Replicate attempt (§4.4).
pub const HARD_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const SOFT_TIMEOUT: Duration = Duration::from_secs(25 * 60);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplicateOutcome {
    Stored { acknowledged: Vec<NodeId> },
    QuorumUnreachable {
        acknowledged: Vec<NodeId>,
        failed: Vec<NodeId>,
    },
}

/// Per-node PUT failure (§9A.6): a node that is merely unreachable still
/// counts toward quorum loss, but one that acknowledges with a checksum
/// that doesn't match what was sent indicates silent corruption in flight
/// and aborts the whole attempt rather than being absorbed into the count.
enum PutFailure {
    Unreachable { node: NodeId, reason: String },
    ChecksumMismatch { node: NodeId, returned: String },
}

fn classify_store_error(err: DataStoreError) -> TaskError {
    match err {
        DataStoreError::Db(e) => TaskError::Transient(e.to_string()),
        DataStoreError::Migration(e) => TaskError::Fatal(e.to_string()),
        DataStoreError::NotFound => TaskError::Fatal("chunk row vanished mid-replication".into()),
        DataStoreError::Fatal(msg) => TaskError::Fatal(msg),
    }
}

/// Performs concurrent PUTs of `payload` to every node in `nodes`, then
/// records the outcome against the store. Success iff the acknowledged
/// count reaches `Q = floor(R/2) + 1` (§4.4). This single attempt is what
/// [`crate::TaskError::Transient`] retries wrap — individual node failures
/// are absorbed into the quorum count, not retried node-by-node.
pub async fn replicate_chunk(
    client: &reqwest::Client,
    store: &DataStore,
    chunk_id: ChunkId,
    payload: bytes::Bytes,
    nodes: &[NodeId],
    replication_factor: u32,
    node_timeout: Duration,
) -> Result<ReplicateOutcome> {
    let expected_checksum = Sha256Digest::compute(&payload).to_hex();

    let puts = nodes.iter().map(|node| {
        let client = client.clone();
        let payload = payload.clone();
        let node = node.clone();
        let expected_checksum = expected_checksum.clone();
        async move {
            let url = format!("{}/chunk/{}", node.as_str(), chunk_id);
            let result = client
                .post(url)
                .timeout(node_timeout)
                .body(payload)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {
                    match response.json::<PutResponse>().await {
                        Ok(body) if body.checksum == expected_checksum => Ok(node),
                        Ok(body) => Err(PutFailure::ChecksumMismatch {
                            node,
                            returned: body.checksum,
                        }),
                        Err(err) => Err(PutFailure::Unreachable {
                            node,
                            reason: format!("malformed put response: {err}"),
                        }),
                    }
                }
                Ok(response) => Err(PutFailure::Unreachable {
                    node,
                    reason: format!("status {}", response.status()),
                }),
                Err(err) => Err(PutFailure::Unreachable {
                    node,
                    reason: err.to_string(),
                }),
            }
        }
    });

    let outcomes = join_all(puts).await;
    let mut acknowledged = Vec::new();
    let mut failed = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(node) => acknowledged.push(node),
            Err(PutFailure::ChecksumMismatch { node, returned }) => {
                store
                    .mark_chunk_failed(&chunk_id)
                    .await
                    .map_err(classify_store_error)?;
                return Err(TaskError::Fatal(format!(
                    "node {node} returned checksum {returned} for chunk {chunk_id}, expected {expected_checksum}"
                )));
            }
            Err(PutFailure::Unreachable { node, reason }) => {
                log::warn!("chunk {chunk_id} replication to {node} failed: {reason}");
                failed.push(node);
            }
        }
    }

    let needed = quorum(replication_factor) as usize;
    if acknowledged.len() >= needed {
        store
            .mark_chunk_stored_with_replicas(&chunk_id, &acknowledged)
            .await
            .map_err(classify_store_error)?;
        Ok(ReplicateOutcome::Stored { acknowledged })
    } else {
        store
            .mark_chunk_failed(&chunk_id)
            .await
            .map_err(classify_store_error)?;
        Ok(ReplicateOutcome::QuorumUnreachable {
            acknowledged,
            failed,
        })
    }
}

/// Wraps [`replicate_chunk`] with the task runner's retry policy: only a
/// [`TaskError::Transient`] result is retried, up to [`MAX_RETRIES`] times
/// with linear backoff. A `QuorumUnreachable` outcome is final and is never
/// retried by this policy — it is a committed Chunk-level failure, not a
/// broker-level one.
pub async fn replicate_chunk_with_retry(
    client: &reqwest::Client,
    store: &DataStore,
    chunk_id: ChunkId,
    payload: bytes::Bytes,
    nodes: &[NodeId],
    replication_factor: u32,
    node_timeout: Duration,
) -> Result<ReplicateOutcome> {
    let mut attempt = 0;
    loop {
        match replicate_chunk(
            client,
            store,
            chunk_id,
            payload.clone(),
            nodes,
            replication_factor,
            node_timeout,
        )
        .await
        {
            Ok(outcome) => return Ok(outcome),
            Err(TaskError::Transient(reason)) if attempt < MAX_RETRIES => {
                attempt += 1;
                log::warn!(
                    "replicate chunk {chunk_id} attempt {attempt}/{MAX_RETRIES} failed transiently: {reason}"
                );
                tokio::time::sleep(Duration::from_secs(RETRY_BACKOFF_SECS * attempt as u64)).await;
            }
            Err(err) => return Err(err),
        }
    }
}
