use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chunkvault_common::{ChunkId, FileId};
use chunkvault_store::{ChunkRecord, FileRecord};
use chunkvault_tasks::{replicate_chunk_with_retry, ReplicateOutcome};
use chunkvault_common::FileStatus;
use futures::stream::{self, StreamExt};
use tokio::io::AsyncRead;

use crate::chunker::{split_stream, ChunkPayload};
use crate::error::{CoordinatorError, Result};
use crate::placement::select_placement;
use crate::CoordinatorContext;

pub struct UploadRequest {
    pub owner_id: String,
    pub name: String,
    pub mime: String,
}

/// `StoreFile(owner, name, mime, byteStream) -> FileId | error` (§4.1).
pub async fn store_file<R: AsyncRead + Unpin>(
    ctx: &CoordinatorContext,
    request: UploadRequest,
    reader: R,
) -> Result<FileId> {
    let split = split_stream(reader, ctx.config.chunk_size)
        .await
        .map_err(|e| CoordinatorError::Fatal(e.to_string()))?;

    let file_id = FileId::new();
    let chunk_count = split.chunks.len() as u32;
    let file = FileRecord::new_uploading(
        file_id,
        &request.owner_id,
        &request.name,
        &request.mime,
        split.size,
        chunk_count,
        split.digest,
    );

    let assignments: Vec<(ChunkId, ChunkPayload)> = split
        .chunks
        .into_iter()
        .map(|payload| (ChunkId::new(), payload))
        .collect();

    let chunk_rows: Vec<ChunkRecord> = assignments
        .iter()
        .map(|(chunk_id, payload)| {
            ChunkRecord::new_pending(
                *chunk_id,
                file_id,
                payload.index,
                payload.bytes.len() as u64,
                payload.digest,
            )
        })
        .collect();

    ctx.store.create_file_with_chunks(file, chunk_rows).await?;

    if assignments.is_empty() {
        ctx.store
            .update_file_status(&file_id, FileStatus::Completed)
            .await?;
        return Ok(file_id);
    }

    let aborted = Arc::new(AtomicBool::new(false));
    let fan_out = ctx.config.fan_out.max(1);
    let deadline = Duration::from_secs(ctx.config.chunk_upload_deadline_secs);

    let results: Vec<bool> = stream::iter(assignments.into_iter())
        .map(|(chunk_id, payload)| {
            let ctx = ctx.clone();
            let aborted = aborted.clone();
            async move {
                if aborted.load(Ordering::Acquire) {
                    return false;
                }
                let outcome = replicate_one_chunk(&ctx, chunk_id, payload, deadline).await;
                let stored = matches!(outcome, Ok(ReplicateOutcome::Stored { .. }));
                if !stored {
                    aborted.store(true, Ordering::Release);
                }
                stored
            }
        })
        .buffer_unordered(fan_out)
        .collect()
        .await;

    if results.iter().all(|stored| *stored) {
        ctx.store
            .update_file_status(&file_id, FileStatus::Completed)
            .await?;
        Ok(file_id)
    } else {
        ctx.store
            .update_file_status(&file_id, FileStatus::Failed)
            .await?;
        Err(CoordinatorError::QuorumUnreachable)
    }
}

async fn replicate_one_chunk(
    ctx: &CoordinatorContext,
    chunk_id: ChunkId,
    payload: ChunkPayload,
    deadline: Duration,
) -> Result<ReplicateOutcome> {
    let nodes = match select_placement(
        &ctx.client,
        ctx.cache.as_ref(),
        &ctx.config.storage_nodes,
        ctx.config.replication_factor,
    )
    .await
    {
        Ok(nodes) => nodes,
        Err(err) => {
            ctx.store.mark_chunk_failed(&chunk_id).await?;
            return Err(err);
        }
    };

    let node_timeout = Duration::from_secs(ctx.config.node_request_timeout_secs);
    let attempt = replicate_chunk_with_retry(
        &ctx.client,
        &ctx.store,
        chunk_id,
        payload.bytes,
        &nodes,
        ctx.config.replication_factor,
        node_timeout,
    );

    match tokio::time::timeout(deadline, attempt).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            ctx.store.mark_chunk_failed(&chunk_id).await?;
            Err(CoordinatorError::QuorumUnreachable)
        }
    }
}
