mod storage;

pub use storage::{BlobStore, ChunkInfo, StorageError, StorageStats, MAX_CHUNK_SIZE};

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chunkvault_common::ChunkId;
use serde::Serialize;

#[derive(Clone)]
pub struct NodeState {
    pub node_id: String,
    store: Arc<BlobStore>,
}

impl NodeState {
    pub fn new(node_id: impl Into<String>, store: BlobStore) -> Self {
        Self {
            node_id: node_id.into(),
            store: Arc::new(store),
        }
    }
}

/// Builds the storage-node HTTP surface (§4.3, §6): a fixed, unauthenticated
/// wire contract, trusted-network only.
pub fn router(state: NodeState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/storage/stats", get(stats))
        .route(
            "/chunk/{chunk_id}",
            post(put_chunk).get(get_chunk).delete(delete_chunk),
        )
        .route("/chunk/{chunk_id}/info", get(chunk_info))
        .with_state(state)
}

#[derive(Serialize)]
struct RootResponse {
    message: String,
    node_id: String,
}

async fn root(State(state): State<NodeState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: format!("chunkvault storage node {}", state.node_id),
        node_id: state.node_id,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    node_id: String,
    storage_stats: Option<StorageStats>,
}

async fn health(State(state): State<NodeState>) -> Json<HealthResponse> {
    match state.store.stats().await {
        Ok(stats) => Json(HealthResponse {
            status: "healthy",
            node_id: state.node_id,
            storage_stats: Some(stats),
        }),
        Err(err) => {
            log::warn!("node {} health probe failed: {err}", state.node_id);
            Json(HealthResponse {
                status: "unhealthy",
                node_id: state.node_id,
                storage_stats: None,
            })
        }
    }
}

#[derive(Serialize)]
struct StatsResponse {
    node_id: String,
    storage_stats: StorageStats,
}

async fn stats(State(state): State<NodeState>) -> Result<Json<StatsResponse>, ApiError> {
    let storage_stats = state.store.stats().await?;
    Ok(Json(StatsResponse {
        node_id: state.node_id,
        storage_stats,
    }))
}

#[derive(Serialize)]
struct PutResponse {
    chunk_id: String,
    checksum: String,
    size: usize,
    status: &'static str,
}

async fn put_chunk(
    State(state): State<NodeState>,
    Path(chunk_id): Path<String>,
    body: Bytes,
) -> Result<Json<PutResponse>, ApiError> {
    let chunk_id = ChunkId::parse(&chunk_id).map_err(|_| ApiError::BadChunkId)?;
    let digest = state.store.put(&chunk_id, &body).await?;
    Ok(Json(PutResponse {
        chunk_id: chunk_id.to_string(),
        checksum: digest.to_hex(),
        size: body.len(),
        status: "stored",
    }))
}

async fn get_chunk(
    State(state): State<NodeState>,
    Path(chunk_id): Path<String>,
) -> Result<Response, ApiError> {
    let chunk_id = ChunkId::parse(&chunk_id).map_err(|_| ApiError::BadChunkId)?;
    let bytes = state.store.get(&chunk_id).await?;
    Ok((
        StatusCode::OK,
        [
            ("content-type", "application/octet-stream".to_string()),
            ("x-chunk-id", chunk_id.to_string()),
            ("x-chunk-size", bytes.len().to_string()),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Serialize)]
struct DeleteResponse {
    chunk_id: String,
    status: &'static str,
}

async fn delete_chunk(
    State(state): State<NodeState>,
    Path(chunk_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let chunk_id = ChunkId::parse(&chunk_id).map_err(|_| ApiError::BadChunkId)?;
    state.store.delete(&chunk_id).await?;
    Ok(Json(DeleteResponse {
        chunk_id: chunk_id.to_string(),
        status: "deleted",
    }))
}

#[derive(Serialize)]
struct ChunkInfoResponse {
    chunk_id: String,
    size: u64,
    exists: bool,
}

async fn chunk_info(
    State(state): State<NodeState>,
    Path(chunk_id): Path<String>,
) -> Result<Json<ChunkInfoResponse>, ApiError> {
    let parsed = ChunkId::parse(&chunk_id).map_err(|_| ApiError::BadChunkId)?;
    let info = state.store.info(&parsed).await?;
    Ok(Json(ChunkInfoResponse {
        chunk_id: parsed.to_string(),
        size: info.size,
        exists: info.exists,
    }))
}

enum ApiError {
    BadChunkId,
    NotFound,
    TooLarge,
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => ApiError::NotFound,
            StorageError::TooLarge(_, _) => ApiError::TooLarge,
            StorageError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadChunkId => (StatusCode::BAD_REQUEST, "malformed chunk id".to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "chunk not found".to_string()),
            ApiError::TooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("chunk exceeds the {MAX_CHUNK_SIZE}-byte node limit"),
            ),
            ApiError::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(serde_json::json!({ "detail": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state() -> (tempfile::TempDir, NodeState) {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        (dir, NodeState::new("node-1", store))
    }

    #[tokio::test]
    async fn put_then_get_round_trips_through_http() {
        let (_dir, state) = state();
        let app = router(state);
        let chunk_id = ChunkId::new();

        let put_req = Request::builder()
            .method("POST")
            .uri(format!("/chunk/{chunk_id}"))
            .body(Body::from("hello chunk"))
            .unwrap();
        let put_res = app.clone().oneshot(put_req).await.unwrap();
        assert_eq!(put_res.status(), StatusCode::OK);

        let get_req = Request::builder()
            .uri(format!("/chunk/{chunk_id}"))
            .body(Body::empty())
            .unwrap();
        let get_res = app.oneshot(get_req).await.unwrap();
        assert_eq!(get_res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_missing_chunk_is_404() {
        let (_dir, state) = state();
        let app = router(state);
        let req = Request::builder()
            .uri(format!("/chunk/{}", ChunkId::new()))
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_chunk_id_is_400() {
        let (_dir, state) = state();
        let app = router(state);
        let req = Request::builder()
            .uri("/chunk/not-a-uuid")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
