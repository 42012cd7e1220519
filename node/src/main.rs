use std::path::PathBuf;

use anyhow::Result;
use chunkvault_node::{router, BlobStore, NodeState};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let node_id = std::env::var("NODE_ID").unwrap_or_else(|_| "node-1".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8001);
    let storage_path = std::env::var("STORAGE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./storage"));

    std::fs::create_dir_all(&storage_path)?;
    log::info!("storage node {node_id} starting, storage path {storage_path:?}");

    let state = NodeState::new(node_id, BlobStore::new(storage_path));
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    log::info!("listening on {host}:{port}");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
