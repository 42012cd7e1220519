mod chunker;
mod download;
mod error;
mod placement;
mod upload;

pub use chunker::{split_stream, ChunkPayload, SplitFile};
pub use download::{fetch_file, fetch_shared, FileBody};
pub use error::{CoordinatorError, Result};
pub use placement::select_placement;
pub use upload::{store_file, UploadRequest};

use std::sync::Arc;

use chunkvault_cache::Cache;
use chunkvault_common::ChunkVaultConfig;
use chunkvault_store::DataStore;

/// Shared handles the three entry points (`store_file`, `fetch_file`,
/// `fetch_shared`) are built against — the coordinator's view onto the
/// Metadata Store, Chunk Cache, and storage-node fleet (§4.1). The task
/// runner's own functions (`chunkvault_tasks::replicate_chunk_with_retry`,
/// `verify_file`, `probe_nodes`) are called directly rather than through a
/// broker; see DESIGN.md for why.
#[derive(Clone)]
pub struct CoordinatorContext {
    pub store: Arc<DataStore>,
    pub cache: Arc<dyn Cache>,
    pub client: reqwest::Client,
    pub config: ChunkVaultConfig,
}

impl CoordinatorContext {
    pub fn new(store: Arc<DataStore>, cache: Arc<dyn Cache>, config: ChunkVaultConfig) -> Self {
        Self {
            store,
            cache,
            client: reqwest::Client::new(),
            config,
        }
    }
}
