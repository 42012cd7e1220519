use std::time::Duration;

/// The five cache namespaces defined by §4.5, each carrying its own TTL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    ChunkData,
    FileMetadata,
    UserFiles,
    ShareInfo,
    NodesHealth,
}

impl CacheNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::ChunkData => "chunk_data",
            CacheNamespace::FileMetadata => "file_metadata",
            CacheNamespace::UserFiles => "user_files",
            CacheNamespace::ShareInfo => "share_info",
            CacheNamespace::NodesHealth => "nodes_health",
        }
    }

    /// Default TTL per §4.5's table. Callers building a cache from
    /// `CacheTtls` config should prefer those values; this is the fallback
    /// for call sites (tests, ad hoc tooling) that don't thread config
    /// through.
    pub fn default_ttl(&self) -> Duration {
        match self {
            CacheNamespace::ChunkData => Duration::from_secs(3600),
            CacheNamespace::FileMetadata => Duration::from_secs(600),
            CacheNamespace::UserFiles => Duration::from_secs(300),
            CacheNamespace::ShareInfo => Duration::from_secs(1800),
            CacheNamespace::NodesHealth => Duration::from_secs(300),
        }
    }
}

impl std::fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
