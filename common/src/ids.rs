use std::fmt::Display;
use std::ops::Deref;
use uuid::Uuid;

/// Opaque identity of a `File` row. Wraps a v4 UUID.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct FileId(Uuid);

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl FileId {
    pub fn new() -> Self {
        FileId(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(FileId(Uuid::parse_str(s)?))
    }
}

impl Deref for FileId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identity of a `Chunk` row. Per the storage-node wire protocol
/// (not the chunk's content digest) this is a v4 UUID, not content-addressed:
/// two chunks with identical bytes still get distinct `ChunkId`s because they
/// belong to different `(file_id, chunk_index)` slots.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ChunkId(Uuid);

impl Default for ChunkId {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkId {
    pub fn new() -> Self {
        ChunkId(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(ChunkId(Uuid::parse_str(s)?))
    }
}

impl Deref for ChunkId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a Replica row.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReplicaId(Uuid);

impl Default for ReplicaId {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicaId {
    pub fn new() -> Self {
        ReplicaId(Uuid::new_v4())
    }
}

impl Display for ReplicaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical identifier of a storage node: its configured base URL.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(base_url: impl Into<String>) -> Self {
        NodeId(base_url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

/// Identity of a Share row.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ShareId(Uuid);

impl Default for ShareId {
    fn default() -> Self {
        Self::new()
    }
}

impl ShareId {
    pub fn new() -> Self {
        ShareId(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(ShareId(Uuid::parse_str(s)?))
    }
}

impl Display for ShareId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unguessable token granting unauthenticated read access to a file.
///
/// Backed by a v4 UUID: 122 bits of randomness, comfortably over the
/// 122-bit entropy floor the data model requires of a share token.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ShareToken(Uuid);

impl Default for ShareToken {
    fn default() -> Self {
        Self::new()
    }
}

impl ShareToken {
    pub fn new() -> Self {
        ShareToken(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(ShareToken(Uuid::parse_str(s)?))
    }
}

impl Display for ShareToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Zero-based position of a chunk within a file, in `[0, chunk_count)`.
pub type ChunkIndex = u32;
