use std::fmt::Display;

/// Lifecycle of a `File` row (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Uploading,
    Completed,
    Failed,
    Verified,
    Corrupted,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Uploading => "uploading",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
            FileStatus::Verified => "verified",
            FileStatus::Corrupted => "corrupted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "uploading" => FileStatus::Uploading,
            "completed" => FileStatus::Completed,
            "failed" => FileStatus::Failed,
            "verified" => FileStatus::Verified,
            "corrupted" => FileStatus::Corrupted,
            _ => return None,
        })
    }

    /// A `completed` or `verified` file has every chunk `stored` (invariant 5).
    pub fn requires_all_chunks_stored(&self) -> bool {
        matches!(self, FileStatus::Completed | FileStatus::Verified)
    }
}

impl Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a `Chunk` row (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Pending,
    Stored,
    Failed,
}

impl ChunkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStatus::Pending => "pending",
            ChunkStatus::Stored => "stored",
            ChunkStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => ChunkStatus::Pending,
            "stored" => ChunkStatus::Stored,
            "failed" => ChunkStatus::Failed,
            _ => return None,
        })
    }
}

impl Display for ChunkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
