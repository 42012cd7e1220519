use thiserror::Error;

/// Caller-visible error kinds (§7). `Transient` is handled entirely inside
/// the task runner and never reaches this layer; a `Fatal` here means an
/// invariant was violated and the operation aborted without a caller-facing
/// recovery path.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("caller is not authorized for the requested file")]
    AuthDenied,
    #[error("no such file, chunk, or share")]
    NotFound,
    #[error("share link has expired")]
    Expired,
    #[error("fewer than quorum storage nodes acknowledged the write")]
    QuorumUnreachable,
    #[error("no replica returned a digest-valid payload for a chunk")]
    ChunkUnavailable,
    #[error("verification found a chunk digest mismatch")]
    IntegrityMismatch,
    #[error("invariant violation: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;

impl From<chunkvault_store::DataStoreError> for CoordinatorError {
    fn from(err: chunkvault_store::DataStoreError) -> Self {
        match err {
            chunkvault_store::DataStoreError::NotFound => CoordinatorError::NotFound,
            other => CoordinatorError::Fatal(other.to_string()),
        }
    }
}

impl From<chunkvault_tasks::TaskError> for CoordinatorError {
    fn from(err: chunkvault_tasks::TaskError) -> Self {
        CoordinatorError::Fatal(err.to_string())
    }
}
