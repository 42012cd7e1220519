mod nodes;
mod replicate;
mod schedule;
mod shares;
mod verify;

pub use nodes::{probe_nodes, NodeHealth, NodesHealthSnapshot};
pub use replicate::{
    replicate_chunk, replicate_chunk_with_retry, ReplicateOutcome, HARD_TIMEOUT, MAX_RETRIES,
    RETRY_BACKOFF_SECS, SOFT_TIMEOUT,
};
pub use schedule::{next_fire, PeriodicSchedule};
pub use shares::expire_shares;
pub use verify::{verify_file, CorruptedChunk, VerifyOutcome};

use thiserror::Error;

/// Errors raised by task handlers themselves, distinct from §7's
/// caller-visible `CoordinatorError` taxonomy. A `Transient` error here is
/// exactly the kind the retry policy is built to absorb; it never escapes
/// the task runner.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("store error: {0}")]
    Store(#[from] chunkvault_store::DataStoreError),
    #[error("invariant violation: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, TaskError>;
