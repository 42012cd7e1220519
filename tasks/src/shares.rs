use chunkvault_store::DataStore;

use crate::{Result, TaskError};

/// Deletes every Share row whose `expires_at` has passed (§4.4 ExpireShares,
/// run daily at `SHARE_CLEANUP_SCHEDULE`). Returns the removed count so the
/// caller can log it.
pub async fn expire_shares(store: &DataStore, now_rfc3339: &str) -> Result<u64> {
    store
        .delete_expired_shares(now_rfc3339)
        .await
        .map_err(|err| TaskError::Transient(err.to_string()))
}
