use chunkvault_cache::{get_json, Cache, CacheNamespace};
use chunkvault_common::{quorum, NodeId};
use chunkvault_tasks::{probe_nodes, NodesHealthSnapshot};
use rand::seq::SliceRandom;

use crate::error::{CoordinatorError, Result};

const NODES_HEALTH_KEY: &str = "nodes_health";

/// Chooses a placement set for one chunk (§4.1 step 3): a uniformly random
/// sample without replacement of `min(R, |healthy|)` nodes. If fewer than
/// `Q` nodes are healthy the chunk cannot possibly reach quorum, so this
/// fails fast rather than attempting a doomed write.
pub async fn select_placement(
    client: &reqwest::Client,
    cache: &dyn Cache,
    configured_nodes: &[String],
    replication_factor: u32,
) -> Result<Vec<NodeId>> {
    let healthy = healthy_node_urls(client, cache, configured_nodes).await;
    let required = quorum(replication_factor) as usize;
    if healthy.len() < required {
        return Err(CoordinatorError::QuorumUnreachable);
    }

    let wanted = (replication_factor as usize).min(healthy.len());
    let mut pool = healthy;
    pool.shuffle(&mut rand::thread_rng());
    pool.truncate(wanted);
    Ok(pool.into_iter().map(NodeId::from).collect())
}

/// Consults the cached `nodes_health` snapshot first; only falls back to a
/// live probe when the cache has nothing (cold start, or TTL expiry before
/// the next scheduled `ProbeNodes` run).
async fn healthy_node_urls(
    client: &reqwest::Client,
    cache: &dyn Cache,
    configured_nodes: &[String],
) -> Vec<String> {
    if let Some(snapshot) =
        get_json::<_, NodesHealthSnapshot>(cache, CacheNamespace::NodesHealth, NODES_HEALTH_KEY)
            .await
    {
        let healthy = snapshot.healthy_nodes();
        if !healthy.is_empty() {
            return healthy;
        }
    }

    probe_nodes(client, configured_nodes, cache)
        .await
        .healthy_nodes()
}
