use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chunkvault_cache::{set_json, Cache, CacheNamespace};
use serde::{Deserialize, Serialize};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed cache key nodes_health is stored under (§4.4 ProbeNodes).
const NODES_HEALTH_KEY: &str = "nodes_health";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeHealth {
    Healthy { latency_ms: u64 },
    Unhealthy { status_code: u16 },
    Offline { error: String },
}

impl NodeHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, NodeHealth::Healthy { .. })
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodesHealthSnapshot {
    pub nodes: BTreeMap<String, NodeHealth>,
}

impl NodesHealthSnapshot {
    pub fn healthy_nodes(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(_, health)| health.is_healthy())
            .map(|(url, _)| url.clone())
            .collect()
    }
}

/// Issues a health GET (10 s timeout) to each configured node, records
/// status and latency, and writes the aggregate snapshot into the Chunk
/// Cache under the fixed key `nodes_health` (§4.4).
pub async fn probe_nodes(
    client: &reqwest::Client,
    node_urls: &[String],
    cache: &dyn Cache,
) -> NodesHealthSnapshot {
    let mut nodes = BTreeMap::new();

    for url in node_urls {
        let started = Instant::now();
        let health = match client
            .get(format!("{url}/health"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => NodeHealth::Healthy {
                latency_ms: started.elapsed().as_millis() as u64,
            },
            Ok(response) => NodeHealth::Unhealthy {
                status_code: response.status().as_u16(),
            },
            Err(err) => NodeHealth::Offline {
                error: err.to_string(),
            },
        };
        nodes.insert(url.clone(), health);
    }

    let snapshot = NodesHealthSnapshot { nodes };
    set_json(cache, CacheNamespace::NodesHealth, NODES_HEALTH_KEY, &snapshot).await;
    snapshot
}
