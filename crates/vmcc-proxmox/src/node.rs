//! Node inventory and cluster-level queries.

use crate::api::ProxmoxApi;
use crate::error::{ProxmoxError, ProxmoxResult};
use crate::types::{ClusterResource, NodeSummary, NumberOrString};

use serde::Deserialize;

/// Cluster/node queries backed by `ProxmoxApi`.
pub struct NodeManager<'a> {
    api: &'a ProxmoxApi,
}

#[derive(Debug, Deserialize)]
struct CpuModel {
    #[serde(default)]
    name: Option<String>,
}

impl<'a> NodeManager<'a> {
    pub fn new(api: &'a ProxmoxApi) -> Self {
        Self { api }
    }

    /// List all cluster nodes.
    pub async fn list_nodes(&self) -> ProxmoxResult<Vec<NodeSummary>> {
        self.api.get("/api2/json/nodes").await
    }

    /// Full status record for one node. The payload shape varies by PVE
    /// version, so it is surfaced as decoded JSON.
    pub async fn node_status(&self, node: &str) -> ProxmoxResult<serde_json::Value> {
        self.api.get(&format!("/api2/json/nodes/{node}/status")).await
    }

    /// Datacenter-wide resource listing (nodes, guests, storage, pools).
    pub async fn cluster_resources(&self) -> ProxmoxResult<Vec<ClusterResource>> {
        self.api.get("/api2/json/cluster/resources").await
    }

    /// Next free VM id suggested by the cluster.
    pub async fn next_vm_id(&self) -> ProxmoxResult<u32> {
        let raw: NumberOrString = self.api.get("/api2/json/cluster/nextid").await?;
        raw.as_u32()
            .filter(|id| *id > 0)
            .ok_or_else(|| ProxmoxError::decode("next VM id is not a positive integer", ""))
    }

    /// QEMU CPU models the node can expose to guests. Falls back to a
    /// static set when the capability endpoint reports nothing.
    pub async fn cpu_types(&self, node: &str) -> ProxmoxResult<Vec<String>> {
        let models: Option<Vec<CpuModel>> = self
            .api
            .get(&format!("/api2/json/nodes/{node}/capabilities/qemu/cpu"))
            .await?;

        match models {
            Some(models) => Ok(models.into_iter().filter_map(|m| m.name).collect()),
            None => Ok(fallback_cpu_types()),
        }
    }
}

fn fallback_cpu_types() -> Vec<String> {
    [
        "kvm64",
        "host",
        "Opteron_G1",
        "Opteron_G2",
        "Opteron_G3",
        "EPYC",
        "Nehalem",
        "Westmere",
        "SandyBridge",
        "IvyBridge",
        "Haswell",
        "Broadwell",
        "Skylake-Server",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_cpu_types_include_baseline_models() {
        let types = fallback_cpu_types();
        assert!(types.contains(&"kvm64".to_string()));
        assert!(types.contains(&"host".to_string()));
    }
}
