//! Node network interface management.

use crate::api::ProxmoxApi;
use crate::error::ProxmoxResult;
use crate::node::NodeManager;
use crate::types::NetworkInterface;

use std::collections::BTreeMap;

/// Network queries and changes backed by `ProxmoxApi`.
pub struct NetworkManager<'a> {
    api: &'a ProxmoxApi,
}

impl<'a> NetworkManager<'a> {
    pub fn new(api: &'a ProxmoxApi) -> Self {
        Self { api }
    }

    /// Network interfaces configured on one node.
    pub async fn list_interfaces(&self, node: &str) -> ProxmoxResult<Vec<NetworkInterface>> {
        self.api.get(&format!("/api2/json/nodes/{node}/network")).await
    }

    /// Network interfaces across every node.
    pub async fn list_all_interfaces(&self) -> ProxmoxResult<Vec<NetworkInterface>> {
        let nodes = NodeManager::new(self.api).list_nodes().await?;
        let mut all = Vec::new();
        for node in nodes {
            all.extend(self.list_interfaces(&node.node).await?);
        }
        Ok(all)
    }

    /// Create or reconfigure a node network interface from a key/value
    /// config map (`iface`, `type`, `bridge_ports`, `cidr`, …).
    pub async fn configure_interface(
        &self,
        node: &str,
        config: &BTreeMap<String, String>,
    ) -> ProxmoxResult<()> {
        let params: Vec<(String, String)> = config
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.api
            .post_form(&format!("/api2/json/nodes/{node}/network"), &params)
            .await
    }
}
