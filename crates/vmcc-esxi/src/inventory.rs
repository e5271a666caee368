//! Host, datastore and network inventory.

use crate::client::EsxiClient;
use crate::error::{EsxiError, EsxiResult};
use crate::types::{DatastoreSummary, HostSummary, NetworkSummary, SystemVersion};

/// Inventory queries backed by `EsxiClient`.
pub struct InventoryManager<'a> {
    client: &'a EsxiClient,
}

impl<'a> InventoryManager<'a> {
    pub fn new(client: &'a EsxiClient) -> Self {
        Self { client }
    }

    /// Appliance / system version record; also serves as the
    /// connection-validation probe right after login.
    pub async fn system_version(&self) -> EsxiResult<SystemVersion> {
        self.client.get("/rest/appliance/system/version").await
    }

    pub async fn list_hosts(&self) -> EsxiResult<Vec<HostSummary>> {
        self.client.get("/rest/vcenter/host").await
    }

    /// Detail record for one host; loosely shaped across versions.
    pub async fn get_host(&self, host_id: &str) -> EsxiResult<serde_json::Value> {
        if host_id.trim().is_empty() {
            return Err(EsxiError::argument("host id cannot be empty"));
        }
        self.client.get(&format!("/rest/vcenter/host/{host_id}")).await
    }

    pub async fn list_datastores(&self) -> EsxiResult<Vec<DatastoreSummary>> {
        self.client.get("/rest/vcenter/datastore").await
    }

    pub async fn list_networks(&self) -> EsxiResult<Vec<NetworkSummary>> {
        self.client.get("/rest/vcenter/network").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EsxiConfig;

    #[tokio::test]
    async fn empty_host_id_fails_fast() {
        let client = EsxiClient::new(&EsxiConfig {
            host: "127.0.0.1".into(),
            port: 1,
            username: "root".into(),
            password: "s".into(),
            timeout_secs: 1,
        })
        .unwrap();
        let err = InventoryManager::new(&client).get_host("").await.unwrap_err();
        assert!(matches!(err, EsxiError::Argument(_)));
    }
}
