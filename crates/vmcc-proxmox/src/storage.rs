//! Storage pools and content listings.

use crate::api::ProxmoxApi;
use crate::error::{ProxmoxError, ProxmoxResult};
use crate::types::{StorageContent, StorageSummary};

/// Storage queries backed by `ProxmoxApi`.
pub struct StorageManager<'a> {
    api: &'a ProxmoxApi,
}

impl<'a> StorageManager<'a> {
    pub fn new(api: &'a ProxmoxApi) -> Self {
        Self { api }
    }

    /// Datacenter-wide storage pool definitions.
    pub async fn list_storage(&self) -> ProxmoxResult<Vec<StorageSummary>> {
        self.api.get("/api2/json/storage").await
    }

    /// Storage pools visible on one node, with usage figures.
    pub async fn list_node_storage(&self, node: &str) -> ProxmoxResult<Vec<StorageSummary>> {
        if node.trim().is_empty() {
            return Err(ProxmoxError::argument("node name cannot be empty"));
        }
        self.api.get(&format!("/api2/json/nodes/{node}/storage")).await
    }

    /// Volumes stored on one storage (ISO images, templates, disks).
    pub async fn list_content(
        &self,
        node: &str,
        storage: &str,
    ) -> ProxmoxResult<Vec<StorageContent>> {
        self.api
            .get(&format!("/api2/json/nodes/{node}/storage/{storage}/content"))
            .await
    }

    /// ISO volume ids available on one storage, for CD-ROM mounting.
    pub async fn list_iso_images(&self, node: &str, storage: &str) -> ProxmoxResult<Vec<String>> {
        let content = self.list_content(node, storage).await?;
        Ok(content
            .into_iter()
            .filter(|c| c.content.as_deref() == Some("iso"))
            .map(|c| c.volid)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_node_name_fails_fast() {
        let cfg = crate::types::ProxmoxConfig {
            api_url: "https://127.0.0.1:1".into(),
            username: "root".into(),
            password: "s".into(),
            realm: "pam".into(),
            timeout_secs: 1,
        };
        let api = ProxmoxApi::new(&cfg).unwrap();
        let err = StorageManager::new(&api)
            .list_node_storage("")
            .await
            .unwrap_err();
        assert!(matches!(err, ProxmoxError::Argument(_)));
    }
}
