//! Aggregate service façade for the ESXi crate.
//!
//! `EsxiService` owns the `EsxiClient` and exposes every domain
//! operation to the (external) UI layer, delegating to the managers.

use crate::client::EsxiClient;
use crate::error::EsxiResult;
use crate::inventory::InventoryManager;
use crate::types::*;
use crate::vm::VmManager;

/// Top-level service that aggregates all ESXi subsystems.
pub struct EsxiService {
    client: EsxiClient,
}

impl EsxiService {
    /// Build a disconnected service from config.
    pub fn new(config: &EsxiConfig) -> EsxiResult<Self> {
        Ok(Self {
            client: EsxiClient::new(config)?,
        })
    }

    /// Borrow the underlying API client.
    pub fn client(&self) -> &EsxiClient {
        &self.client
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Perform the login handshake and validate the connection with a
    /// system-info probe. Must be called once before any other
    /// operation.
    pub async fn initialize(&self) -> EsxiResult<SystemVersion> {
        self.client.authenticate().await?;
        InventoryManager::new(&self.client).system_version().await
    }

    /// Release the client: best-effort server-side logout, exactly
    /// once. Idempotent; any later call fails with the disposed error.
    pub async fn dispose(&self) {
        self.client.dispose().await;
    }

    // ── VMs ─────────────────────────────────────────────────────────

    pub async fn list_vms(&self) -> EsxiResult<Vec<VmSummary>> {
        VmManager::new(&self.client).list_vms().await
    }

    pub async fn get_vm(&self, vm_id: &str) -> EsxiResult<serde_json::Value> {
        VmManager::new(&self.client).get_vm(vm_id).await
    }

    pub async fn create_vm(&self, spec: &EsxiVmSpec) -> EsxiResult<String> {
        VmManager::new(&self.client).create_vm(spec).await
    }

    pub async fn create_multiple_vms(
        &self,
        count: usize,
        template: &EsxiVmSpec,
        name_pattern: Option<&str>,
    ) -> EsxiResult<Vec<CreateOutcome>> {
        VmManager::new(&self.client)
            .create_multiple(count, template, name_pattern)
            .await
    }

    pub async fn delete_vm(&self, vm_id: &str) -> EsxiResult<()> {
        VmManager::new(&self.client).delete_vm(vm_id).await
    }

    pub async fn power_operation(&self, vm_id: &str, action: &str) -> EsxiResult<()> {
        VmManager::new(&self.client).power_action(vm_id, action).await
    }

    pub async fn power_on_vm(&self, vm_id: &str) -> EsxiResult<()> {
        VmManager::new(&self.client).power_on(vm_id).await
    }

    pub async fn power_off_vm(&self, vm_id: &str) -> EsxiResult<()> {
        VmManager::new(&self.client).power_off(vm_id).await
    }

    pub async fn suspend_vm(&self, vm_id: &str) -> EsxiResult<()> {
        VmManager::new(&self.client).suspend(vm_id).await
    }

    pub async fn reset_vm(&self, vm_id: &str) -> EsxiResult<()> {
        VmManager::new(&self.client).reset(vm_id).await
    }

    pub async fn vm_hardware(&self, vm_id: &str) -> EsxiResult<serde_json::Value> {
        VmManager::new(&self.client).get_hardware(vm_id).await
    }

    pub async fn update_vm_hardware(
        &self,
        vm_id: &str,
        spec: &serde_json::Value,
    ) -> EsxiResult<()> {
        VmManager::new(&self.client).update_hardware(vm_id, spec).await
    }

    // ── Inventory ───────────────────────────────────────────────────

    pub async fn system_version(&self) -> EsxiResult<SystemVersion> {
        InventoryManager::new(&self.client).system_version().await
    }

    pub async fn list_hosts(&self) -> EsxiResult<Vec<HostSummary>> {
        InventoryManager::new(&self.client).list_hosts().await
    }

    pub async fn get_host(&self, host_id: &str) -> EsxiResult<serde_json::Value> {
        InventoryManager::new(&self.client).get_host(host_id).await
    }

    pub async fn list_datastores(&self) -> EsxiResult<Vec<DatastoreSummary>> {
        InventoryManager::new(&self.client).list_datastores().await
    }

    pub async fn list_networks(&self) -> EsxiResult<Vec<NetworkSummary>> {
        InventoryManager::new(&self.client).list_networks().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EsxiError;

    fn service() -> EsxiService {
        EsxiService::new(&EsxiConfig {
            host: "127.0.0.1".into(),
            port: 1,
            username: "root".into(),
            password: "s".into(),
            timeout_secs: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn operations_after_dispose_fail_with_disposed() {
        let svc = service();
        svc.dispose().await;
        assert!(matches!(
            svc.list_vms().await.unwrap_err(),
            EsxiError::Disposed
        ));
        assert!(matches!(
            svc.power_on_vm("vm-1").await.unwrap_err(),
            EsxiError::Disposed
        ));
    }

    #[tokio::test]
    async fn dispose_twice_does_not_panic() {
        let svc = service();
        svc.dispose().await;
        svc.dispose().await;
    }
}
