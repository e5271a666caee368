//! Aggregate service façade for the Proxmox crate.
//!
//! `ProxmoxService` owns the `ProxmoxApi` client and exposes every
//! domain operation to the (external) UI layer, delegating to the
//! per-domain managers.

use crate::access::AccessManager;
use crate::api::ProxmoxApi;
use crate::console::ConsoleManager;
use crate::create::{CreateVmOptions, IdAllocator, NextIdAllocator, ProvisioningManager};
use crate::error::ProxmoxResult;
use crate::network::NetworkManager;
use crate::node::NodeManager;
use crate::storage::StorageManager;
use crate::types::*;
use crate::vm::VmManager;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of the datacenter gathered right after login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterOverview {
    pub nodes: Vec<NodeSummary>,
    pub cluster_resources: Vec<ClusterResource>,
    pub vms: Vec<VmSummary>,
    pub storage: Vec<StorageSummary>,
    pub networks: Vec<NetworkInterface>,
    pub user_ids: Vec<String>,
    pub groups: Vec<GroupInfo>,
}

/// Top-level service that aggregates all Proxmox subsystems.
pub struct ProxmoxService {
    api: ProxmoxApi,
}

impl ProxmoxService {
    /// Build a disconnected service from config.
    pub fn new(config: &ProxmoxConfig) -> ProxmoxResult<Self> {
        Ok(Self {
            api: ProxmoxApi::new(config)?,
        })
    }

    /// Borrow the underlying API client.
    pub fn api(&self) -> &ProxmoxApi {
        &self.api
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Perform the login handshake and prefetch the datacenter
    /// overview. Must be called once before any other operation.
    pub async fn initialize(&self) -> ProxmoxResult<DatacenterOverview> {
        self.api.authenticate().await?;
        self.fetch_overview().await
    }

    /// Gather the full resource snapshot the dashboard renders.
    pub async fn fetch_overview(&self) -> ProxmoxResult<DatacenterOverview> {
        let nodes = NodeManager::new(&self.api);
        let vms = VmManager::new(&self.api);
        let storage = StorageManager::new(&self.api);
        let networks = NetworkManager::new(&self.api);
        let access = AccessManager::new(&self.api);

        Ok(DatacenterOverview {
            nodes: nodes.list_nodes().await?,
            cluster_resources: nodes.cluster_resources().await?,
            vms: vms.list_all_vms().await?,
            storage: storage.list_storage().await?,
            networks: networks.list_all_interfaces().await?,
            user_ids: access.list_user_ids().await?,
            groups: access.list_groups().await?,
        })
    }

    /// Release the client. Idempotent; any later call fails with the
    /// disposed error.
    pub async fn dispose(&self) {
        self.api.dispose().await;
    }

    // ── Nodes / cluster ─────────────────────────────────────────────

    pub async fn list_nodes(&self) -> ProxmoxResult<Vec<NodeSummary>> {
        NodeManager::new(&self.api).list_nodes().await
    }

    pub async fn node_status(&self, node: &str) -> ProxmoxResult<serde_json::Value> {
        NodeManager::new(&self.api).node_status(node).await
    }

    pub async fn cluster_resources(&self) -> ProxmoxResult<Vec<ClusterResource>> {
        NodeManager::new(&self.api).cluster_resources().await
    }

    pub async fn next_vm_id(&self) -> ProxmoxResult<u32> {
        NodeManager::new(&self.api).next_vm_id().await
    }

    pub async fn cpu_types(&self, node: &str) -> ProxmoxResult<Vec<String>> {
        NodeManager::new(&self.api).cpu_types(node).await
    }

    // ── VMs ─────────────────────────────────────────────────────────

    pub async fn list_vms(&self, node: &str) -> ProxmoxResult<Vec<VmSummary>> {
        VmManager::new(&self.api).list_vms(node).await
    }

    pub async fn list_all_vms(&self) -> ProxmoxResult<Vec<VmSummary>> {
        VmManager::new(&self.api).list_all_vms().await
    }

    pub async fn vm_status(&self, node: &str, vmid: u32) -> ProxmoxResult<VmStatus> {
        VmManager::new(&self.api).status(node, vmid).await
    }

    pub async fn vm_config(
        &self,
        node: &str,
        vmid: u32,
    ) -> ProxmoxResult<BTreeMap<String, serde_json::Value>> {
        VmManager::new(&self.api).config(node, vmid).await
    }

    pub async fn update_vm_config(
        &self,
        node: &str,
        vmid: u32,
        changes: &BTreeMap<String, String>,
    ) -> ProxmoxResult<()> {
        VmManager::new(&self.api).update_config(node, vmid, changes).await
    }

    pub async fn start_vm(&self, node: &str, vmid: u32) -> ProxmoxResult<()> {
        VmManager::new(&self.api).start(node, vmid).await
    }

    pub async fn stop_vm(&self, node: &str, vmid: u32) -> ProxmoxResult<()> {
        VmManager::new(&self.api).stop(node, vmid).await
    }

    pub async fn shutdown_vm(&self, node: &str, vmid: u32) -> ProxmoxResult<()> {
        VmManager::new(&self.api).shutdown(node, vmid).await
    }

    pub async fn reset_vm(&self, node: &str, vmid: u32) -> ProxmoxResult<()> {
        VmManager::new(&self.api).reset(node, vmid).await
    }

    pub async fn delete_vm(&self, node: &str, vmid: u32) -> ProxmoxResult<()> {
        VmManager::new(&self.api).delete(node, vmid).await
    }

    pub async fn resize_vm_disk(
        &self,
        node: &str,
        vmid: u32,
        disk: &str,
        size: &str,
    ) -> ProxmoxResult<()> {
        VmManager::new(&self.api).resize_disk(node, vmid, disk, size).await
    }

    pub async fn move_vm_disk(
        &self,
        node: &str,
        vmid: u32,
        disk: &str,
        storage: &str,
        format: Option<&str>,
        delete_source: bool,
    ) -> ProxmoxResult<()> {
        VmManager::new(&self.api)
            .move_disk(node, vmid, disk, storage, format, delete_source)
            .await
    }

    pub async fn update_vm_memory(
        &self,
        node: &str,
        vmid: u32,
        memory: u32,
        balloon: u32,
    ) -> ProxmoxResult<()> {
        VmManager::new(&self.api).update_memory(node, vmid, memory, balloon).await
    }

    pub async fn update_vm_network(
        &self,
        node: &str,
        vmid: u32,
        net_id: u32,
        model: &str,
        mac_address: &str,
        bridge: &str,
        firewall: bool,
    ) -> ProxmoxResult<()> {
        VmManager::new(&self.api)
            .update_network(node, vmid, net_id, model, mac_address, bridge, firewall)
            .await
    }

    pub async fn update_vm_cpu(
        &self,
        node: &str,
        vmid: u32,
        cpu_type: &str,
        cores: u32,
        sockets: u32,
        vcpus: Option<u32>,
    ) -> ProxmoxResult<()> {
        VmManager::new(&self.api)
            .update_cpu(node, vmid, cpu_type, cores, sockets, vcpus)
            .await
    }

    pub async fn update_vm_boot_order(
        &self,
        node: &str,
        vmid: u32,
        boot_order: &str,
        boot_disk: Option<&str>,
    ) -> ProxmoxResult<()> {
        VmManager::new(&self.api)
            .update_boot_order(node, vmid, boot_order, boot_disk)
            .await
    }

    pub async fn update_vm_display(
        &self,
        node: &str,
        vmid: u32,
        vga: &str,
        port: Option<u16>,
        listen: Option<&str>,
    ) -> ProxmoxResult<()> {
        VmManager::new(&self.api)
            .update_display(node, vmid, vga, port, listen)
            .await
    }

    pub async fn vm_firewall_options(
        &self,
        node: &str,
        vmid: u32,
    ) -> ProxmoxResult<serde_json::Value> {
        VmManager::new(&self.api).firewall_options(node, vmid).await
    }

    pub async fn vm_firewall_rules(
        &self,
        node: &str,
        vmid: u32,
    ) -> ProxmoxResult<Vec<serde_json::Value>> {
        VmManager::new(&self.api).firewall_rules(node, vmid).await
    }

    // ── VM creation ─────────────────────────────────────────────────

    pub async fn create_vm(&self, node: &str, options: &CreateVmOptions) -> CreateOutcome {
        ProvisioningManager::new(&self.api).create_vm(node, options).await
    }

    /// Batch creation with the default id strategy (cluster `nextid`).
    pub async fn create_multiple_vms(
        &self,
        node: &str,
        count: usize,
        template: &CreateVmOptions,
        name_pattern: Option<&str>,
    ) -> ProxmoxResult<Vec<CreateOutcome>> {
        self.create_multiple_vms_with(node, count, template, name_pattern, &NextIdAllocator)
            .await
    }

    /// Batch creation with an explicit id-allocation strategy.
    pub async fn create_multiple_vms_with(
        &self,
        node: &str,
        count: usize,
        template: &CreateVmOptions,
        name_pattern: Option<&str>,
        allocator: &dyn IdAllocator,
    ) -> ProxmoxResult<Vec<CreateOutcome>> {
        ProvisioningManager::new(&self.api)
            .create_multiple(node, count, template, name_pattern, allocator)
            .await
    }

    // ── Storage ─────────────────────────────────────────────────────

    pub async fn list_storage(&self) -> ProxmoxResult<Vec<StorageSummary>> {
        StorageManager::new(&self.api).list_storage().await
    }

    pub async fn list_node_storage(&self, node: &str) -> ProxmoxResult<Vec<StorageSummary>> {
        StorageManager::new(&self.api).list_node_storage(node).await
    }

    pub async fn list_storage_content(
        &self,
        node: &str,
        storage: &str,
    ) -> ProxmoxResult<Vec<StorageContent>> {
        StorageManager::new(&self.api).list_content(node, storage).await
    }

    pub async fn list_iso_images(&self, node: &str, storage: &str) -> ProxmoxResult<Vec<String>> {
        StorageManager::new(&self.api).list_iso_images(node, storage).await
    }

    // ── Network ─────────────────────────────────────────────────────

    pub async fn list_networks(&self, node: &str) -> ProxmoxResult<Vec<NetworkInterface>> {
        NetworkManager::new(&self.api).list_interfaces(node).await
    }

    pub async fn list_all_networks(&self) -> ProxmoxResult<Vec<NetworkInterface>> {
        NetworkManager::new(&self.api).list_all_interfaces().await
    }

    pub async fn configure_network(
        &self,
        node: &str,
        config: &BTreeMap<String, String>,
    ) -> ProxmoxResult<()> {
        NetworkManager::new(&self.api).configure_interface(node, config).await
    }

    // ── Access control ──────────────────────────────────────────────

    pub async fn list_users(&self) -> ProxmoxResult<Vec<String>> {
        AccessManager::new(&self.api).list_user_ids().await
    }

    pub async fn get_user(&self, userid: &str) -> ProxmoxResult<UserDetails> {
        AccessManager::new(&self.api).get_user(userid).await
    }

    pub async fn create_user(&self, userid: &str, config: &UserConfig) -> ProxmoxResult<()> {
        AccessManager::new(&self.api).create_user(userid, config).await
    }

    pub async fn update_user(&self, userid: &str, config: &UserConfig) -> ProxmoxResult<()> {
        AccessManager::new(&self.api).update_user(userid, config).await
    }

    pub async fn delete_user(&self, userid: &str) -> ProxmoxResult<()> {
        AccessManager::new(&self.api).delete_user(userid).await
    }

    pub async fn list_groups(&self) -> ProxmoxResult<Vec<GroupInfo>> {
        AccessManager::new(&self.api).list_groups().await
    }

    pub async fn get_group(&self, groupid: &str) -> ProxmoxResult<GroupInfo> {
        AccessManager::new(&self.api).get_group(groupid).await
    }

    pub async fn create_group(&self, groupid: &str, comment: Option<&str>) -> ProxmoxResult<()> {
        AccessManager::new(&self.api).create_group(groupid, comment).await
    }

    pub async fn update_group(
        &self,
        groupid: &str,
        comment: Option<&str>,
        members: Option<&[String]>,
    ) -> ProxmoxResult<()> {
        AccessManager::new(&self.api).update_group(groupid, comment, members).await
    }

    pub async fn delete_group(&self, groupid: &str) -> ProxmoxResult<()> {
        AccessManager::new(&self.api).delete_group(groupid).await
    }

    pub async fn list_pools(&self) -> ProxmoxResult<Vec<PoolInfo>> {
        AccessManager::new(&self.api).list_pools().await
    }

    pub async fn get_pool(&self, poolid: &str) -> ProxmoxResult<PoolInfo> {
        AccessManager::new(&self.api).get_pool(poolid).await
    }

    pub async fn create_pool(&self, poolid: &str, comment: Option<&str>) -> ProxmoxResult<()> {
        AccessManager::new(&self.api).create_pool(poolid, comment).await
    }

    pub async fn update_pool(
        &self,
        poolid: &str,
        comment: Option<&str>,
        vms: Option<&[u32]>,
        storage: Option<&[String]>,
        delete_members: bool,
    ) -> ProxmoxResult<()> {
        AccessManager::new(&self.api)
            .update_pool(poolid, comment, vms, storage, delete_members)
            .await
    }

    pub async fn delete_pool(&self, poolid: &str) -> ProxmoxResult<()> {
        AccessManager::new(&self.api).delete_pool(poolid).await
    }

    // ── Console ─────────────────────────────────────────────────────

    pub async fn vnc_ticket(&self, node: &str, vmid: u32) -> ProxmoxResult<VncTicket> {
        ConsoleManager::new(&self.api).vnc_ticket(node, vmid).await
    }

    pub async fn novnc_url(&self, node: &str, vmid: u32) -> ProxmoxResult<String> {
        ConsoleManager::new(&self.api).novnc_url(node, vmid).await
    }

    pub async fn send_key(&self, node: &str, vmid: u32, key: &str) -> ProxmoxResult<()> {
        ConsoleManager::new(&self.api).send_key(node, vmid, key).await
    }

    pub async fn vm_screenshot(&self, node: &str, vmid: u32) -> ProxmoxResult<Vec<u8>> {
        ConsoleManager::new(&self.api).screenshot(node, vmid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxmoxError;

    fn service() -> ProxmoxService {
        let cfg = ProxmoxConfig {
            api_url: "https://127.0.0.1:1".into(),
            username: "root".into(),
            password: "s".into(),
            realm: "pam".into(),
            timeout_secs: 1,
        };
        ProxmoxService::new(&cfg).unwrap()
    }

    #[tokio::test]
    async fn operations_after_dispose_fail_with_disposed() {
        let svc = service();
        svc.dispose().await;
        assert!(matches!(
            svc.list_nodes().await.unwrap_err(),
            ProxmoxError::Disposed
        ));
        assert!(matches!(
            svc.start_vm("pve", 100).await.unwrap_err(),
            ProxmoxError::Disposed
        ));
    }

    #[tokio::test]
    async fn create_vm_after_dispose_reports_failed_outcome() {
        let svc = service();
        svc.dispose().await;
        let outcome = svc
            .create_vm("pve", &CreateVmOptions::new(100, "local-lvm"))
            .await;
        assert!(!outcome.success);
        assert!(outcome.error_message.is_some());
    }
}
