//! QEMU VM lifecycle management.
//!
//! Covers listing, status/config inspection, validated config updates,
//! power transitions, disk operations and firewall queries. All
//! caller-supplied values are validated locally before any network call.

use crate::api::ProxmoxApi;
use crate::error::{ProxmoxError, ProxmoxResult};
use crate::node::NodeManager;
use crate::types::{VmStatus, VmSummary};

use std::collections::BTreeMap;

/// NIC models accepted in `netN` config strings.
pub const NIC_MODELS: &[&str] = &["virtio", "e1000", "rtl8139"];

/// Guest OS types accepted for `ostype`.
pub const OS_TYPES: &[&str] = &[
    "other", "wxp", "w2k", "w2k3", "w2k8", "wvista", "win7", "win8", "win10", "win11", "l24",
    "l26", "solaris",
];

/// Firmware selections accepted for `bios`.
pub const BIOS_VALUES: &[&str] = &["seabios", "ovmf"];

/// Power transitions accepted by [`VmManager::power_action`].
pub const POWER_ACTIONS: &[&str] = &["start", "stop", "shutdown", "reset"];

/// High-level VM operations backed by `ProxmoxApi`.
pub struct VmManager<'a> {
    api: &'a ProxmoxApi,
}

impl<'a> VmManager<'a> {
    pub fn new(api: &'a ProxmoxApi) -> Self {
        Self { api }
    }

    // ── List / Get ──────────────────────────────────────────────────

    /// List QEMU guests on one node.
    pub async fn list_vms(&self, node: &str) -> ProxmoxResult<Vec<VmSummary>> {
        let mut vms: Vec<VmSummary> =
            self.api.get(&format!("/api2/json/nodes/{node}/qemu")).await?;
        for vm in &mut vms {
            vm.node = Some(node.to_string());
        }
        Ok(vms)
    }

    /// List QEMU guests across every node, each annotated with its node.
    pub async fn list_all_vms(&self) -> ProxmoxResult<Vec<VmSummary>> {
        let nodes = NodeManager::new(self.api).list_nodes().await?;
        let mut all = Vec::new();
        for node in nodes {
            all.extend(self.list_vms(&node.node).await?);
        }
        Ok(all)
    }

    /// Current runtime status.
    pub async fn status(&self, node: &str, vmid: u32) -> ProxmoxResult<VmStatus> {
        self.api
            .get(&format!("/api2/json/nodes/{node}/qemu/{vmid}/status/current"))
            .await
    }

    /// Raw config key/value map as stored by the cluster.
    pub async fn config(
        &self,
        node: &str,
        vmid: u32,
    ) -> ProxmoxResult<BTreeMap<String, serde_json::Value>> {
        self.api
            .get(&format!("/api2/json/nodes/{node}/qemu/{vmid}/config"))
            .await
    }

    /// Delete (destroy) a VM.
    pub async fn delete(&self, node: &str, vmid: u32) -> ProxmoxResult<()> {
        self.api
            .delete(&format!("/api2/json/nodes/{node}/qemu/{vmid}"))
            .await
    }

    // ── Power operations ────────────────────────────────────────────

    /// Issue a power transition. The action name is checked against the
    /// fixed allowed set before any request is built.
    pub async fn power_action(&self, node: &str, vmid: u32, action: &str) -> ProxmoxResult<()> {
        if !POWER_ACTIONS.contains(&action) {
            return Err(ProxmoxError::argument(format!(
                "invalid power action {action:?}, expected one of {POWER_ACTIONS:?}"
            )));
        }
        self.api
            .post_empty(&format!("/api2/json/nodes/{node}/qemu/{vmid}/status/{action}"))
            .await
    }

    pub async fn start(&self, node: &str, vmid: u32) -> ProxmoxResult<()> {
        self.power_action(node, vmid, "start").await
    }

    pub async fn stop(&self, node: &str, vmid: u32) -> ProxmoxResult<()> {
        self.power_action(node, vmid, "stop").await
    }

    pub async fn shutdown(&self, node: &str, vmid: u32) -> ProxmoxResult<()> {
        self.power_action(node, vmid, "shutdown").await
    }

    pub async fn reset(&self, node: &str, vmid: u32) -> ProxmoxResult<()> {
        self.power_action(node, vmid, "reset").await
    }

    // ── Config updates ──────────────────────────────────────────────

    /// Apply a set of config changes after local validation. Only the
    /// validated, normalized form of each value is transmitted.
    pub async fn update_config(
        &self,
        node: &str,
        vmid: u32,
        changes: &BTreeMap<String, String>,
    ) -> ProxmoxResult<()> {
        let params = validate_config_changes(changes)?;
        self.api
            .post_form(&format!("/api2/json/nodes/{node}/qemu/{vmid}/config"), &params)
            .await
    }

    /// Set memory and balloon targets (MiB).
    pub async fn update_memory(
        &self,
        node: &str,
        vmid: u32,
        memory: u32,
        balloon: u32,
    ) -> ProxmoxResult<()> {
        if memory == 0 {
            return Err(ProxmoxError::argument("memory must be a positive integer"));
        }
        let params = vec![
            ("memory".to_string(), memory.to_string()),
            ("balloon".to_string(), balloon.to_string()),
        ];
        self.api
            .put_form(&format!("/api2/json/nodes/{node}/qemu/{vmid}/config"), &params)
            .await
    }

    /// Replace one network interface definition.
    pub async fn update_network(
        &self,
        node: &str,
        vmid: u32,
        net_id: u32,
        model: &str,
        mac_address: &str,
        bridge: &str,
        firewall: bool,
    ) -> ProxmoxResult<()> {
        let mut config = format!("{model}={mac_address},bridge={bridge}");
        if firewall {
            config.push_str(",firewall=1");
        }
        validate_network_config(&config)?;
        let params = vec![(format!("net{net_id}"), config)];
        self.api
            .put_form(&format!("/api2/json/nodes/{node}/qemu/{vmid}/config"), &params)
            .await
    }

    /// Set CPU model and topology.
    pub async fn update_cpu(
        &self,
        node: &str,
        vmid: u32,
        cpu_type: &str,
        cores: u32,
        sockets: u32,
        vcpus: Option<u32>,
    ) -> ProxmoxResult<()> {
        if cores == 0 || sockets == 0 {
            return Err(ProxmoxError::argument(
                "cores and sockets must be positive integers",
            ));
        }
        let mut params = vec![
            ("cpu".to_string(), cpu_type.to_string()),
            ("cores".to_string(), cores.to_string()),
            ("sockets".to_string(), sockets.to_string()),
        ];
        if let Some(vcpus) = vcpus.filter(|v| *v > 0) {
            params.push(("vcpus".to_string(), vcpus.to_string()));
        }
        self.api
            .put_form(&format!("/api2/json/nodes/{node}/qemu/{vmid}/config"), &params)
            .await
    }

    /// Set the boot order (and optionally the legacy boot disk).
    pub async fn update_boot_order(
        &self,
        node: &str,
        vmid: u32,
        boot_order: &str,
        boot_disk: Option<&str>,
    ) -> ProxmoxResult<()> {
        let mut params = vec![("boot".to_string(), boot_order.to_string())];
        if let Some(disk) = boot_disk.filter(|d| !d.is_empty()) {
            params.push(("bootdisk".to_string(), disk.to_string()));
        }
        self.api
            .put_form(&format!("/api2/json/nodes/{node}/qemu/{vmid}/config"), &params)
            .await
    }

    /// Set the display adapter (and optional VNC port/listen address).
    pub async fn update_display(
        &self,
        node: &str,
        vmid: u32,
        vga: &str,
        port: Option<u16>,
        listen: Option<&str>,
    ) -> ProxmoxResult<()> {
        let mut params = vec![("vga".to_string(), vga.to_string())];
        if let Some(port) = port.filter(|p| *p > 0) {
            params.push(("port".to_string(), port.to_string()));
        }
        if let Some(listen) = listen.filter(|l| !l.is_empty()) {
            params.push(("listen".to_string(), listen.to_string()));
        }
        self.api
            .put_form(&format!("/api2/json/nodes/{node}/qemu/{vmid}/config"), &params)
            .await
    }

    // ── Disks ───────────────────────────────────────────────────────

    /// Grow a disk, e.g. `size = "+10G"` or an absolute size.
    pub async fn resize_disk(
        &self,
        node: &str,
        vmid: u32,
        disk: &str,
        size: &str,
    ) -> ProxmoxResult<()> {
        let params = vec![
            ("disk".to_string(), disk.to_string()),
            ("size".to_string(), size.to_string()),
        ];
        self.api
            .put_form(&format!("/api2/json/nodes/{node}/qemu/{vmid}/resize"), &params)
            .await
    }

    /// Move a disk to another storage, optionally converting the format
    /// and deleting the source volume.
    pub async fn move_disk(
        &self,
        node: &str,
        vmid: u32,
        disk: &str,
        storage: &str,
        format: Option<&str>,
        delete_source: bool,
    ) -> ProxmoxResult<()> {
        let mut params = vec![
            ("disk".to_string(), disk.to_string()),
            ("storage".to_string(), storage.to_string()),
            ("delete".to_string(), if delete_source { "1" } else { "0" }.to_string()),
        ];
        if let Some(format) = format.filter(|f| !f.is_empty()) {
            params.push(("format".to_string(), format.to_string()));
        }
        self.api
            .post_form(&format!("/api2/json/nodes/{node}/qemu/{vmid}/move_disk"), &params)
            .await
    }

    // ── Firewall ────────────────────────────────────────────────────

    pub async fn firewall_options(&self, node: &str, vmid: u32) -> ProxmoxResult<serde_json::Value> {
        self.api
            .get(&format!("/api2/json/nodes/{node}/qemu/{vmid}/firewall/options"))
            .await
    }

    pub async fn firewall_rules(
        &self,
        node: &str,
        vmid: u32,
    ) -> ProxmoxResult<Vec<serde_json::Value>> {
        self.api
            .get(&format!("/api2/json/nodes/{node}/qemu/{vmid}/firewall/rules"))
            .await
    }
}

// ── Validation ──────────────────────────────────────────────────────

/// Check a `netN` config string: the leading segment must name a
/// supported NIC model and a `bridge=` clause must be present.
pub(crate) fn validate_network_config(value: &str) -> ProxmoxResult<()> {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() < 2 {
        return Err(ProxmoxError::argument(format!(
            "invalid network configuration: {value}"
        )));
    }
    let model = parts[0].split('=').next().unwrap_or_default();
    if !NIC_MODELS.contains(&model) {
        return Err(ProxmoxError::argument(format!("invalid network model: {model}")));
    }
    if !parts.iter().any(|p| p.starts_with("bridge=")) {
        return Err(ProxmoxError::argument(
            "network configuration must include bridge",
        ));
    }
    Ok(())
}

/// Validate and normalize a config-change map, returning the form
/// parameters to transmit. Fails fast on the first invalid entry.
pub(crate) fn validate_config_changes(
    changes: &BTreeMap<String, String>,
) -> ProxmoxResult<Vec<(String, String)>> {
    let mut params = Vec::with_capacity(changes.len());

    for (key, value) in changes {
        match key.as_str() {
            k if k.starts_with("net") => {
                validate_network_config(value)?;
                params.push((key.clone(), value.clone()));
            }
            "ostype" => {
                let normalized = value.to_lowercase();
                if !OS_TYPES.contains(&normalized.as_str()) {
                    return Err(ProxmoxError::argument(format!(
                        "invalid value for ostype: {value}"
                    )));
                }
                params.push((key.clone(), normalized));
            }
            "bios" => {
                let normalized = value.to_lowercase();
                if !BIOS_VALUES.contains(&normalized.as_str()) {
                    return Err(ProxmoxError::argument(format!(
                        "invalid value for bios: {value}"
                    )));
                }
                params.push((key.clone(), normalized));
            }
            "memory" | "balloon" | "cores" | "sockets" => {
                let parsed: i64 = value.trim().parse().map_err(|_| {
                    ProxmoxError::argument(format!("invalid numeric value for {key}: {value}"))
                })?;
                if parsed <= 0 {
                    return Err(ProxmoxError::argument(format!(
                        "invalid numeric value for {key}: {value}"
                    )));
                }
                params.push((key.clone(), parsed.to_string()));
            }
            "onboot" => {
                let flag = value == "1" || value.eq_ignore_ascii_case("true");
                params.push((key.clone(), if flag { "1" } else { "0" }.to_string()));
            }
            _ => params.push((key.clone(), value.clone())),
        }
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn network_config_accepts_supported_models() {
        assert!(validate_network_config("virtio=AA:BB:CC:DD:EE:FF,bridge=vmbr0").is_ok());
        assert!(validate_network_config("e1000=AA:BB:CC:DD:EE:FF,bridge=vmbr1,firewall=1").is_ok());
    }

    #[test]
    fn network_config_rejects_unknown_model() {
        let err = validate_network_config("ne2k=AA:BB:CC:DD:EE:FF,bridge=vmbr0").unwrap_err();
        assert!(matches!(err, ProxmoxError::Argument(_)));
    }

    #[test]
    fn network_config_requires_bridge_clause() {
        let err = validate_network_config("virtio=AA:BB:CC:DD:EE:FF,firewall=1").unwrap_err();
        assert!(matches!(err, ProxmoxError::Argument(_)));
    }

    #[test]
    fn network_config_requires_two_segments() {
        let err = validate_network_config("virtio=AA:BB:CC:DD:EE:FF").unwrap_err();
        assert!(matches!(err, ProxmoxError::Argument(_)));
    }

    #[test]
    fn config_changes_normalize_ostype_case() {
        let params = validate_config_changes(&changes(&[("ostype", "Win11")])).unwrap();
        assert_eq!(params, vec![("ostype".to_string(), "win11".to_string())]);
    }

    #[test]
    fn config_changes_reject_unknown_bios() {
        let err = validate_config_changes(&changes(&[("bios", "coreboot")])).unwrap_err();
        assert!(matches!(err, ProxmoxError::Argument(_)));
    }

    #[test]
    fn config_changes_require_positive_numerics() {
        for bad in ["0", "-4", "lots"] {
            let err = validate_config_changes(&changes(&[("cores", bad)])).unwrap_err();
            assert!(matches!(err, ProxmoxError::Argument(_)), "cores={bad}");
        }
        let ok = validate_config_changes(&changes(&[("memory", "2048")])).unwrap();
        assert_eq!(ok, vec![("memory".to_string(), "2048".to_string())]);
    }

    #[test]
    fn config_changes_normalize_onboot() {
        let params =
            validate_config_changes(&changes(&[("onboot", "true"), ("tags", "lab")])).unwrap();
        assert!(params.contains(&("onboot".to_string(), "1".to_string())));
        assert!(params.contains(&("tags".to_string(), "lab".to_string())));
    }

    #[tokio::test]
    async fn power_action_rejects_invalid_state_without_network() {
        let cfg = crate::types::ProxmoxConfig {
            api_url: "https://127.0.0.1:1".into(),
            username: "root".into(),
            password: "s".into(),
            realm: "pam".into(),
            timeout_secs: 1,
        };
        let api = ProxmoxApi::new(&cfg).unwrap();
        let err = VmManager::new(&api)
            .power_action("pve", 100, "invalid_state")
            .await
            .unwrap_err();
        assert!(matches!(err, ProxmoxError::Argument(_)));
    }
}
