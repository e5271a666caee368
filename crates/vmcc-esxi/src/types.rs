//! Shared types for ESXi / vSphere management.

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connection / Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Top-level configuration for connecting to an ESXi / vCenter host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EsxiConfig {
    /// Hostname or IP (e.g. "esxi.lab.local")
    pub host: String,
    /// Port (default 443)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username (e.g. "root" or "administrator@vsphere.local")
    pub username: String,
    /// Password
    pub password: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_port() -> u16 {
    443
}

fn default_timeout() -> u64 {
    30
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Power state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VmPowerState {
    PoweredOn,
    PoweredOff,
    Suspended,
    #[serde(other)]
    Unknown,
}

impl Default for VmPowerState {
    fn default() -> Self {
        Self::Unknown
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Inventory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Concise VM summary (from the list endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmSummary {
    /// Managed-object id (e.g. "vm-42")
    pub vm: String,
    pub name: String,
    #[serde(default)]
    pub power_state: VmPowerState,
    #[serde(default)]
    pub cpu_count: Option<u32>,
    #[serde(default, rename = "memory_size_MiB")]
    pub memory_size_mib: Option<u64>,
}

/// Appliance/system version record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemVersion {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub releasedate: Option<String>,
}

/// One ESXi host from the host listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSummary {
    pub host: String,
    pub name: String,
    #[serde(default)]
    pub connection_state: Option<String>,
    #[serde(default)]
    pub power_state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatastoreSummary {
    pub datastore: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub datastore_type: Option<String>,
    #[serde(default)]
    pub capacity: Option<u64>,
    #[serde(default)]
    pub free_space: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub network: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub network_type: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VM create spec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sparse creation spec for `POST /rest/vcenter/vm`. Only supplied
/// fields are serialized, so server-side defaults apply to the rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EsxiVmSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub guest_os: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub placement: Option<PlacementSpec>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cpu: Option<CpuSpec>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub memory: Option<MemorySpec>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub disks: Vec<DiskSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub nics: Vec<NicSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub cdroms: Vec<CdromSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlacementSpec {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub datastore: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resource_pool: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuSpec {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cores_per_socket: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySpec {
    #[serde(skip_serializing_if = "Option::is_none", default, rename = "size_MiB")]
    pub size_mib: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskSpec {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_vmdk: Option<VmdkSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmdkSpec {
    /// Capacity in bytes.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub capacity: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NicSpec {
    #[serde(skip_serializing_if = "Option::is_none", default, rename = "type")]
    pub nic_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start_connected: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CdromSpec {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start_connected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub backing: Option<CdromBackingSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CdromBackingSpec {
    #[serde(skip_serializing_if = "Option::is_none", default, rename = "type")]
    pub backing_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub iso_file: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Batch results
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-instance outcome of a (batch) VM creation. Failures are captured
/// here instead of raised so sibling creations proceed independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcome {
    pub success: bool,
    #[serde(default)]
    pub name: Option<String>,
    /// Platform-assigned VM id, present iff `success`.
    #[serde(default)]
    pub vm_id: Option<String>,
    /// Failure description, present iff `!success`.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl CreateOutcome {
    pub fn ok(name: Option<String>, vm_id: String) -> Self {
        Self {
            success: true,
            name,
            vm_id: Some(vm_id),
            error_message: None,
        }
    }

    pub fn fail(name: Option<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            name,
            vm_id: None,
            error_message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_from_minimal_json() {
        let cfg: EsxiConfig = serde_json::from_str(
            r#"{"host":"esxi.lab","username":"root","password":"s"}"#,
        )
        .unwrap();
        assert_eq!(cfg.port, 443);
        assert_eq!(cfg.timeout_secs, 30);
    }

    #[test]
    fn spec_serialization_is_sparse() {
        let spec = EsxiVmSpec {
            name: "web01".into(),
            ..EsxiVmSpec::default()
        };
        let json = serde_json::to_value(&spec).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["name"], "web01");
    }

    #[test]
    fn spec_memory_uses_wire_field_name() {
        let spec = EsxiVmSpec {
            name: "db01".into(),
            memory: Some(MemorySpec {
                size_mib: Some(4096),
            }),
            ..EsxiVmSpec::default()
        };
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"size_MiB\":4096"));
    }

    #[test]
    fn power_state_accepts_wire_casing_and_unknowns() {
        let s: VmPowerState = serde_json::from_str("\"POWERED_ON\"").unwrap();
        assert_eq!(s, VmPowerState::PoweredOn);
        let u: VmPowerState = serde_json::from_str("\"HIBERNATED\"").unwrap();
        assert_eq!(u, VmPowerState::Unknown);
    }

    #[test]
    fn vm_summary_decodes_wire_payload() {
        let vm: VmSummary = serde_json::from_str(
            r#"{"vm":"vm-16","name":"web01","power_state":"POWERED_OFF","cpu_count":2,"memory_size_MiB":2048}"#,
        )
        .unwrap();
        assert_eq!(vm.vm, "vm-16");
        assert_eq!(vm.memory_size_mib, Some(2048));
    }
}
