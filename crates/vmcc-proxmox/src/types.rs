//! Shared types for Proxmox VE management.

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connection / Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Top-level configuration for connecting to a Proxmox VE host.
///
/// Constructed explicitly by the caller and handed to the client at
/// creation time; there is no process-wide settings state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxmoxConfig {
    /// API base URL (e.g. "https://pve.lab.local:8006")
    pub api_url: String,
    /// Username without the realm suffix (e.g. "root")
    pub username: String,
    /// Password
    pub password: String,
    /// Authentication realm (default "pam")
    #[serde(default = "default_realm")]
    pub realm: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_realm() -> String {
    "pam".to_string()
}

fn default_timeout() -> u64 {
    30
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Nodes / Cluster
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One entry from `GET /api2/json/nodes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSummary {
    pub node: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub cpu: Option<f64>,
    #[serde(default)]
    pub maxcpu: Option<u64>,
    #[serde(default)]
    pub mem: Option<u64>,
    #[serde(default)]
    pub maxmem: Option<u64>,
    #[serde(default)]
    pub disk: Option<u64>,
    #[serde(default)]
    pub maxdisk: Option<u64>,
    #[serde(default)]
    pub uptime: Option<u64>,
    #[serde(default)]
    pub level: Option<String>,
}

/// One entry from `GET /api2/json/cluster/resources`. The shape varies
/// by resource kind, so everything beyond the discriminator is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterResource {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub vmid: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub storage: Option<String>,
    #[serde(default)]
    pub pool: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Virtual machines
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One QEMU guest from `GET /api2/json/nodes/{node}/qemu`.
///
/// `node` is not part of the wire payload for the per-node listing; the
/// all-nodes listing fills it in so callers can address the VM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmSummary {
    pub vmid: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub cpus: Option<f64>,
    #[serde(default)]
    pub mem: Option<u64>,
    #[serde(default)]
    pub maxmem: Option<u64>,
    #[serde(default)]
    pub disk: Option<u64>,
    #[serde(default)]
    pub maxdisk: Option<u64>,
    #[serde(default)]
    pub uptime: Option<u64>,
    #[serde(default)]
    pub template: Option<u8>,
}

/// Current status record from `.../status/current`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub qmpstatus: Option<String>,
    #[serde(default)]
    pub vmid: Option<u32>,
    #[serde(default)]
    pub cpus: Option<f64>,
    #[serde(default)]
    pub cpu: Option<f64>,
    #[serde(default)]
    pub mem: Option<u64>,
    #[serde(default)]
    pub maxmem: Option<u64>,
    #[serde(default)]
    pub uptime: Option<u64>,
    #[serde(default)]
    pub agent: Option<u8>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Storage pool entry (datacenter-wide or per-node listing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSummary {
    pub storage: String,
    #[serde(rename = "type", default)]
    pub storage_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub active: Option<u8>,
    #[serde(default)]
    pub enabled: Option<u8>,
    #[serde(default)]
    pub shared: Option<u8>,
    #[serde(default)]
    pub avail: Option<u64>,
    #[serde(default)]
    pub used: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// One volume from `.../storage/{storage}/content` (ISO images,
/// container templates, disk images).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageContent {
    pub volid: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub vmid: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Network
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A node network interface from `GET /api2/json/nodes/{node}/network`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub iface: String,
    #[serde(rename = "type", default)]
    pub interface_type: Option<String>,
    #[serde(default)]
    pub families: Vec<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub method6: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub netmask: Option<String>,
    #[serde(default)]
    pub cidr: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub bridge_ports: Option<String>,
    #[serde(default)]
    pub bridge_vids: Option<String>,
    #[serde(default)]
    pub bridge_fd: Option<String>,
    #[serde(default)]
    pub active: Option<u8>,
    #[serde(default)]
    pub exists: Option<u8>,
    #[serde(default)]
    pub autostart: Option<u8>,
    #[serde(default)]
    pub priority: Option<u32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Access control
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sparse user attributes for create/update calls. Only supplied fields
/// are transmitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub enable: Option<bool>,
    #[serde(default)]
    pub expire: Option<i64>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub keys: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Stored user record from `GET /api2/json/access/users/{userid}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDetails {
    #[serde(default)]
    pub userid: Option<String>,
    #[serde(default)]
    pub enable: Option<u8>,
    #[serde(default)]
    pub expire: Option<i64>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub groups: Option<serde_json::Value>,
}

impl UserDetails {
    /// Proxmox encodes the flag as 0/1.
    pub fn is_enabled(&self) -> bool {
        self.enable.unwrap_or(1) != 0
    }
}

/// Group record; `members` is a comma-joined user id list on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    pub groupid: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub members: Option<String>,
}

impl GroupInfo {
    pub fn member_ids(&self) -> Vec<String> {
        self.members
            .as_deref()
            .map(|m| {
                m.split(',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Resource pool record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolInfo {
    pub poolid: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub members: Option<serde_json::Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Console
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// VNC proxy credentials for one console connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VncTicket {
    pub ticket: String,
    pub port: u16,
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
    pub vmid: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    /// Decoded response payload, present iff `success`.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Failure description, present iff `!success`.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl CreateOutcome {
    pub fn ok(vmid: Option<u32>, name: Option<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            vmid,
            name,
            data: Some(data),
            error_message: None,
        }
    }

    pub fn fail(vmid: Option<u32>, name: Option<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            vmid,
            name,
            data: None,
            error_message: Some(message.into()),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Wire helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Several Proxmox endpoints emit numbers as JSON strings (`"port":
/// "5900"`, nextid as `"100"`); accept either shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Num(u32),
    Str(String),
}

impl NumberOrString {
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Str(s) => s.trim().parse().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_from_minimal_json() {
        let cfg: ProxmoxConfig = serde_json::from_str(
            r#"{"apiUrl":"https://pve:8006","username":"root","password":"s"}"#,
        )
        .unwrap();
        assert_eq!(cfg.realm, "pam");
        assert_eq!(cfg.timeout_secs, 30);
    }

    #[test]
    fn number_or_string_accepts_both_shapes() {
        let n: NumberOrString = serde_json::from_str("5900").unwrap();
        assert_eq!(n.as_u32(), Some(5900));
        let s: NumberOrString = serde_json::from_str("\"5900\"").unwrap();
        assert_eq!(s.as_u32(), Some(5900));
        let bad: NumberOrString = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(bad.as_u32(), None);
    }

    #[test]
    fn group_member_ids_split() {
        let g = GroupInfo {
            groupid: "admins".into(),
            comment: None,
            members: Some("root@pam,ops@pve".into()),
        };
        assert_eq!(g.member_ids(), vec!["root@pam", "ops@pve"]);
    }

    #[test]
    fn group_member_ids_empty_when_absent() {
        let g = GroupInfo {
            groupid: "empty".into(),
            comment: None,
            members: None,
        };
        assert!(g.member_ids().is_empty());
    }

    #[test]
    fn vm_summary_tolerates_sparse_payload() {
        let vm: VmSummary = serde_json::from_str(r#"{"vmid":101,"status":"running"}"#).unwrap();
        assert_eq!(vm.vmid, 101);
        assert_eq!(vm.status.as_deref(), Some("running"));
        assert!(vm.name.is_none());
    }
}
