//! VM creation: options struct, sparse payload assembly, id allocation
//! strategies and batch provisioning.
//!
//! The QEMU create endpoint accepts roughly seventy optional fields plus
//! repeatable indexed device slots. Callers fill only what they need on
//! [`CreateVmOptions`]; everything left `None` is stripped from the
//! payload so server-side defaults apply.

use crate::api::{decode_envelope, ProxmoxApi};
use crate::error::{ProxmoxError, ProxmoxResult};
use crate::node::NodeManager;
use crate::types::CreateOutcome;
use crate::vm::{validate_network_config, BIOS_VALUES, OS_TYPES};

use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Options
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sparse configuration for one QEMU guest.
///
/// Construct with [`CreateVmOptions::new`] and fill fields via struct
/// update syntax; only supplied values are transmitted. Indexed device
/// families (`net`, `scsi`, `usb`, …) map a slot index to the device
/// config string and expand to `net0`, `net1`, … payload keys.
#[derive(Debug, Clone, Default)]
pub struct CreateVmOptions {
    /// Guest id. Required; unique within the cluster.
    pub vmid: u32,
    /// Target storage for the boot disk. Required.
    pub storage: String,
    /// Boot disk slot (`"scsi0"`, `"virtio0"`, `"sata0"`, `"ide0"`).
    /// When set, a `<slot>=<storage>:<size>` entry is synthesized.
    pub disk_type: Option<String>,
    /// Boot disk size in GiB; only meaningful with `disk_type`.
    pub disk_size_gb: u32,
    /// ISO volume id; mounted as a CD-ROM on the fixed `ide2` slot.
    pub iso: Option<String>,

    pub acpi: Option<bool>,
    pub affinity: Option<String>,
    pub agent: Option<String>,
    pub amd_sev: Option<String>,
    pub arch: Option<String>,
    pub archive: Option<String>,
    pub args: Option<String>,
    pub audio0: Option<String>,
    pub autostart: Option<bool>,
    pub balloon: Option<String>,
    pub bios: Option<String>,
    pub boot: Option<String>,
    pub bootdisk: Option<String>,
    pub bwlimit: Option<i64>,
    pub cicustom: Option<String>,
    pub cipassword: Option<String>,
    pub citype: Option<String>,
    pub ciupgrade: Option<bool>,
    pub ciuser: Option<String>,
    pub cores: Option<u32>,
    pub cpu: Option<String>,
    pub cpulimit: Option<f32>,
    pub cpuunits: Option<u32>,
    pub description: Option<String>,
    pub efidisk0: Option<String>,
    pub force: Option<bool>,
    pub freeze: Option<bool>,
    pub hookscript: Option<String>,
    pub hotplug: Option<String>,
    pub hugepages: Option<String>,
    pub import_working_storage: Option<String>,
    pub ivshmem: Option<String>,
    pub keephugepages: Option<bool>,
    pub keyboard: Option<String>,
    pub kvm: Option<bool>,
    pub live_restore: Option<bool>,
    pub localtime: Option<bool>,
    pub lock: Option<String>,
    pub machine: Option<String>,
    pub memory: Option<String>,
    pub migrate_downtime: Option<f32>,
    pub migrate_speed: Option<i64>,
    pub name: Option<String>,
    pub nameserver: Option<String>,
    pub numa: Option<bool>,
    pub onboot: Option<bool>,
    pub ostype: Option<String>,
    pub pool: Option<String>,
    pub protection: Option<bool>,
    pub reboot: Option<bool>,
    pub rng0: Option<String>,
    pub scsihw: Option<String>,
    pub searchdomain: Option<String>,
    pub shares: Option<u32>,
    pub smbios1: Option<String>,
    pub smp: Option<u32>,
    pub sockets: Option<u32>,
    pub spice_enhancements: Option<String>,
    pub sshkeys: Option<String>,
    pub start: Option<bool>,
    pub startdate: Option<String>,
    pub tablet: Option<bool>,
    pub tags: Option<String>,
    pub tdf: Option<bool>,
    pub template: Option<bool>,
    pub tpmstate0: Option<String>,
    pub unique: Option<bool>,
    pub vcpus: Option<u32>,
    pub vga: Option<String>,
    pub vmgenid: Option<String>,
    pub vmstatestorage: Option<String>,
    pub watchdog: Option<String>,

    /// Shorthand for the first NIC; equivalent to `net[0]`.
    pub net0: Option<String>,
    /// Shorthand for the first cloud-init IP config; equivalent to
    /// `ipconfig[0]`.
    pub ipconfig0: Option<String>,

    // Indexed device families, expanded to `<prefix><index>` keys.
    pub hostpci: BTreeMap<u32, String>,
    pub ide: BTreeMap<u32, String>,
    pub ipconfig: BTreeMap<u32, String>,
    pub net: BTreeMap<u32, String>,
    pub numa_topology: BTreeMap<u32, String>,
    pub parallel: BTreeMap<u32, String>,
    pub sata: BTreeMap<u32, String>,
    pub scsi: BTreeMap<u32, String>,
    pub serial: BTreeMap<u32, String>,
    pub unused: BTreeMap<u32, String>,
    pub usb: BTreeMap<u32, String>,
    pub virtio: BTreeMap<u32, String>,
}

impl CreateVmOptions {
    pub fn new(vmid: u32, storage: impl Into<String>) -> Self {
        Self {
            vmid,
            storage: storage.into(),
            ..Self::default()
        }
    }

    /// Local validation of the supplied fields, run before any network
    /// call. Unsupplied fields are never checked.
    pub fn validate(&self) -> ProxmoxResult<()> {
        if self.vmid == 0 {
            return Err(ProxmoxError::argument("vmid must be a positive integer"));
        }
        if self.storage.is_empty() {
            return Err(ProxmoxError::argument("storage must not be empty"));
        }
        if let Some(ostype) = &self.ostype {
            if !OS_TYPES.contains(&ostype.to_lowercase().as_str()) {
                return Err(ProxmoxError::argument(format!("invalid ostype: {ostype}")));
            }
        }
        if let Some(bios) = &self.bios {
            if !BIOS_VALUES.contains(&bios.to_lowercase().as_str()) {
                return Err(ProxmoxError::argument(format!("invalid bios: {bios}")));
            }
        }
        for (key, count) in [
            ("cores", self.cores),
            ("sockets", self.sockets),
            ("smp", self.smp),
            ("vcpus", self.vcpus),
        ] {
            if count == Some(0) {
                return Err(ProxmoxError::argument(format!(
                    "{key} must be a positive integer"
                )));
            }
        }
        for (key, value) in [("memory", &self.memory), ("balloon", &self.balloon)] {
            if let Some(value) = value {
                let parsed: i64 = value.trim().parse().map_err(|_| {
                    ProxmoxError::argument(format!("invalid numeric value for {key}: {value}"))
                })?;
                if parsed <= 0 {
                    return Err(ProxmoxError::argument(format!(
                        "invalid numeric value for {key}: {value}"
                    )));
                }
            }
        }
        if let Some(net0) = &self.net0 {
            validate_network_config(net0)?;
        }
        for net in self.net.values() {
            validate_network_config(net)?;
        }
        Ok(())
    }

    /// Assemble the sparse creation payload. Fields the caller never
    /// supplied do not appear as keys, so the platform defaults them.
    pub fn to_payload(&self) -> BTreeMap<String, Value> {
        let mut p = BTreeMap::new();
        p.insert("vmid".to_string(), json!(self.vmid));
        p.insert("storage".to_string(), json!(self.storage));

        put_bool(&mut p, "acpi", self.acpi);
        put_str(&mut p, "affinity", &self.affinity);
        put_str(&mut p, "agent", &self.agent);
        put_str(&mut p, "amd-sev", &self.amd_sev);
        put_str(&mut p, "arch", &self.arch);
        put_str(&mut p, "archive", &self.archive);
        put_str(&mut p, "args", &self.args);
        put_str(&mut p, "audio0", &self.audio0);
        put_bool(&mut p, "autostart", self.autostart);
        put_str(&mut p, "balloon", &self.balloon);
        put_str(&mut p, "bios", &self.bios);
        put_str(&mut p, "boot", &self.boot);
        put_str(&mut p, "bootdisk", &self.bootdisk);
        put_num(&mut p, "bwlimit", self.bwlimit.map(Value::from));
        put_str(&mut p, "cicustom", &self.cicustom);
        put_str(&mut p, "cipassword", &self.cipassword);
        put_str(&mut p, "citype", &self.citype);
        put_bool(&mut p, "ciupgrade", self.ciupgrade);
        put_str(&mut p, "ciuser", &self.ciuser);
        put_num(&mut p, "cores", self.cores.map(Value::from));
        put_str(&mut p, "cpu", &self.cpu);
        put_num(&mut p, "cpulimit", self.cpulimit.map(Value::from));
        put_num(&mut p, "cpuunits", self.cpuunits.map(Value::from));
        put_str(&mut p, "description", &self.description);
        put_str(&mut p, "efidisk0", &self.efidisk0);
        put_bool(&mut p, "force", self.force);
        put_bool(&mut p, "freeze", self.freeze);
        put_str(&mut p, "hookscript", &self.hookscript);
        put_str(&mut p, "hotplug", &self.hotplug);
        put_str(&mut p, "hugepages", &self.hugepages);
        put_str(&mut p, "import-working-storage", &self.import_working_storage);
        put_str(&mut p, "ivshmem", &self.ivshmem);
        put_bool(&mut p, "keephugepages", self.keephugepages);
        put_str(&mut p, "keyboard", &self.keyboard);
        put_bool(&mut p, "kvm", self.kvm);
        put_bool(&mut p, "live-restore", self.live_restore);
        put_bool(&mut p, "localtime", self.localtime);
        put_str(&mut p, "lock", &self.lock);
        put_str(&mut p, "machine", &self.machine);
        put_str(&mut p, "memory", &self.memory);
        put_num(&mut p, "migrate_downtime", self.migrate_downtime.map(Value::from));
        put_num(&mut p, "migrate_speed", self.migrate_speed.map(Value::from));
        put_str(&mut p, "name", &self.name);
        put_str(&mut p, "nameserver", &self.nameserver);
        put_bool(&mut p, "numa", self.numa);
        put_bool(&mut p, "onboot", self.onboot);
        put_str(&mut p, "ostype", &self.ostype);
        put_str(&mut p, "pool", &self.pool);
        put_bool(&mut p, "protection", self.protection);
        put_bool(&mut p, "reboot", self.reboot);
        put_str(&mut p, "rng0", &self.rng0);
        put_str(&mut p, "scsihw", &self.scsihw);
        put_str(&mut p, "searchdomain", &self.searchdomain);
        put_num(&mut p, "shares", self.shares.map(Value::from));
        put_str(&mut p, "smbios1", &self.smbios1);
        put_num(&mut p, "smp", self.smp.map(Value::from));
        put_num(&mut p, "sockets", self.sockets.map(Value::from));
        put_str(&mut p, "spice_enhancements", &self.spice_enhancements);
        put_str(&mut p, "sshkeys", &self.sshkeys);
        put_bool(&mut p, "start", self.start);
        put_str(&mut p, "startdate", &self.startdate);
        put_bool(&mut p, "tablet", self.tablet);
        put_str(&mut p, "tags", &self.tags);
        put_bool(&mut p, "tdf", self.tdf);
        put_bool(&mut p, "template", self.template);
        put_str(&mut p, "tpmstate0", &self.tpmstate0);
        put_bool(&mut p, "unique", self.unique);
        put_num(&mut p, "vcpus", self.vcpus.map(Value::from));
        put_str(&mut p, "vga", &self.vga);
        put_str(&mut p, "vmgenid", &self.vmgenid);
        put_str(&mut p, "vmstatestorage", &self.vmstatestorage);
        put_str(&mut p, "watchdog", &self.watchdog);
        put_str(&mut p, "net0", &self.net0);
        put_str(&mut p, "ipconfig0", &self.ipconfig0);

        // Boot disk bound to the selected slot.
        if let Some(disk_type) = &self.disk_type {
            p.insert(
                disk_type.clone(),
                json!(format!("{}:{}", self.storage, self.disk_size_gb)),
            );
        }

        // ISO mounted as CD-ROM on the fixed ide2 slot.
        if let Some(iso) = self.iso.as_deref().filter(|i| !i.is_empty()) {
            p.insert("ide2".to_string(), json!(format!("{iso},media=cdrom")));
        }

        add_indexed(&mut p, "hostpci", &self.hostpci);
        add_indexed(&mut p, "ide", &self.ide);
        add_indexed(&mut p, "ipconfig", &self.ipconfig);
        add_indexed(&mut p, "net", &self.net);
        add_indexed(&mut p, "numa", &self.numa_topology);
        add_indexed(&mut p, "parallel", &self.parallel);
        add_indexed(&mut p, "sata", &self.sata);
        add_indexed(&mut p, "scsi", &self.scsi);
        add_indexed(&mut p, "serial", &self.serial);
        add_indexed(&mut p, "unused", &self.unused);
        add_indexed(&mut p, "usb", &self.usb);
        add_indexed(&mut p, "virtio", &self.virtio);

        p
    }
}

fn put_str(map: &mut BTreeMap<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        map.insert(key.to_string(), json!(value));
    }
}

fn put_bool(map: &mut BTreeMap<String, Value>, key: &str, value: Option<bool>) {
    if let Some(value) = value {
        map.insert(key.to_string(), json!(value));
    }
}

fn put_num(map: &mut BTreeMap<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value);
    }
}

/// Expand an index→value family into individually named keys
/// (`net {0: v}` becomes `net0 = v`).
fn add_indexed(map: &mut BTreeMap<String, Value>, prefix: &str, entries: &BTreeMap<u32, String>) {
    for (index, value) in entries {
        map.insert(format!("{prefix}{index}"), json!(value));
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Id allocation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Strategy for picking guest ids in a batch creation.
///
/// Allocation is best-effort: none of the strategies reserves ids on
/// the cluster, so a collision with a concurrently created guest
/// surfaces as that instance's failed [`CreateOutcome`].
#[async_trait]
pub trait IdAllocator: Send + Sync {
    async fn allocate(&self, api: &ProxmoxApi, count: usize) -> ProxmoxResult<Vec<u32>>;
}

/// Ask the cluster for its next free id and hand out consecutive ids
/// from there.
pub struct NextIdAllocator;

#[async_trait]
impl IdAllocator for NextIdAllocator {
    async fn allocate(&self, api: &ProxmoxApi, count: usize) -> ProxmoxResult<Vec<u32>> {
        let base = NodeManager::new(api).next_vm_id().await?;
        Ok((0..count as u32).map(|i| base + i).collect())
    }
}

/// Uniform random picks from a fixed id range, distinct within the
/// batch only.
pub struct RandomIdAllocator {
    pub min: u32,
    pub max: u32,
}

impl Default for RandomIdAllocator {
    fn default() -> Self {
        Self { min: 100, max: 999_999 }
    }
}

#[async_trait]
impl IdAllocator for RandomIdAllocator {
    async fn allocate(&self, _api: &ProxmoxApi, count: usize) -> ProxmoxResult<Vec<u32>> {
        if self.min >= self.max {
            return Err(ProxmoxError::argument(format!(
                "invalid id range {}..={}",
                self.min, self.max
            )));
        }
        let span = (self.max - self.min + 1) as usize;
        if count > span {
            return Err(ProxmoxError::argument(format!(
                "cannot allocate {count} distinct ids from a range of {span}"
            )));
        }
        let mut rng = rand::thread_rng();
        let mut ids: Vec<u32> = Vec::with_capacity(count);
        while ids.len() < count {
            let id = rng.gen_range(self.min..=self.max);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

/// Consecutive ids from a caller-chosen base, no cluster round trip.
pub struct SequentialIdAllocator {
    pub base: u32,
}

#[async_trait]
impl IdAllocator for SequentialIdAllocator {
    async fn allocate(&self, _api: &ProxmoxApi, count: usize) -> ProxmoxResult<Vec<u32>> {
        if self.base == 0 {
            return Err(ProxmoxError::argument("base id must be a positive integer"));
        }
        Ok((0..count as u32).map(|i| self.base + i).collect())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Provisioning
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Single and batched VM creation backed by `ProxmoxApi`.
pub struct ProvisioningManager<'a> {
    api: &'a ProxmoxApi,
}

impl<'a> ProvisioningManager<'a> {
    pub fn new(api: &'a ProxmoxApi) -> Self {
        Self { api }
    }

    /// Create one VM. Every failure (validation, transport, non-success
    /// status) is captured in the returned outcome instead of raised,
    /// so batch callers can continue past individual failures.
    pub async fn create_vm(&self, node: &str, options: &CreateVmOptions) -> CreateOutcome {
        if let Err(e) = options.validate() {
            return CreateOutcome::fail(Some(options.vmid), options.name.clone(), e.to_string());
        }
        let payload = options.to_payload();
        match self.submit(node, &payload).await {
            Ok(data) => CreateOutcome::ok(Some(options.vmid), options.name.clone(), data),
            Err(e) => {
                log::warn!("failed to create VM {} on {node}: {e}", options.vmid);
                CreateOutcome::fail(Some(options.vmid), options.name.clone(), e.to_string())
            }
        }
    }

    async fn submit(
        &self,
        node: &str,
        payload: &BTreeMap<String, Value>,
    ) -> ProxmoxResult<Value> {
        let resp = self
            .api
            .post_json(&format!("/api2/json/nodes/{node}/qemu"), payload)
            .await?;
        let body = resp.text().await.map_err(ProxmoxError::from)?;
        decode_envelope(&body)
    }

    /// Create `count` similar VMs concurrently.
    ///
    /// All instances are dispatched at once and their outcomes gathered;
    /// one instance's failure never cancels its siblings. The returned
    /// vector has exactly `count` entries in dispatch order. Ids come
    /// from the supplied allocator; names from the pattern (`{}` is
    /// replaced by the 1-based instance number, a pattern without `{}`
    /// gets the number suffixed) or a random fallback.
    pub async fn create_multiple(
        &self,
        node: &str,
        count: usize,
        template: &CreateVmOptions,
        name_pattern: Option<&str>,
        allocator: &dyn IdAllocator,
    ) -> ProxmoxResult<Vec<CreateOutcome>> {
        if count == 0 {
            return Err(ProxmoxError::argument("count must be at least 1"));
        }

        let ids = allocator.allocate(self.api, count).await?;
        log::debug!("batch-creating {count} VMs on {node} with ids {ids:?}");

        let jobs = ids.into_iter().enumerate().map(|(index, vmid)| {
            let mut options = template.clone();
            options.vmid = vmid;
            options.name = Some(instance_name(name_pattern, index));
            async move { self.create_vm(node, &options).await }
        });

        Ok(futures::future::join_all(jobs).await)
    }
}

/// Name for the `index`-th instance (0-based) of a batch.
pub(crate) fn instance_name(pattern: Option<&str>, index: usize) -> String {
    match pattern.filter(|p| !p.is_empty()) {
        Some(p) if p.contains("{}") => p.replacen("{}", &(index + 1).to_string(), 1),
        Some(p) => format!("{p}-{}", index + 1),
        None => {
            let id = Uuid::new_v4().simple().to_string();
            format!("vm-{}", &id[..8])
        }
    }
}

/// Random locally administered unicast MAC address for NIC config
/// strings.
pub fn random_mac_address() -> String {
    let mut bytes = [0u8; 6];
    rand::thread_rng().fill(&mut bytes);
    bytes[0] = (bytes[0] & 0xFE) | 0x02;
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_sparse() {
        let options = CreateVmOptions {
            name: Some("web01".into()),
            cores: Some(4),
            ..CreateVmOptions::new(101, "local-lvm")
        };
        let payload = options.to_payload();
        let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["cores", "name", "storage", "vmid"]);
        assert_eq!(payload["cores"], json!(4));
        assert_eq!(payload["vmid"], json!(101));
    }

    #[test]
    fn indexed_family_expands_to_single_slot() {
        let mut options = CreateVmOptions::new(102, "local-lvm");
        options
            .net
            .insert(0, "virtio=AA:BB:CC:DD:EE:FF,bridge=vmbr0".into());
        let payload = options.to_payload();
        assert_eq!(payload["net0"], json!("virtio=AA:BB:CC:DD:EE:FF,bridge=vmbr0"));
        assert!(!payload.contains_key("net1"));
    }

    #[test]
    fn iso_synthesizes_cdrom_on_ide2() {
        let options = CreateVmOptions {
            iso: Some("local:iso/debian-12.iso".into()),
            ..CreateVmOptions::new(103, "local-lvm")
        };
        let payload = options.to_payload();
        assert_eq!(payload["ide2"], json!("local:iso/debian-12.iso,media=cdrom"));
    }

    #[test]
    fn boot_disk_bound_to_selected_slot() {
        let options = CreateVmOptions {
            disk_type: Some("scsi0".into()),
            disk_size_gb: 32,
            ..CreateVmOptions::new(104, "ceph-pool")
        };
        let payload = options.to_payload();
        assert_eq!(payload["scsi0"], json!("ceph-pool:32"));
    }

    #[test]
    fn dashed_keys_use_platform_names() {
        let options = CreateVmOptions {
            amd_sev: Some("type=std".into()),
            live_restore: Some(true),
            import_working_storage: Some("local".into()),
            ..CreateVmOptions::new(105, "local-lvm")
        };
        let payload = options.to_payload();
        assert!(payload.contains_key("amd-sev"));
        assert!(payload.contains_key("live-restore"));
        assert!(payload.contains_key("import-working-storage"));
        assert!(!payload.contains_key("amd_sev"));
    }

    #[test]
    fn booleans_serialize_as_json_booleans() {
        let options = CreateVmOptions {
            onboot: Some(true),
            kvm: Some(false),
            ..CreateVmOptions::new(106, "local-lvm")
        };
        let payload = options.to_payload();
        assert_eq!(payload["onboot"], json!(true));
        assert_eq!(payload["kvm"], json!(false));
    }

    #[test]
    fn validate_rejects_bad_ostype() {
        let options = CreateVmOptions {
            ostype: Some("templeos".into()),
            ..CreateVmOptions::new(107, "local-lvm")
        };
        assert!(matches!(
            options.validate().unwrap_err(),
            ProxmoxError::Argument(_)
        ));
    }

    #[test]
    fn validate_accepts_mixed_case_allowlist_values() {
        let options = CreateVmOptions {
            ostype: Some("L26".into()),
            bios: Some("OVMF".into()),
            ..CreateVmOptions::new(108, "local-lvm")
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_cores_and_bad_memory() {
        let options = CreateVmOptions {
            cores: Some(0),
            ..CreateVmOptions::new(109, "local-lvm")
        };
        assert!(options.validate().is_err());

        let options = CreateVmOptions {
            memory: Some("lots".into()),
            ..CreateVmOptions::new(109, "local-lvm")
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn validate_checks_net_strings() {
        let options = CreateVmOptions {
            net0: Some("virtio=AA:BB:CC:DD:EE:FF".into()),
            ..CreateVmOptions::new(110, "local-lvm")
        };
        assert!(matches!(
            options.validate().unwrap_err(),
            ProxmoxError::Argument(_)
        ));
    }

    #[test]
    fn instance_names_from_pattern_placeholder() {
        assert_eq!(instance_name(Some("web-{}"), 0), "web-1");
        assert_eq!(instance_name(Some("web-{}"), 2), "web-3");
    }

    #[test]
    fn instance_names_suffix_plain_pattern() {
        assert_eq!(instance_name(Some("db"), 1), "db-2");
    }

    #[test]
    fn instance_names_fallback_is_distinct() {
        let a = instance_name(None, 0);
        let b = instance_name(None, 0);
        assert!(a.starts_with("vm-"));
        assert_ne!(a, b);
    }

    #[test]
    fn random_mac_is_locally_administered_unicast() {
        let mac = random_mac_address();
        assert_eq!(mac.len(), 17);
        let first = u8::from_str_radix(&mac[..2], 16).unwrap();
        assert_eq!(first & 0x01, 0, "multicast bit must be clear");
        assert_eq!(first & 0x02, 0x02, "locally administered bit must be set");
    }

    #[tokio::test]
    async fn sequential_allocator_hands_out_consecutive_ids() {
        let cfg = crate::types::ProxmoxConfig {
            api_url: "https://127.0.0.1:1".into(),
            username: "root".into(),
            password: "s".into(),
            realm: "pam".into(),
            timeout_secs: 1,
        };
        let api = ProxmoxApi::new(&cfg).unwrap();
        let ids = SequentialIdAllocator { base: 500 }
            .allocate(&api, 3)
            .await
            .unwrap();
        assert_eq!(ids, vec![500, 501, 502]);
    }

    #[tokio::test]
    async fn random_allocator_ids_are_distinct_and_in_range() {
        let cfg = crate::types::ProxmoxConfig {
            api_url: "https://127.0.0.1:1".into(),
            username: "root".into(),
            password: "s".into(),
            realm: "pam".into(),
            timeout_secs: 1,
        };
        let api = ProxmoxApi::new(&cfg).unwrap();
        let alloc = RandomIdAllocator { min: 100, max: 120 };
        let ids = alloc.allocate(&api, 10).await.unwrap();
        assert_eq!(ids.len(), 10);
        let mut unique = ids.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 10);
        assert!(ids.iter().all(|id| (100..=120).contains(id)));
    }

    #[tokio::test]
    async fn random_allocator_rejects_oversized_batches() {
        let cfg = crate::types::ProxmoxConfig {
            api_url: "https://127.0.0.1:1".into(),
            username: "root".into(),
            password: "s".into(),
            realm: "pam".into(),
            timeout_secs: 1,
        };
        let api = ProxmoxApi::new(&cfg).unwrap();
        let alloc = RandomIdAllocator { min: 100, max: 102 };
        assert!(matches!(
            alloc.allocate(&api, 10).await.unwrap_err(),
            ProxmoxError::Argument(_)
        ));
    }
}
