//! VM lifecycle management via the vSphere REST API.

use crate::client::EsxiClient;
use crate::error::{EsxiError, EsxiResult};
use crate::types::{CreateOutcome, EsxiVmSpec, VmSummary};

use serde_json::json;
use uuid::Uuid;

/// Power transitions accepted by [`VmManager::power_action`].
pub const POWER_ACTIONS: &[&str] = &["start", "stop", "suspend", "reset"];

/// Largest batch the guided-creation flow accepts.
pub const BATCH_LIMIT: usize = 5;

/// High-level VM operations backed by `EsxiClient`.
pub struct VmManager<'a> {
    client: &'a EsxiClient,
}

impl<'a> VmManager<'a> {
    pub fn new(client: &'a EsxiClient) -> Self {
        Self { client }
    }

    // ── List / Get ──────────────────────────────────────────────────

    pub async fn list_vms(&self) -> EsxiResult<Vec<VmSummary>> {
        self.client.get("/rest/vcenter/vm").await
    }

    /// Full detail record; the shape varies widely across vSphere
    /// versions so it is surfaced as decoded JSON.
    pub async fn get_vm(&self, vm_id: &str) -> EsxiResult<serde_json::Value> {
        require_vm_id(vm_id)?;
        self.client.get(&format!("/rest/vcenter/vm/{vm_id}")).await
    }

    // ── Create / Delete ─────────────────────────────────────────────

    /// Create a VM. The spec travels wrapped as `{"spec": ...}`;
    /// returns the platform-assigned VM identifier.
    pub async fn create_vm(&self, spec: &EsxiVmSpec) -> EsxiResult<String> {
        if spec.name.is_empty() {
            return Err(EsxiError::argument("vm name cannot be empty"));
        }
        let body = json!({ "spec": spec });
        let resp: serde_json::Value = self.client.post_json("/rest/vcenter/vm", &body).await?;
        extract_vm_id(&resp)
    }

    pub async fn delete_vm(&self, vm_id: &str) -> EsxiResult<()> {
        require_vm_id(vm_id)?;
        self.client.delete(&format!("/rest/vcenter/vm/{vm_id}")).await
    }

    // ── Power operations ────────────────────────────────────────────

    /// Issue a power transition. The action name is checked against the
    /// fixed allowed set before any request is built.
    pub async fn power_action(&self, vm_id: &str, action: &str) -> EsxiResult<()> {
        require_vm_id(vm_id)?;
        if !POWER_ACTIONS.contains(&action) {
            return Err(EsxiError::argument(format!(
                "invalid power operation {action:?}, expected one of {POWER_ACTIONS:?}"
            )));
        }
        self.client
            .post_empty(&format!("/rest/vcenter/vm/{vm_id}/power/{action}"))
            .await
    }

    pub async fn power_on(&self, vm_id: &str) -> EsxiResult<()> {
        self.power_action(vm_id, "start").await
    }

    pub async fn power_off(&self, vm_id: &str) -> EsxiResult<()> {
        self.power_action(vm_id, "stop").await
    }

    pub async fn suspend(&self, vm_id: &str) -> EsxiResult<()> {
        self.power_action(vm_id, "suspend").await
    }

    pub async fn reset(&self, vm_id: &str) -> EsxiResult<()> {
        self.power_action(vm_id, "reset").await
    }

    // ── Hardware ────────────────────────────────────────────────────

    pub async fn get_hardware(&self, vm_id: &str) -> EsxiResult<serde_json::Value> {
        require_vm_id(vm_id)?;
        self.client
            .get(&format!("/rest/vcenter/vm/{vm_id}/hardware"))
            .await
    }

    /// Patch the hardware config; the spec travels wrapped as
    /// `{"spec": ...}`.
    pub async fn update_hardware(
        &self,
        vm_id: &str,
        spec: &serde_json::Value,
    ) -> EsxiResult<()> {
        require_vm_id(vm_id)?;
        let body = json!({ "spec": spec });
        self.client
            .patch_json(&format!("/rest/vcenter/vm/{vm_id}/hardware"), &body)
            .await
    }

    // ── Batch creation ──────────────────────────────────────────────

    /// Create up to [`BATCH_LIMIT`] similar VMs concurrently.
    ///
    /// All instances are dispatched at once and their outcomes
    /// gathered; one instance's failure never cancels its siblings.
    /// The returned vector has exactly `count` entries in dispatch
    /// order. ESXi assigns ids server-side, so only names vary per
    /// instance: `{}` in the pattern is replaced by the 1-based
    /// instance number, a plain pattern gets the number suffixed, and
    /// without a pattern a random name is generated.
    pub async fn create_multiple(
        &self,
        count: usize,
        template: &EsxiVmSpec,
        name_pattern: Option<&str>,
    ) -> EsxiResult<Vec<CreateOutcome>> {
        if count == 0 || count > BATCH_LIMIT {
            return Err(EsxiError::argument(format!(
                "count must be between 1 and {BATCH_LIMIT}"
            )));
        }

        let jobs = (0..count).map(|index| {
            let mut spec = template.clone();
            spec.name = instance_name(name_pattern, index);
            async move {
                let name = Some(spec.name.clone());
                match self.create_vm(&spec).await {
                    Ok(vm_id) => CreateOutcome::ok(name, vm_id),
                    Err(e) => {
                        log::warn!("failed to create VM {:?}: {e}", name.as_deref().unwrap_or(""));
                        CreateOutcome::fail(name, e.to_string())
                    }
                }
            }
        });

        Ok(futures::future::join_all(jobs).await)
    }
}

fn require_vm_id(vm_id: &str) -> EsxiResult<()> {
    if vm_id.trim().is_empty() {
        return Err(EsxiError::argument("vm id cannot be empty"));
    }
    Ok(())
}

/// Pull the new VM id out of either creation response shape: some
/// deployments return a bare `{"value": "vm-42"}`, others
/// `{"value": {"id": ...}}`.
fn extract_vm_id(value: &serde_json::Value) -> EsxiResult<String> {
    match value {
        serde_json::Value::String(id) => Ok(id.clone()),
        serde_json::Value::Object(map) => map
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| EsxiError::decode("creation response has no `id`", &value.to_string())),
        other => Err(EsxiError::decode(
            "unexpected creation response shape",
            &other.to_string(),
        )),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EsxiConfig;

    fn client() -> EsxiClient {
        EsxiClient::new(&EsxiConfig {
            host: "127.0.0.1".into(),
            port: 1,
            username: "root".into(),
            password: "s".into(),
            timeout_secs: 1,
        })
        .unwrap()
    }

    #[test]
    fn extract_vm_id_from_bare_string() {
        assert_eq!(extract_vm_id(&json!("vm-42")).unwrap(), "vm-42");
    }

    #[test]
    fn extract_vm_id_from_object() {
        assert_eq!(extract_vm_id(&json!({"id": "vm-7"})).unwrap(), "vm-7");
    }

    #[test]
    fn extract_vm_id_rejects_other_shapes() {
        assert!(matches!(
            extract_vm_id(&json!(42)).unwrap_err(),
            EsxiError::Decode { .. }
        ));
    }

    #[test]
    fn instance_names_from_pattern() {
        assert_eq!(instance_name(Some("node-{}"), 0), "node-1");
        assert_eq!(instance_name(Some("node"), 4), "node-5");
        assert!(instance_name(None, 0).starts_with("vm-"));
    }

    #[tokio::test]
    async fn power_action_rejects_invalid_state_without_network() {
        let client = client();
        let err = VmManager::new(&client)
            .power_action("vm-1", "powered_sideways")
            .await
            .unwrap_err();
        assert!(matches!(err, EsxiError::Argument(_)));
    }

    #[tokio::test]
    async fn create_vm_rejects_empty_name_without_network() {
        let client = client();
        let err = VmManager::new(&client)
            .create_vm(&EsxiVmSpec::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EsxiError::Argument(_)));
    }

    #[tokio::test]
    async fn batch_count_is_capped() {
        let client = client();
        let manager = VmManager::new(&client);
        let template = EsxiVmSpec {
            name: "t".into(),
            ..EsxiVmSpec::default()
        };
        for bad in [0, BATCH_LIMIT + 1] {
            let err = manager
                .create_multiple(bad, &template, Some("t-{}"))
                .await
                .unwrap_err();
            assert!(matches!(err, EsxiError::Argument(_)), "count={bad}");
        }
    }

    #[tokio::test]
    async fn batch_against_unreachable_host_reports_per_instance_failures() {
        let client = client();
        let manager = VmManager::new(&client);
        let template = EsxiVmSpec {
            name: "t".into(),
            ..EsxiVmSpec::default()
        };
        let outcomes = manager
            .create_multiple(3, &template, Some("t-{}"))
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 3);
        for (i, outcome) in outcomes.iter().enumerate() {
            assert!(!outcome.success);
            assert_eq!(outcome.name.as_deref(), Some(format!("t-{}", i + 1).as_str()));
            assert!(outcome.error_message.is_some());
        }
    }
}
