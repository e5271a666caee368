//! Console access: VNC proxy tickets, noVNC URLs, key injection.
//!
//! Only the REST side of console access lives here — the VNC wire
//! protocol and rendering belong to the consuming application.

use crate::api::ProxmoxApi;
use crate::error::{ProxmoxError, ProxmoxResult};
use crate::types::{NumberOrString, VncTicket};
use crate::vm::VmManager;

use serde::Deserialize;
use serde_json::json;

/// Console operations backed by `ProxmoxApi`.
pub struct ConsoleManager<'a> {
    api: &'a ProxmoxApi,
}

#[derive(Debug, Deserialize)]
struct VncProxyData {
    ticket: String,
    port: NumberOrString,
}

impl<'a> ConsoleManager<'a> {
    pub fn new(api: &'a ProxmoxApi) -> Self {
        Self { api }
    }

    /// Open a VNC proxy on the node and return its one-shot ticket.
    pub async fn vnc_ticket(&self, node: &str, vmid: u32) -> ProxmoxResult<VncTicket> {
        let data: VncProxyData = self
            .api
            .post_empty_decoded(&format!("/api2/json/nodes/{node}/qemu/{vmid}/vncproxy"))
            .await?;
        let port = data
            .port
            .as_u32()
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| ProxmoxError::decode("vncproxy returned an invalid port", ""))?;
        Ok(VncTicket {
            ticket: data.ticket,
            port,
        })
    }

    /// Synthesize the embedded noVNC console URL for a guest.
    pub async fn novnc_url(&self, node: &str, vmid: u32) -> ProxmoxResult<String> {
        let status = VmManager::new(self.api).status(node, vmid).await?;
        let name = status.name.unwrap_or_default();
        Ok(format!(
            "{}/?console=kvm&novnc=1&vmid={vmid}&vmname={name}&node={node}&resize=off&cmd=",
            self.api.base_url()
        ))
    }

    /// Inject a key event into the guest console (qemu key names).
    pub async fn send_key(&self, node: &str, vmid: u32, key: &str) -> ProxmoxResult<()> {
        if key.is_empty() {
            return Err(ProxmoxError::argument("key cannot be empty"));
        }
        let body = json!({ "key": key });
        self.api
            .post_json(&format!("/api2/json/nodes/{node}/qemu/{vmid}/sendkey"), &body)
            .await?;
        Ok(())
    }

    /// Fetch the current console screenshot as raw image bytes.
    pub async fn screenshot(&self, node: &str, vmid: u32) -> ProxmoxResult<Vec<u8>> {
        self.api
            .get_bytes(&format!("/api2/json/nodes/{node}/qemu/{vmid}/screenshot"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_key_rejects_empty_key_without_network() {
        let cfg = crate::types::ProxmoxConfig {
            api_url: "https://127.0.0.1:1".into(),
            username: "root".into(),
            password: "s".into(),
            realm: "pam".into(),
            timeout_secs: 1,
        };
        let api = ProxmoxApi::new(&cfg).unwrap();
        let err = ConsoleManager::new(&api)
            .send_key("pve", 100, "")
            .await
            .unwrap_err();
        assert!(matches!(err, ProxmoxError::Argument(_)));
    }
}
