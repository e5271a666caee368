//! Error types for the Proxmox VE management crate.

use thiserror::Error;

/// Categorised failures surfaced by every public operation.
#[derive(Debug, Error)]
pub enum ProxmoxError {
    /// Login handshake failed or the ticket/CSRF fields were missing
    /// from the response envelope.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Caller-supplied value rejected by local validation, before any
    /// network call is made.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Remote call returned a non-success status after retries were
    /// exhausted. Carries the status and body for diagnosis.
    #[error("request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// Response body did not match the expected `{"data": ...}` envelope.
    #[error("failed to decode response: {detail} (body: {body})")]
    Decode { detail: String, body: String },

    /// Operation attempted after the client was disposed.
    #[error("client has been disposed")]
    Disposed,

    /// Network-level failure (timeout, connection refused, TLS setup).
    #[error("transport error: {0}")]
    Transport(String),
}

impl ProxmoxError {
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn argument(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }

    pub fn decode(detail: impl Into<String>, body: &str) -> Self {
        Self::Decode {
            detail: detail.into(),
            body: truncate_body(body),
        }
    }
}

impl From<reqwest::Error> for ProxmoxError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Transport(format!("request timed out: {e}"))
        } else if e.is_connect() {
            Self::Transport(format!("connection failed: {e}"))
        } else {
            Self::Transport(format!("HTTP error: {e}"))
        }
    }
}

impl From<serde_json::Error> for ProxmoxError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode {
            detail: format!("JSON parse error: {e}"),
            body: String::new(),
        }
    }
}

/// Cap diagnostic bodies so a large HTML error page does not flood logs.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 500;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}

/// Convenience alias.
pub type ProxmoxResult<T> = Result<T, ProxmoxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failed_display_carries_status_and_body() {
        let e = ProxmoxError::RequestFailed {
            status: 500,
            body: "internal error".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("internal error"));
    }

    #[test]
    fn truncate_body_short_passthrough() {
        assert_eq!(truncate_body("ok"), "ok");
    }

    #[test]
    fn truncate_body_caps_long_bodies() {
        let long = "x".repeat(2000);
        let t = truncate_body(&long);
        assert!(t.len() < 600);
        assert!(t.ends_with('…'));
    }
}
