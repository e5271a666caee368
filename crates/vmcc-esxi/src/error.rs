//! Error types for the ESXi management crate.

use thiserror::Error;

/// Categorised failures surfaced by every public operation.
#[derive(Debug, Error)]
pub enum EsxiError {
    /// Session creation failed or the session id was missing from the
    /// response envelope.
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

    /// Response body did not match the expected `{"value": ...}` envelope.
    #[error("failed to decode response: {detail} (body: {body})")]
    Decode { detail: String, body: String },

    /// Operation attempted after the client was disposed.
    #[error("client has been disposed")]
    Disposed,

    /// Network-level failure (timeout, connection refused, TLS setup).
    #[error("transport error: {0}")]
    Transport(String),
}

impl EsxiError {
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

impl From<reqwest::Error> for EsxiError {
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

impl From<serde_json::Error> for EsxiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode {
            detail: format!("JSON parse error: {e}"),
            body: String::new(),
        }
    }
}

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
pub type EsxiResult<T> = Result<T, EsxiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_diagnostics() {
        let e = EsxiError::RequestFailed {
            status: 503,
            body: "maintenance".into(),
        };
        assert!(e.to_string().contains("503"));
        assert!(e.to_string().contains("maintenance"));
    }
}
