//! ESXi / vSphere REST API client.
//!
//! Owns the HTTP transport, the API session and the retry policy.
//! Communicates with the host via `https://{host}:{port}/rest/...`;
//! every response wraps its payload in a `{"value": ...}` envelope.

use crate::error::{truncate_body, EsxiError, EsxiResult};
use crate::types::EsxiConfig;

use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::RwLock;

/// Attempt cap shared by authentication replays and transient retries.
pub const MAX_RETRIES: u32 = 3;
/// Base delay for the linear backoff between attempts.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Header carrying the API session id on every authenticated call.
const SESSION_HEADER: &str = "vmware-api-session-id";

pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt))
}

#[derive(Debug, Default)]
struct SessionState {
    session_id: Option<String>,
    disposed: bool,
}

/// vSphere REST API client with session-based authentication.
pub struct EsxiClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    state: RwLock<SessionState>,
}

impl EsxiClient {
    /// Build a new client from config (does NOT create a session yet).
    ///
    /// Management endpoints ship self-signed certificates, so TLS
    /// verification is deliberately disabled on this transport.
    pub fn new(config: &EsxiConfig) -> EsxiResult<Self> {
        let base_url = format!("https://{}:{}", config.host.trim_end_matches('/'), config.port);
        url::Url::parse(&base_url)
            .map_err(|e| EsxiError::argument(format!("invalid host {:?}: {e}", config.host)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| EsxiError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            state: RwLock::new(SessionState::default()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.session_id.is_some()
    }

    pub async fn is_disposed(&self) -> bool {
        self.state.read().await.disposed
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ── Session management ──────────────────────────────────────────

    /// Exchange the Basic-Auth credentials for an API session id and
    /// replace the session state. Safe to call repeatedly; each call
    /// fully replaces the previous session id.
    pub async fn authenticate(&self) -> EsxiResult<()> {
        let url = self.url("/rest/com/vmware/cis/session");
        let resp = self
            .execute(
                || {
                    self.http
                        .post(&url)
                        .basic_auth(&self.username, Some(&self.password))
                },
                false,
            )
            .await
            .map_err(|e| match e {
                EsxiError::Disposed => EsxiError::Disposed,
                other => EsxiError::auth(other.to_string()),
            })?;

        let body = resp
            .text()
            .await
            .map_err(|e| EsxiError::auth(format!("failed to read login response: {e}")))?;
        let root: serde_json::Value = serde_json::from_str(&body).map_err(|_| {
            EsxiError::auth(format!("invalid login response: {}", truncate_body(&body)))
        })?;
        let session_id = root
            .get("value")
            .and_then(|v| v.as_str())
            .ok_or_else(|| EsxiError::auth("failed to retrieve session id from login response"))?;

        let mut state = self.state.write().await;
        if state.disposed {
            return Err(EsxiError::Disposed);
        }
        state.session_id = Some(session_id.to_string());
        log::debug!("esxi session established for {}", self.username);
        Ok(())
    }

    /// `authenticate` as an explicitly `Send`-boxed future.
    ///
    /// `execute` and `authenticate` are mutually recursive async fns; the
    /// explicit boxed return type here breaks the otherwise-cyclic `Send`
    /// auto-trait inference between them without changing behaviour.
    fn authenticate_boxed(&self) -> BoxFuture<'_, EsxiResult<()>> {
        Box::pin(self.authenticate())
    }

    /// Release the client: best-effort server-side session DELETE,
    /// exactly once, then local teardown. Idempotent; any call after
    /// the first `dispose` fails with `Disposed` before network I/O.
    pub async fn dispose(&self) {
        let session_id = {
            let mut state = self.state.write().await;
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.session_id.take()
        };

        if let Some(session_id) = session_id {
            let url = self.url("/rest/com/vmware/cis/session");
            let _ = self
                .http
                .delete(&url)
                .header(SESSION_HEADER, session_id)
                .send()
                .await;
        }
    }

    // ── Request execution ───────────────────────────────────────────

    /// Execute a request with the uniform resilience policy: replay
    /// once-per-attempt after reauthentication on 401, back off
    /// linearly on other failures, all on one bounded attempt counter.
    pub(crate) async fn execute<F>(&self, build_request: F, allow_reauth: bool) -> EsxiResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_failure: Option<EsxiError> = None;

        for attempt in 1..=MAX_RETRIES {
            let session_id = {
                let state = self.state.read().await;
                if state.disposed {
                    return Err(EsxiError::Disposed);
                }
                state.session_id.clone()
            };

            let mut req = build_request();
            if let Some(session_id) = &session_id {
                req = req.header(SESSION_HEADER, session_id);
            }

            match req.send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED && allow_reauth => {
                    let body = resp.text().await.unwrap_or_default();
                    last_failure = Some(EsxiError::RequestFailed {
                        status: StatusCode::UNAUTHORIZED.as_u16(),
                        body: truncate_body(&body),
                    });
                    log::warn!(
                        "esxi session rejected (401), reauthenticating (attempt {attempt}/{MAX_RETRIES})"
                    );
                    // Boxed: execute and authenticate are mutually
                    // recursive async fns.
                    self.authenticate_boxed().await?;
                    continue;
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    last_failure = Some(EsxiError::RequestFailed {
                        status,
                        body: truncate_body(&body),
                    });
                }
                Err(e) => last_failure = Some(e.into()),
            }

            if attempt < MAX_RETRIES {
                let delay = backoff_delay(attempt);
                if let Some(failure) = &last_failure {
                    log::warn!(
                        "esxi request failed (attempt {attempt}/{MAX_RETRIES}): {failure} - retrying in {}ms",
                        delay.as_millis()
                    );
                }
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_failure.unwrap_or_else(|| {
            EsxiError::Transport(format!("request failed after {MAX_RETRIES} attempts"))
        }))
    }

    // ── HTTP helpers ────────────────────────────────────────────────

    /// GET and unwrap the `value` envelope into `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> EsxiResult<T> {
        let url = self.url(path);
        let resp = self.execute(|| self.http.get(&url), true).await?;
        let body = resp.text().await.map_err(EsxiError::from)?;
        decode_envelope(&body)
    }

    /// POST a JSON body and unwrap the `value` envelope.
    pub async fn post_json<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> EsxiResult<T> {
        let url = self.url(path);
        let resp = self.execute(|| self.http.post(&url).json(body), true).await?;
        let text = resp.text().await.map_err(EsxiError::from)?;
        decode_envelope(&text)
    }

    /// POST with an empty body, discarding the response payload.
    pub async fn post_empty(&self, path: &str) -> EsxiResult<()> {
        let url = self.url(path);
        self.execute(|| self.http.post(&url), true).await?;
        Ok(())
    }

    /// PATCH a JSON body, discarding the response payload.
    pub async fn patch_json<B: serde::Serialize>(&self, path: &str, body: &B) -> EsxiResult<()> {
        let url = self.url(path);
        self.execute(|| self.http.patch(&url).json(body), true).await?;
        Ok(())
    }

    /// DELETE, discarding the response payload.
    pub async fn delete(&self, path: &str) -> EsxiResult<()> {
        let url = self.url(path);
        self.execute(|| self.http.delete(&url), true).await?;
        Ok(())
    }
}

/// Unwrap the `{"value": ...}` success envelope into `T`.
///
/// The single place that understands the envelope shape; every resource
/// operation funnels through it.
pub(crate) fn decode_envelope<T: DeserializeOwned>(body: &str) -> EsxiResult<T> {
    let root: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| EsxiError::decode(format!("JSON parse error: {e}"), body))?;
    let value = root
        .get("value")
        .ok_or_else(|| EsxiError::decode("missing `value` field in envelope", body))?;
    serde_json::from_value(value.clone())
        .map_err(|e| EsxiError::decode(format!("unexpected `value` shape: {e}"), body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EsxiConfig;

    fn test_config() -> EsxiConfig {
        EsxiConfig {
            host: "127.0.0.1".into(),
            port: 1,
            username: "root".into(),
            password: "secret".into(),
            timeout_secs: 1,
        }
    }

    #[test]
    fn envelope_unwrap_roundtrip() {
        let v: Vec<String> = decode_envelope(r#"{"value":["a","b"]}"#).unwrap();
        assert_eq!(v, vec!["a", "b"]);
    }

    #[test]
    fn envelope_missing_value_is_decode_error() {
        let err = decode_envelope::<String>(r#"{"data":"x"}"#).unwrap_err();
        assert!(matches!(err, EsxiError::Decode { .. }));
    }

    #[test]
    fn envelope_malformed_body_is_decode_error() {
        let err = decode_envelope::<String>("not json").unwrap_err();
        assert!(matches!(err, EsxiError::Decode { .. }));
    }

    #[test]
    fn backoff_is_linear_and_non_decreasing() {
        let mut prev = Duration::ZERO;
        for attempt in 1..=MAX_RETRIES {
            let d = backoff_delay(attempt);
            assert!(d >= prev);
            prev = d;
        }
        assert_eq!(backoff_delay(2), Duration::from_millis(2 * RETRY_DELAY_MS));
    }

    #[test]
    fn base_url_includes_port() {
        let client = EsxiClient::new(&test_config()).unwrap();
        assert_eq!(client.base_url(), "https://127.0.0.1:1");
    }

    #[tokio::test]
    async fn disposed_client_fails_fast_without_network() {
        let client = EsxiClient::new(&test_config()).unwrap();
        client.dispose().await;
        let err = client
            .get::<serde_json::Value>("/rest/vcenter/vm")
            .await
            .unwrap_err();
        assert!(matches!(err, EsxiError::Disposed));
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let client = EsxiClient::new(&test_config()).unwrap();
        client.dispose().await;
        client.dispose().await;
        assert!(client.is_disposed().await);
    }
}
