//! Proxmox VE REST API client.
//!
//! Owns the HTTP transport, the ticket/CSRF session state and the retry
//! policy every higher-level operation goes through. Communicates with
//! the cluster via `https://{host}:8006/api2/json/...`.

use crate::error::{truncate_body, ProxmoxError, ProxmoxResult};
use crate::types::ProxmoxConfig;

use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::RwLock;

/// Attempt cap shared by authentication replays and transient retries.
pub const MAX_RETRIES: u32 = 3;
/// Base delay for the linear backoff between attempts.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Linear backoff: attempt 1 waits one base delay, attempt 2 two, etc.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt))
}

/// Ticket + anti-CSRF token pair. Always replaced as a whole so
/// concurrent readers never observe a half-updated pair.
#[derive(Debug, Clone)]
struct AuthTokens {
    ticket: String,
    csrf: String,
}

#[derive(Debug, Default)]
struct SessionState {
    auth: Option<AuthTokens>,
    disposed: bool,
}

/// Proxmox VE API client with session-based authentication.
#[derive(Debug)]
pub struct ProxmoxApi {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    realm: String,
    state: RwLock<SessionState>,
}

impl ProxmoxApi {
    /// Build a new client from config (does NOT authenticate yet).
    ///
    /// Management endpoints ship self-signed certificates, so TLS
    /// verification is deliberately disabled on this transport.
    pub fn new(config: &ProxmoxConfig) -> ProxmoxResult<Self> {
        let base_url = config.api_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url)
            .map_err(|e| ProxmoxError::argument(format!("invalid API URL {base_url:?}: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ProxmoxError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            realm: config.realm.clone(),
            state: RwLock::new(SessionState::default()),
        })
    }

    /// API base URL, without the `/api2/json` prefix.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether an authenticated session is currently held.
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.auth.is_some()
    }

    pub async fn is_disposed(&self) -> bool {
        self.state.read().await.disposed
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ── Session management ──────────────────────────────────────────

    /// Log in with the stored credentials and replace the session state.
    ///
    /// Safe to call repeatedly: each successful call fully replaces the
    /// previous ticket/CSRF pair. Concurrent requests keep reading the
    /// prior snapshot until the write completes.
    pub async fn authenticate(&self) -> ProxmoxResult<()> {
        let url = self.url("/api2/json/access/ticket");
        let params = [
            ("username", format!("{}@{}", self.username, self.realm)),
            ("password", self.password.clone()),
        ];

        let resp = self
            .execute(|| self.http.post(&url).form(&params), false)
            .await
            .map_err(|e| match e {
                ProxmoxError::Disposed => ProxmoxError::Disposed,
                other => ProxmoxError::auth(other.to_string()),
            })?;

        let body = resp
            .text()
            .await
            .map_err(|e| ProxmoxError::auth(format!("failed to read login response: {e}")))?;
        let root: serde_json::Value = serde_json::from_str(&body).map_err(|_| {
            ProxmoxError::auth(format!("invalid login response: {}", truncate_body(&body)))
        })?;
        let data = root.get("data").ok_or_else(|| {
            ProxmoxError::auth(format!("login envelope missing `data`: {}", truncate_body(&body)))
        })?;
        let ticket = data
            .get("ticket")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProxmoxError::auth("login response missing `ticket`"))?;
        let csrf = data
            .get("CSRFPreventionToken")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProxmoxError::auth("login response missing `CSRFPreventionToken`"))?;

        let mut state = self.state.write().await;
        if state.disposed {
            return Err(ProxmoxError::Disposed);
        }
        state.auth = Some(AuthTokens {
            ticket: ticket.to_string(),
            csrf: csrf.to_string(),
        });
        log::debug!("proxmox session established for {}@{}", self.username, self.realm);
        Ok(())
    }

    /// `authenticate` as an explicitly `Send`-boxed future.
    ///
    /// `execute` and `authenticate` are mutually recursive async fns; the
    /// explicit boxed return type here breaks the otherwise-cyclic `Send`
    /// auto-trait inference between them without changing behaviour.
    fn authenticate_boxed(&self) -> BoxFuture<'_, ProxmoxResult<()>> {
        Box::pin(self.authenticate())
    }

    /// Release the client. Idempotent; Proxmox ticket sessions have no
    /// server-side revocation endpoint, so teardown is local only.
    /// Any call after the first `dispose` fails with `Disposed` before
    /// attempting network I/O.
    pub async fn dispose(&self) {
        let mut state = self.state.write().await;
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.auth = None;
    }

    // ── Request execution ───────────────────────────────────────────

    /// Execute a request with the uniform resilience policy.
    ///
    /// The factory is invoked once per attempt so the request picks up
    /// the current session snapshot after a reauthentication. On 401
    /// (with `allow_reauth`) the session is refreshed and the request
    /// replayed; other failures back off linearly. Both paths consume
    /// the same bounded attempt counter.
    pub(crate) async fn execute<F>(&self, build_request: F, allow_reauth: bool) -> ProxmoxResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_failure: Option<ProxmoxError> = None;

        for attempt in 1..=MAX_RETRIES {
            let auth = {
                let state = self.state.read().await;
                if state.disposed {
                    return Err(ProxmoxError::Disposed);
                }
                state.auth.clone()
            };

            let mut req = build_request();
            if let Some(auth) = &auth {
                req = req
                    .header(COOKIE, format!("PVEAuthCookie={}", auth.ticket))
                    .header("CSRFPreventionToken", &auth.csrf);
            }

            match req.send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED && allow_reauth => {
                    let body = resp.text().await.unwrap_or_default();
                    last_failure = Some(ProxmoxError::RequestFailed {
                        status: StatusCode::UNAUTHORIZED.as_u16(),
                        body: truncate_body(&body),
                    });
                    log::warn!(
                        "proxmox session rejected (401), reauthenticating (attempt {attempt}/{MAX_RETRIES})"
                    );
                    // Boxed: execute and authenticate are mutually
                    // recursive async fns.
                    self.authenticate_boxed().await?;
                    continue;
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    last_failure = Some(ProxmoxError::RequestFailed {
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
                        "proxmox request failed (attempt {attempt}/{MAX_RETRIES}): {failure} - retrying in {}ms",
                        delay.as_millis()
                    );
                }
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_failure.unwrap_or_else(|| ProxmoxError::Transport(format!(
            "request failed after {MAX_RETRIES} attempts"
        ))))
    }

    // ── HTTP helpers ────────────────────────────────────────────────

    /// GET and unwrap the `data` envelope into `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ProxmoxResult<T> {
        let url = self.url(path);
        let resp = self.execute(|| self.http.get(&url), true).await?;
        let body = resp.text().await.map_err(ProxmoxError::from)?;
        decode_envelope(&body)
    }

    /// GET a raw byte body (screenshots).
    pub async fn get_bytes(&self, path: &str) -> ProxmoxResult<Vec<u8>> {
        let url = self.url(path);
        let resp = self.execute(|| self.http.get(&url), true).await?;
        Ok(resp.bytes().await.map_err(ProxmoxError::from)?.to_vec())
    }

    /// POST a form-encoded body, discarding the response payload.
    pub async fn post_form(&self, path: &str, params: &[(String, String)]) -> ProxmoxResult<()> {
        let url = self.url(path);
        self.execute(|| self.http.post(&url).form(params), true).await?;
        Ok(())
    }

    /// POST a form-encoded body and unwrap the `data` envelope.
    pub async fn post_form_decoded<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> ProxmoxResult<T> {
        let url = self.url(path);
        let resp = self.execute(|| self.http.post(&url).form(params), true).await?;
        let body = resp.text().await.map_err(ProxmoxError::from)?;
        decode_envelope(&body)
    }

    /// PUT a form-encoded body, discarding the response payload.
    pub async fn put_form(&self, path: &str, params: &[(String, String)]) -> ProxmoxResult<()> {
        let url = self.url(path);
        self.execute(|| self.http.put(&url).form(params), true).await?;
        Ok(())
    }

    /// POST with an empty body (power transitions, proxies).
    pub async fn post_empty(&self, path: &str) -> ProxmoxResult<()> {
        let url = self.url(path);
        self.execute(|| self.http.post(&url), true).await?;
        Ok(())
    }

    /// POST with an empty body and unwrap the `data` envelope.
    pub async fn post_empty_decoded<T: DeserializeOwned>(&self, path: &str) -> ProxmoxResult<T> {
        let url = self.url(path);
        let resp = self.execute(|| self.http.post(&url), true).await?;
        let body = resp.text().await.map_err(ProxmoxError::from)?;
        decode_envelope(&body)
    }

    /// POST a JSON body and return the raw response.
    pub async fn post_json<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ProxmoxResult<Response> {
        let url = self.url(path);
        self.execute(|| self.http.post(&url).json(body), true).await
    }

    /// DELETE, discarding the response payload.
    pub async fn delete(&self, path: &str) -> ProxmoxResult<()> {
        let url = self.url(path);
        self.execute(|| self.http.delete(&url), true).await?;
        Ok(())
    }
}

/// Unwrap the standard `{"data": ...}` success envelope into `T`.
///
/// This is the single place that understands the envelope shape; every
/// resource operation funnels through it.
pub(crate) fn decode_envelope<T: DeserializeOwned>(body: &str) -> ProxmoxResult<T> {
    let root: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ProxmoxError::decode(format!("JSON parse error: {e}"), body))?;
    let data = root
        .get("data")
        .ok_or_else(|| ProxmoxError::decode("missing `data` field in envelope", body))?;
    serde_json::from_value(data.clone())
        .map_err(|e| ProxmoxError::decode(format!("unexpected `data` shape: {e}"), body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProxmoxConfig;
    use serde::Deserialize;

    fn test_config() -> ProxmoxConfig {
        ProxmoxConfig {
            api_url: "https://127.0.0.1:1".into(),
            username: "root".into(),
            password: "secret".into(),
            realm: "pam".into(),
            timeout_secs: 30,
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Record {
        id: u32,
    }

    #[test]
    fn envelope_unwrap_roundtrip() {
        let rec: Record = decode_envelope(r#"{"data":{"id":42}}"#).unwrap();
        assert_eq!(rec, Record { id: 42 });
    }

    #[test]
    fn envelope_missing_data_is_decode_error() {
        let err = decode_envelope::<Record>(r#"{"id":42}"#).unwrap_err();
        assert!(matches!(err, ProxmoxError::Decode { .. }));
    }

    #[test]
    fn envelope_malformed_body_is_decode_error() {
        let err = decode_envelope::<Record>("<html>gateway timeout</html>").unwrap_err();
        assert!(matches!(err, ProxmoxError::Decode { .. }));
    }

    #[test]
    fn envelope_wrong_data_shape_is_decode_error() {
        let err = decode_envelope::<Record>(r#"{"data":"not an object"}"#).unwrap_err();
        assert!(matches!(err, ProxmoxError::Decode { .. }));
    }

    #[test]
    fn backoff_is_linear_and_non_decreasing() {
        let mut prev = Duration::ZERO;
        for attempt in 1..=MAX_RETRIES {
            let d = backoff_delay(attempt);
            assert!(d >= prev);
            assert_eq!(d, Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)));
            prev = d;
        }
    }

    #[test]
    fn new_rejects_malformed_url() {
        let mut cfg = test_config();
        cfg.api_url = "not a url".into();
        assert!(matches!(
            ProxmoxApi::new(&cfg).unwrap_err(),
            ProxmoxError::Argument(_)
        ));
    }

    #[test]
    fn new_trims_trailing_slash() {
        let mut cfg = test_config();
        cfg.api_url = "https://pve.lab:8006/".into();
        let api = ProxmoxApi::new(&cfg).unwrap();
        assert_eq!(api.base_url(), "https://pve.lab:8006");
    }

    #[tokio::test]
    async fn transient_failures_retry_up_to_cap_with_backoff() {
        let api = ProxmoxApi::new(&test_config()).unwrap();
        let started = std::time::Instant::now();
        let err = api
            .get::<serde_json::Value>("/api2/json/nodes")
            .await
            .unwrap_err();
        assert!(matches!(err, ProxmoxError::Transport(_)));
        // Three attempts with linear backoff sleep 1s then 2s between them.
        assert!(started.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn disposed_client_fails_fast_without_network() {
        let api = ProxmoxApi::new(&test_config()).unwrap();
        api.dispose().await;
        let err = api.get::<serde_json::Value>("/api2/json/nodes").await.unwrap_err();
        assert!(matches!(err, ProxmoxError::Disposed));
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let api = ProxmoxApi::new(&test_config()).unwrap();
        api.dispose().await;
        api.dispose().await;
        assert!(api.is_disposed().await);
    }

    #[tokio::test]
    async fn authenticate_after_dispose_is_disposed_error() {
        let api = ProxmoxApi::new(&test_config()).unwrap();
        api.dispose().await;
        assert!(matches!(
            api.authenticate().await.unwrap_err(),
            ProxmoxError::Disposed
        ));
    }
}
