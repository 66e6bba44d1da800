//! Google OAuth2 identity provider
//!
//! Installed-app authorization code flow over a loopback redirect:
//! the consent page is opened in the browser, exactly one redirect is
//! accepted by a small axum server on `127.0.0.1`, and the code is
//! exchanged for an access token.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use reqwest::{Client, Url};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use crate::session::Credential;
use crate::traits::{IdentityProvider, ProviderError, TokenClientHandle};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const TIMEOUT_SECONDS: u64 = 25;
const SHUTDOWN_GRACE_SECONDS: u64 = 1;

const CLOSE_PAGE: &str = "<html><body><p>You can close this window and return to Countdown.</p></body></html>";

#[derive(Deserialize)]
struct DiscoveryDocument {
    name: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Result of the single redirect the loopback listener accepts
#[derive(Debug, PartialEq, Eq)]
pub enum RedirectOutcome {
    Code(String),
    Denied(String),
}

pub struct GoogleIdentityProvider {
    client: Client,
    client_secret: Option<String>,
    open_browser: bool,
}

impl GoogleIdentityProvider {
    pub fn new(client_secret: Option<String>, open_browser: bool) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECONDS))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        tracing::debug!("Initialized identity client with {}s timeout", TIMEOUT_SECONDS);
        Ok(Self {
            client,
            client_secret,
            open_browser,
        })
    }

    async fn exchange_code(
        &self,
        handle: &TokenClientHandle,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<Credential, ProviderError> {
        let mut form = vec![
            ("client_id", handle.client_id.as_str()),
            ("code", code),
            ("code_verifier", code_verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let resp = self.client.post(TOKEN_ENDPOINT).form(&form).send().await?;

        let status = resp.status();
        if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => {
                    tracing::warn!(
                        error = %err.error,
                        description = err.error_description.as_deref().unwrap_or(""),
                        "Token exchange rejected"
                    );
                    ProviderError::AccessDenied(err.error)
                }
                Err(_) => ProviderError::Http(status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(ProviderError::Http(status.as_u16()));
        }

        let token: TokenResponse = resp.json().await?;
        Ok(credential_from_token(token, handle, chrono::Utc::now()))
    }
}

fn credential_from_token(
    token: TokenResponse,
    handle: &TokenClientHandle,
    now: chrono::DateTime<chrono::Utc>,
) -> Credential {
    let scopes: Vec<String> = match &token.scope {
        Some(granted) => granted.split_whitespace().map(str::to_string).collect(),
        None => handle.scopes.clone(),
    };
    let credential = Credential::new(token.access_token, scopes);
    match token.expires_in {
        Some(secs) => credential.with_expiry(now + chrono::Duration::seconds(secs)),
        None => credential,
    }
}

/// Build the consent URL for a loopback redirect with a `plain` PKCE challenge.
pub fn authorization_url(
    handle: &TokenClientHandle,
    redirect_uri: &str,
    state: &str,
    code_verifier: &str,
) -> Result<Url, ProviderError> {
    let scope = handle.scopes.join(" ");
    Url::parse_with_params(
        AUTH_ENDPOINT,
        &[
            ("client_id", handle.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", state),
            ("code_challenge", code_verifier),
            ("code_challenge_method", "plain"),
        ],
    )
    .map_err(|e| ProviderError::InvalidConfig(e.to_string()))
}

/// Interpret the query parameters of a loopback request.
///
/// Returns `Ok(None)` for requests that are not the OAuth redirect (such as
/// a bare `/` opened by hand).
pub fn parse_redirect(
    params: &HashMap<String, String>,
    expected_state: &str,
) -> Result<Option<RedirectOutcome>, ProviderError> {
    let state = params.get("state");
    let code = params.get("code");
    let error = params.get("error");

    if state.is_none() && code.is_none() && error.is_none() {
        return Ok(None);
    }
    if state.map(String::as_str) != Some(expected_state) {
        return Err(ProviderError::AccessDenied("state_mismatch".to_string()));
    }
    if let Some(error) = error {
        return Ok(Some(RedirectOutcome::Denied(error.clone())));
    }
    code.map(|c| Some(RedirectOutcome::Code(c.clone())))
        .ok_or_else(|| ProviderError::Malformed("Redirect carried neither code nor error".to_string()))
}

#[derive(Clone)]
struct RedirectState {
    expected_state: Arc<str>,
    outcome: mpsc::Sender<Result<RedirectOutcome, ProviderError>>,
}

async fn handle_redirect(
    State(redirect): State<RedirectState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<&'static str>) {
    let outcome = match parse_redirect(&params, &redirect.expected_state) {
        Ok(None) => return (StatusCode::NOT_FOUND, Html("")),
        Ok(Some(outcome)) => Ok(outcome),
        Err(e) => Err(e),
    };
    let status = if outcome.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    // Only the first redirect counts
    if redirect.outcome.try_send(outcome).is_err() {
        tracing::debug!("Ignoring repeated redirect");
    }
    (status, Html(CLOSE_PAGE))
}

/// Serve the loopback listener until the first OAuth redirect arrives.
///
/// Connections are handled concurrently, so a browser preconnect that sends
/// nothing (or closes straight away) never blocks the redirect.
async fn wait_for_redirect(listener: TcpListener, state: &str) -> Result<RedirectOutcome, ProviderError> {
    let (tx, mut rx) = mpsc::channel(1);
    let app = Router::new()
        .route("/", get(handle_redirect))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .with_state(RedirectState {
            expected_state: Arc::from(state),
            outcome: tx,
        });

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    let outcome = rx
        .recv()
        .await
        .ok_or_else(|| ProviderError::Network("Loopback listener stopped before the redirect".to_string()));

    // Let the close page flush, but never wait on idle connections for long
    let _ = stop_tx.send(());
    let abort = server.abort_handle();
    match tokio::time::timeout(Duration::from_secs(SHUTDOWN_GRACE_SECONDS), server).await {
        Ok(Ok(Err(e))) => tracing::debug!(error = %e, "Loopback server error"),
        Ok(_) => {}
        Err(_) => {
            tracing::debug!("Closing idle loopback connections");
            abort.abort();
        }
    }

    outcome?
}

#[async_trait::async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    async fn init_client(&self, api_key: &str, discovery_docs: &[String]) -> Result<(), ProviderError> {
        for doc_url in discovery_docs {
            let resp = self
                .client
                .get(doc_url)
                .query(&[("key", api_key)])
                .send()
                .await?;

            let status = resp.status();
            if status == 400 || status == 403 {
                return Err(ProviderError::InvalidConfig(format!(
                    "API key rejected loading {}: HTTP {}",
                    doc_url, status
                )));
            }
            if !status.is_success() {
                return Err(ProviderError::Http(status.as_u16()));
            }

            let doc: DiscoveryDocument = resp.json().await?;
            tracing::info!(api = %doc.name, version = %doc.version, "Loaded discovery document");
        }
        Ok(())
    }

    fn init_token_client(
        &self,
        client_id: &str,
        scopes: &[String],
    ) -> Result<TokenClientHandle, ProviderError> {
        if client_id.trim().is_empty() {
            return Err(ProviderError::InvalidConfig("client id is empty".to_string()));
        }
        if scopes.is_empty() {
            return Err(ProviderError::InvalidConfig("no scopes requested".to_string()));
        }
        Ok(TokenClientHandle {
            client_id: client_id.to_string(),
            scopes: scopes.to_vec(),
        })
    }

    async fn request_access_token(&self, handle: &TokenClientHandle) -> Result<Credential, ProviderError> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let port = listener
            .local_addr()
            .map_err(|e| ProviderError::Network(e.to_string()))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{}", port);

        let state = uuid::Uuid::new_v4().simple().to_string();
        let code_verifier = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        let url = authorization_url(handle, &redirect_uri, &state, &code_verifier)?;

        tracing::info!(url = %url, "Open this URL to connect your YouTube account");
        if self.open_browser {
            if let Err(e) = open::that(url.as_str()) {
                tracing::warn!(error = %e, "Could not open the browser; open the URL manually");
            }
        }

        match wait_for_redirect(listener, &state).await? {
            RedirectOutcome::Code(code) => {
                tracing::debug!("Received authorization code");
                self.exchange_code(handle, &code, &redirect_uri, &code_verifier)
                    .await
            }
            RedirectOutcome::Denied(error) => Err(ProviderError::AccessDenied(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio::net::TcpStream;

    fn handle() -> TokenClientHandle {
        TokenClientHandle {
            client_id: "123.apps.googleusercontent.com".to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/youtube.readonly".to_string(),
                "https://www.googleapis.com/auth/yt-analytics.readonly".to_string(),
            ],
        }
    }

    #[test]
    fn authorization_url_carries_flow_parameters() {
        let url = authorization_url(&handle(), "http://127.0.0.1:4321", "nonce", "verifier").unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert!(url.as_str().starts_with(AUTH_ENDPOINT));
        assert_eq!(pairs["client_id"], "123.apps.googleusercontent.com");
        assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:4321");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["state"], "nonce");
        assert_eq!(pairs["code_challenge"], "verifier");
        assert_eq!(pairs["code_challenge_method"], "plain");
        assert_eq!(
            pairs["scope"],
            "https://www.googleapis.com/auth/youtube.readonly https://www.googleapis.com/auth/yt-analytics.readonly"
        );
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn redirect_with_code() {
        let outcome = parse_redirect(&params(&[("state", "nonce"), ("code", "4/0Abc"), ("scope", "x")]), "nonce").unwrap();
        assert_eq!(outcome, Some(RedirectOutcome::Code("4/0Abc".to_string())));
    }

    #[test]
    fn redirect_with_error() {
        let outcome = parse_redirect(&params(&[("error", "access_denied"), ("state", "nonce")]), "nonce").unwrap();
        assert_eq!(outcome, Some(RedirectOutcome::Denied("access_denied".to_string())));
    }

    #[test]
    fn redirect_with_wrong_state_is_rejected() {
        let result = parse_redirect(&params(&[("state", "other"), ("code", "abc")]), "nonce");
        assert_eq!(result, Err(ProviderError::AccessDenied("state_mismatch".to_string())));
    }

    #[test]
    fn requests_without_oauth_parameters_are_skipped() {
        assert_eq!(parse_redirect(&params(&[]), "nonce").unwrap(), None);
        assert_eq!(parse_redirect(&params(&[("utm", "x")]), "nonce").unwrap(), None);
    }

    #[test]
    fn redirect_without_code_or_error_is_malformed() {
        let result = parse_redirect(&params(&[("state", "nonce")]), "nonce");
        assert!(matches!(result, Err(ProviderError::Malformed(_))));
    }

    #[test]
    fn token_client_requires_client_id_and_scopes() {
        let provider = GoogleIdentityProvider::new(None, false).unwrap();

        assert!(matches!(
            provider.init_token_client(" ", &handle().scopes),
            Err(ProviderError::InvalidConfig(_))
        ));
        assert!(matches!(
            provider.init_token_client("cid", &[]),
            Err(ProviderError::InvalidConfig(_))
        ));
        let ok = provider.init_token_client("cid", &handle().scopes).unwrap();
        assert_eq!(ok.client_id, "cid");
        assert_eq!(ok.scopes.len(), 2);
    }

    #[test]
    fn token_response_becomes_credential() {
        let now = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token":"ya29.a0","expires_in":3599,"scope":"https://www.googleapis.com/auth/youtube.readonly","token_type":"Bearer"}"#,
        )
        .unwrap();

        let credential = credential_from_token(token, &handle(), now);

        assert_eq!(credential.access_token(), "ya29.a0");
        assert_eq!(credential.scopes().count(), 1);
        assert_eq!(credential.expires_at(), Some(now + chrono::Duration::seconds(3599)));
    }

    #[test]
    fn token_response_without_scope_uses_requested() {
        let token: TokenResponse = serde_json::from_str(r#"{"access_token":"t"}"#).unwrap();

        let credential = credential_from_token(token, &handle(), chrono::Utc::now());

        assert_eq!(credential.scopes().count(), 2);
        assert_eq!(credential.expires_at(), None);
    }

    async fn send_redirect(addr: std::net::SocketAddr, query: &str) -> reqwest::StatusCode {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        client
            .get(format!("http://{}/{}", addr, query))
            .send()
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn loopback_accepts_one_redirect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = tokio::spawn(async move {
            assert_eq!(send_redirect(addr, "favicon.ico").await, reqwest::StatusCode::NOT_FOUND);
            assert_eq!(send_redirect(addr, "?state=nonce&code=abc").await, reqwest::StatusCode::OK);
        });

        let outcome = wait_for_redirect(listener, "nonce").await.unwrap();
        browser.await.unwrap();

        assert_eq!(outcome, RedirectOutcome::Code("abc".to_string()));
    }

    #[tokio::test]
    async fn silent_preconnects_do_not_block_the_redirect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = tokio::spawn(async move {
            // Closed without sending anything
            drop(TcpStream::connect(addr).await.unwrap());
            // Held open and idle while the real redirect arrives
            let idle = TcpStream::connect(addr).await.unwrap();
            let status = send_redirect(addr, "?state=nonce&code=abc").await;
            drop(idle);
            status
        });

        let outcome = tokio::time::timeout(Duration::from_secs(10), wait_for_redirect(listener, "nonce"))
            .await
            .expect("redirect was not picked up")
            .unwrap();

        assert_eq!(outcome, RedirectOutcome::Code("abc".to_string()));
        assert_eq!(browser.await.unwrap(), reqwest::StatusCode::OK);
    }

    #[tokio::test]
    async fn denied_redirect_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = tokio::spawn(async move { send_redirect(addr, "?error=access_denied&state=nonce").await });

        let outcome = wait_for_redirect(listener, "nonce").await.unwrap();

        assert_eq!(outcome, RedirectOutcome::Denied("access_denied".to_string()));
        assert_eq!(browser.await.unwrap(), reqwest::StatusCode::OK);
    }
}
