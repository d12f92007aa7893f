//! API client for communicating with the Wekan REST API.
//!
//! `ApiClient` owns the session manager and attaches its current token to
//! every request. Resource-specific calls are built on the generic
//! `get_json` / `post_json` / `put_json` / `delete` helpers.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::{
    Credentials, LoginError, LoginTransport, Session, SessionError, SessionManager, TokenBroker,
};
use crate::config::Config;

use super::{ApiError, HttpLoginTransport};

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for callers.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

const API_PREFIX: &str = "/api/";

/// Authenticated client for a Wekan server.
/// Clone is cheap - clones share the HTTP connection pool and the session.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    remote_addr: String,
    transport: HttpLoginTransport,
    session: Arc<SessionManager>,
}

impl ApiClient {
    /// Connect with a default HTTP client. Resolves once the first login
    /// succeeded, retrying failed logins until `cancel` fires.
    pub async fn connect(
        credentials: Credentials,
        cancel: &CancellationToken,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Self::connect_with(client, credentials, CancellationToken::new(), cancel).await
    }

    /// Connect using the given HTTP client. The session stops when
    /// `shutdown` is cancelled or the last clone of the client is dropped.
    /// Dropping the client never cancels `shutdown` itself, so one token
    /// can be shared by several clients.
    pub async fn connect_with(
        client: Client,
        credentials: Credentials,
        shutdown: CancellationToken,
        cancel: &CancellationToken,
    ) -> Result<Self, ApiError> {
        let remote_addr = credentials.remote_addr().to_string();
        let transport = HttpLoginTransport::new(client.clone(), remote_addr.clone());
        let login: Arc<dyn LoginTransport> = Arc::new(transport.clone());
        let session =
            SessionManager::start_with_shutdown(login, credentials, shutdown, cancel).await?;

        Ok(Self {
            client,
            remote_addr,
            transport,
            session: Arc::new(session),
        })
    }

    /// Connect using the server, account and timeouts from `config`
    pub async fn connect_from_config(
        config: &Config,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Self> {
        let client = config.http_client()?;
        let credentials = config.credentials()?;
        Ok(Self::connect_with(client, credentials, CancellationToken::new(), cancel).await?)
    }

    /// Build an API path from segments: `["boards", id]` -> `/api/boards/<id>`
    pub fn endpoint(segments: &[&str]) -> String {
        let joined = segments
            .iter()
            .map(|s| s.trim_matches('/'))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}{}", API_PREFIX, joined)
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// User id of the logged in account
    pub fn user_id(&self) -> String {
        self.session.user_id()
    }

    /// Current bearer token
    pub async fn token(&self, cancel: &CancellationToken) -> Result<String, SessionError> {
        self.session.token(cancel).await
    }

    pub fn broker(&self) -> TokenBroker {
        self.session.broker()
    }

    /// Stop renewing the session. Pending and later requests fail with
    /// [`SessionError::Closed`].
    pub fn shutdown(&self) {
        self.session.shutdown();
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    pub async fn wait_closed(&self) {
        self.session.wait_closed().await;
    }

    /// Perform a login request. The client logs in on its own; this is
    /// only needed to obtain a session for a different account.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, LoginError> {
        self.transport.login(username, password).await
    }

    /// Register a new account on the server
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<Session, LoginError> {
        self.transport.register(username, password, email).await
    }

    // ===== Generic Request Helpers =====

    /// GET an endpoint and parse its JSON body.
    /// An empty body is reported as [`ApiError::NotFound`].
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        endpoint: &str,
    ) -> Result<T, ApiError> {
        let request = self.authenticated(cancel, Method::GET, endpoint).await?;
        let body = self.send(request, endpoint).await?;
        Self::parse_body(endpoint, &body)
    }

    /// POST a JSON body and parse the JSON response
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        cancel: &CancellationToken,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self.authenticated(cancel, Method::POST, endpoint).await?.json(body);
        let body = self.send(request, endpoint).await?;
        Self::parse_body(endpoint, &body)
    }

    /// PUT a JSON body and parse the JSON response
    pub async fn put_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        cancel: &CancellationToken,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self.authenticated(cancel, Method::PUT, endpoint).await?.json(body);
        let body = self.send(request, endpoint).await?;
        Self::parse_body(endpoint, &body)
    }

    /// DELETE an endpoint, ignoring any response body
    pub async fn delete(&self, cancel: &CancellationToken, endpoint: &str) -> Result<(), ApiError> {
        let request = self.authenticated(cancel, Method::DELETE, endpoint).await?;
        self.send(request, endpoint).await?;
        Ok(())
    }

    async fn authenticated(
        &self,
        cancel: &CancellationToken,
        method: Method,
        endpoint: &str,
    ) -> Result<RequestBuilder, ApiError> {
        let token = self.session.token(cancel).await?;
        let url = format!("{}{}", self.remote_addr, endpoint);
        Ok(self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(token))
    }

    /// Send a request, returning its body on success.
    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(endpoint = endpoint, status = status.as_u16(), bytes = body.len(), "API response");

        if !status.is_success() {
            return Err(ApiError::from_status(status, &body));
        }
        Ok(body)
    }

    fn parse_body<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, ApiError> {
        if body.trim().is_empty() {
            return Err(ApiError::NotFound(endpoint.to_string()));
        }
        serde_json::from_str(body).map_err(|e| {
            ApiError::InvalidResponse(format!(
                "failed to parse response from {}: {}; raw response: {}",
                endpoint,
                e,
                ApiError::truncate_body(body)
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        assert_eq!(ApiClient::endpoint(&["boards"]), "/api/boards");
        assert_eq!(ApiClient::endpoint(&["boards", "b1", "lists"]), "/api/boards/b1/lists");
        assert_eq!(ApiClient::endpoint(&["/users/", "u1"]), "/api/users/u1");
        assert_eq!(ApiClient::endpoint(&[]), "/api/");
    }

    #[test]
    fn test_parse_empty_body_is_not_found() {
        let result: Result<serde_json::Value, _> = ApiClient::parse_body("/api/boards/b1", "  \n");
        assert!(matches!(result, Err(ApiError::NotFound(ref e)) if e == "/api/boards/b1"));
    }

    #[test]
    fn test_parse_invalid_json() {
        let result: Result<serde_json::Value, _> = ApiClient::parse_body("/api/boards", "<html>");
        assert!(matches!(result, Err(ApiError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_json_body() {
        let body = r#"{"private":2,"public":1}"#;
        let result: serde_json::Value =
            ApiClient::parse_body("/api/boards_count", body).expect("valid json");
        assert_eq!(result["private"], 2);
    }
}
