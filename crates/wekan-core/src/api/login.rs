//! Login and registration requests against a Wekan server.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::auth::{LoginError, LoginTransport, Session};

use super::ApiError;

const LOGIN_ENDPOINT: &str = "/users/login";
const REGISTER_ENDPOINT: &str = "/users/register";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    id: String,
    token: String,
    #[serde(rename = "tokenExpires")]
    token_expires: String,
}

#[derive(Debug, Deserialize)]
struct BadRequestResponse {
    error: i64,
    reason: String,
}

/// [`LoginTransport`] over HTTP.
/// Clone is cheap - the reqwest client shares its connection pool.
#[derive(Debug, Clone)]
pub struct HttpLoginTransport {
    client: Client,
    remote_addr: String,
}

impl HttpLoginTransport {
    pub fn new(client: Client, remote_addr: impl Into<String>) -> Self {
        Self {
            client,
            remote_addr: remote_addr.into().trim_end_matches('/').to_string(),
        }
    }

    /// Register a new user and log in as that user
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<Session, LoginError> {
        self.login_or_register(
            REGISTER_ENDPOINT,
            &[("username", username), ("password", password), ("email", email)],
        )
        .await
    }

    async fn login_or_register(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Session, LoginError> {
        let url = format!("{}{}", self.remote_addr, endpoint);
        debug!(url = %url, "Sending login request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .form(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::BAD_REQUEST {
            let bad: BadRequestResponse = serde_json::from_str(&body).map_err(|e| {
                LoginError::InvalidResponse(format!(
                    "failed to parse bad request response: {}; raw response: {}",
                    e,
                    ApiError::truncate_body(&body)
                ))
            })?;
            return Err(LoginError::BadRequest {
                code: bad.error,
                reason: bad.reason,
            });
        }
        if status != StatusCode::OK {
            return Err(LoginError::UnexpectedStatus {
                status: status.as_u16(),
                body: ApiError::truncate_body(&body),
            });
        }

        parse_login_response(&body)
    }
}

#[async_trait]
impl LoginTransport for HttpLoginTransport {
    async fn login(&self, username: &str, password: &str) -> Result<Session, LoginError> {
        self.login_or_register(LOGIN_ENDPOINT, &[("username", username), ("password", password)])
            .await
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn parse_login_response(body: &str) -> Result<Session, LoginError> {
    let resp: LoginResponse = serde_json::from_str(body).map_err(|e| {
        LoginError::InvalidResponse(format!(
            "failed to parse login response: {}; raw response: {}",
            e,
            ApiError::truncate_body(body)
        ))
    })?;

    let expires_at = DateTime::parse_from_rfc3339(&resp.token_expires)
        .map_err(|e| {
            LoginError::InvalidResponse(format!(
                "failed to parse token expiry '{}': {}",
                resp.token_expires, e
            ))
        })?
        .with_timezone(&Utc);

    if resp.token.is_empty() {
        return Err(LoginError::InvalidResponse(
            "login response carries an empty token".to_string(),
        ));
    }

    Ok(Session::new(resp.token, resp.id, expires_at))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login_response() {
        let json = r#"{
            "id": "XtDnEjGjnHAuFh7fP",
            "token": "uVxVq8-8hUkgh8RkZgV-9Y",
            "tokenExpires": "2030-05-01T12:30:00.000Z"
        }"#;
        let session = parse_login_response(json).expect("valid login response");
        assert_eq!(session.user_id, "XtDnEjGjnHAuFh7fP");
        assert_eq!(session.token, "uVxVq8-8hUkgh8RkZgV-9Y");
        assert_eq!(session.expires_at.to_rfc3339(), "2030-05-01T12:30:00+00:00");
    }

    #[test]
    fn test_parse_login_response_with_offset() {
        let json = r#"{"id":"u1","token":"abc","tokenExpires":"2030-05-01T14:30:00+02:00"}"#;
        let session = parse_login_response(json).expect("valid login response");
        assert_eq!(session.expires_at.to_rfc3339(), "2030-05-01T12:30:00+00:00");
    }

    #[test]
    fn test_parse_login_response_bad_expiry() {
        let json = r#"{"id":"u1","token":"abc","tokenExpires":"next tuesday"}"#;
        assert!(matches!(parse_login_response(json), Err(LoginError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_login_response_missing_fields() {
        assert!(matches!(
            parse_login_response(r#"{"id":"u1"}"#),
            Err(LoginError::InvalidResponse(_))
        ));
        assert!(matches!(parse_login_response(""), Err(LoginError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_login_response_empty_token() {
        let json = r#"{"id":"u1","token":"","tokenExpires":"2030-05-01T12:30:00Z"}"#;
        assert!(matches!(parse_login_response(json), Err(LoginError::InvalidResponse(_))));
    }

    #[test]
    fn test_remote_addr_normalized() {
        let transport = HttpLoginTransport::new(Client::new(), "https://board.example/");
        assert_eq!(transport.remote_addr, "https://board.example");
    }
}
