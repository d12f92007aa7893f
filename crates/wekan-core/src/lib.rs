//! Core library for talking to a Wekan server.
//!
//! The interesting part is the session: [`auth::SessionManager`] logs in
//! once, then a background task renews the bearer token shortly before it
//! expires and hands the current token to any number of concurrent callers
//! through [`auth::TokenBroker`]. [`api::ApiClient`] puts an HTTP login
//! transport and generic authenticated request helpers on top of it.
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use wekan_core::{ApiClient, Credentials};
//!
//! # async fn run() -> Result<(), wekan_core::ApiError> {
//! let credentials = Credentials::new("https://board.example", "alice", "secret");
//! let client = ApiClient::connect(credentials, &CancellationToken::new()).await?;
//!
//! let endpoint = ApiClient::endpoint(&["users", &client.user_id(), "boards"]);
//! let boards: serde_json::Value = client.get_json(&CancellationToken::new(), &endpoint).await?;
//! println!("{boards}");
//!
//! client.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError, HttpLoginTransport};
pub use auth::{
    CredentialStore, Credentials, LoginError, LoginTransport, Session, SessionError, SessionManager,
    TokenBroker,
};
pub use config::Config;
