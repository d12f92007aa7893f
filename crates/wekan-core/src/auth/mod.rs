//! Authentication module for keeping a Wekan session alive.
//!
//! This module provides:
//! - `SessionManager`: logs in, renews the token before expiry, and answers
//!   token requests from a single background task
//! - `TokenBroker`: cloneable handle callers use to get the current token
//! - `LoginTransport`: the login call the manager depends on
//! - `Credentials` / `CredentialStore`: login data and the OS keychain lookup
//!
//! Tokens are renewed 5 seconds before they expire. Failed logins are retried
//! forever at a fixed interval of at least one second.

pub mod broker;
pub mod credentials;
pub mod error;
pub mod manager;
pub mod session;
pub mod transport;

pub use broker::TokenBroker;
pub use credentials::{CredentialStore, Credentials, MIN_RETRY_INTERVAL};
pub use error::{LoginError, SessionError};
pub use manager::SessionManager;
pub use session::{Session, RENEWAL_SAFETY_MARGIN};
pub use transport::LoginTransport;
