use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "wekan-core";

/// Lower bound for the pause between two login attempts.
pub const MIN_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Everything needed to log in to a Wekan server.
#[derive(Clone)]
pub struct Credentials {
    remote_addr: String,
    username: String,
    password: String,
    retry_interval: Duration,
}

impl Credentials {
    pub fn new(
        remote_addr: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            remote_addr: remote_addr.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            retry_interval: MIN_RETRY_INTERVAL,
        }
    }

    /// Set the pause between failed login attempts.
    /// Intervals shorter than one second are raised to one second.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval.max(MIN_RETRY_INTERVAL);
        self
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("remote_addr", &self.remote_addr)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("retry_interval", &self.retry_interval)
            .finish()
    }
}

/// Passwords kept in the OS keychain, one entry per server and user.
///
/// The entry is read only; it is written by whatever tool manages the
/// keychain, under service `wekan-core` and account `user@remote`.
pub struct CredentialStore;

impl CredentialStore {
    /// Retrieve the password for a user on a server from the OS keychain
    pub fn get_password(remote_addr: &str, username: &str) -> Result<String> {
        Self::entry(remote_addr, username)?
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    fn entry(remote_addr: &str, username: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &Self::account(remote_addr, username))
            .context("Failed to create keyring entry")
    }

    fn account(remote_addr: &str, username: &str) -> String {
        format!("{}@{}", username, remote_addr.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_interval_floor() {
        let creds = Credentials::new("https://board.example", "alice", "secret");
        assert_eq!(creds.retry_interval(), MIN_RETRY_INTERVAL);

        let creds = creds.with_retry_interval(Duration::from_millis(10));
        assert_eq!(creds.retry_interval(), Duration::from_secs(1));

        let creds = creds.with_retry_interval(Duration::ZERO);
        assert_eq!(creds.retry_interval(), Duration::from_secs(1));

        let creds = creds.with_retry_interval(Duration::from_secs(7));
        assert_eq!(creds.retry_interval(), Duration::from_secs(7));
    }

    #[test]
    fn test_remote_addr_trailing_slash_trimmed() {
        let creds = Credentials::new("https://board.example/", "alice", "secret");
        assert_eq!(creds.remote_addr(), "https://board.example");
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("https://board.example", "alice", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_keychain_account_name() {
        assert_eq!(
            CredentialStore::account("https://board.example/", "alice"),
            "alice@https://board.example"
        );
    }
}
