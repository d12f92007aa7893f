use std::sync::Arc;

use async_trait::async_trait;

use super::{LoginError, Session};

/// Performs a single login against the remote service.
///
/// Implementations return a session whose expiry lies in the future, or a
/// descriptive error. The session manager treats every error the same way:
/// it waits for the retry interval and tries again.
#[async_trait]
pub trait LoginTransport: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<Session, LoginError>;

    /// Name used in log output.
    fn name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<T: LoginTransport + ?Sized> LoginTransport for Arc<T> {
    async fn login(&self, username: &str, password: &str) -> Result<Session, LoginError> {
        (**self).login(username, password).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
