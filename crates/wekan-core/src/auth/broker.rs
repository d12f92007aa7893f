//! Two-phase token handoff between callers and the session task.
//!
//! A caller creates a one-shot reply slot and hands it to the session task
//! over a single-slot mailbox. The session task writes the current token
//! into the slot when it accepts the request. Both phases race the caller's
//! cancellation token and the manager-wide shutdown token, so a caller never
//! waits on a manager that is gone.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::SessionError;

/// Reply slot for one token request.
pub(crate) type TokenReply = oneshot::Sender<String>;

/// Capacity of the request mailbox. Tokio channels cannot be unbuffered, so
/// one slot is the closest to a rendezvous; the token is still chosen at the
/// moment the session task takes the request out of the mailbox.
pub(crate) const MAILBOX_CAPACITY: usize = 1;

/// Cloneable handle for obtaining the current bearer token.
#[derive(Debug, Clone)]
pub struct TokenBroker {
    requests: mpsc::Sender<TokenReply>,
    shutdown: CancellationToken,
}

impl TokenBroker {
    pub(crate) fn new(requests: mpsc::Sender<TokenReply>, shutdown: CancellationToken) -> Self {
        Self { requests, shutdown }
    }

    /// Get the current token.
    ///
    /// Fails with [`SessionError::Cancelled`] when `cancel` fires first and
    /// with [`SessionError::Closed`] once the manager has shut down.
    pub async fn token(&self, cancel: &CancellationToken) -> Result<String, SessionError> {
        if self.shutdown.is_cancelled() {
            return Err(SessionError::Closed);
        }

        let (reply_tx, reply_rx) = oneshot::channel();

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(SessionError::Closed),
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            sent = self.requests.send(reply_tx) => {
                // Receiver gone means the session task exited
                sent.map_err(|_| SessionError::Closed)?;
            }
        }

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(SessionError::Closed),
            _ = cancel.cancelled() => Err(SessionError::Cancelled),
            token = reply_rx => token.map_err(|_| SessionError::Closed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.requests.is_closed()
    }
}
