//! Session lifecycle manager.
//!
//! Logs in once before handing out a manager, then keeps a background task
//! alive that renews the token ahead of expiry and answers token requests.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::broker::{TokenReply, MAILBOX_CAPACITY};
use super::{Credentials, LoginError, LoginTransport, Session, SessionError, TokenBroker};

/// Owns the authenticated session for one client.
///
/// The background task is the only writer of the session. Everything else
/// reads the token through a [`TokenBroker`]. Dropping the manager shuts the
/// task down.
pub struct SessionManager {
    broker: TokenBroker,
    shutdown: CancellationToken,
    finished: CancellationToken,
    user_id: Arc<Mutex<String>>,
}

impl SessionManager {
    /// Log in and start the renewal task.
    ///
    /// Retries failed logins at the credentials' retry interval until one
    /// succeeds or `cancel` fires.
    pub async fn start(
        transport: Arc<dyn LoginTransport>,
        credentials: Credentials,
        cancel: &CancellationToken,
    ) -> Result<Self, SessionError> {
        Self::start_with_shutdown(transport, credentials, CancellationToken::new(), cancel).await
    }

    /// Like [`SessionManager::start`], but the manager also stops when
    /// `shutdown` is cancelled. Cancelling `shutdown` during the initial
    /// login fails with [`SessionError::Closed`].
    ///
    /// The manager only listens to `shutdown`; its own [`shutdown`] and drop
    /// never cancel the caller's token.
    ///
    /// [`shutdown`]: SessionManager::shutdown
    pub async fn start_with_shutdown(
        transport: Arc<dyn LoginTransport>,
        credentials: Credentials,
        shutdown: CancellationToken,
        cancel: &CancellationToken,
    ) -> Result<Self, SessionError> {
        let shutdown = shutdown.child_token();
        let user_id = Arc::new(Mutex::new(String::new()));

        let stop = async {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => SessionError::Closed,
                _ = cancel.cancelled() => SessionError::Cancelled,
            }
        };
        let session = login_until_success(transport.as_ref(), &credentials, stop).await?;
        store_user_id(&user_id, &session);

        info!(
            remote = credentials.remote_addr(),
            user_id = %session.user_id,
            expires_at = %session.expires_at,
            "Session established"
        );

        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let finished = CancellationToken::new();

        let task = SessionTask {
            transport,
            credentials,
            session,
            requests: rx,
            shutdown: shutdown.clone(),
            user_id: Arc::clone(&user_id),
        };
        let done = finished.clone().drop_guard();
        tokio::spawn(async move {
            let _done = done;
            task.run().await;
        });

        Ok(Self {
            broker: TokenBroker::new(tx, shutdown.clone()),
            shutdown,
            finished,
            user_id,
        })
    }

    /// Get the current token, see [`TokenBroker::token`].
    pub async fn token(&self, cancel: &CancellationToken) -> Result<String, SessionError> {
        self.broker.token(cancel).await
    }

    pub fn broker(&self) -> TokenBroker {
        self.broker.clone()
    }

    /// User id of the most recent successful login
    pub fn user_id(&self) -> String {
        self.user_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Stop the background task. Safe to call more than once.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.finished.is_cancelled()
    }

    /// Resolve once the background task has exited
    pub async fn wait_closed(&self) {
        self.finished.cancelled().await;
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct SessionTask {
    transport: Arc<dyn LoginTransport>,
    credentials: Credentials,
    session: Session,
    requests: mpsc::Receiver<TokenReply>,
    shutdown: CancellationToken,
    user_id: Arc<Mutex<String>>,
}

impl SessionTask {
    async fn run(mut self) {
        let renewal = sleep_until(self.renewal_deadline());
        tokio::pin!(renewal);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    debug!("Session task shutting down");
                    return;
                }

                _ = &mut renewal => {
                    debug!(expires_at = %self.session.expires_at, "Renewing session token");
                    let shutdown = self.shutdown.clone();
                    let stop = async move {
                        shutdown.cancelled().await;
                        SessionError::Closed
                    };
                    let transport = self.transport.as_ref();
                    match login_until_success(transport, &self.credentials, stop).await {
                        Ok(session) => {
                            store_user_id(&self.user_id, &session);
                            info!(expires_at = %session.expires_at, "Session token renewed");
                            self.session = session;
                            renewal.as_mut().reset(self.renewal_deadline());
                        }
                        Err(_) => {
                            debug!("Session task stopped during renewal");
                            return;
                        }
                    }
                }

                request = self.requests.recv() => match request {
                    // The reply slot has room for one value, so this never waits.
                    // A caller that gave up has dropped its receiver; nothing to do then.
                    Some(reply) => {
                        let _ = reply.send(self.session.token.clone());
                    }
                    None => {
                        debug!("All token brokers dropped, stopping session task");
                        return;
                    }
                },
            }
        }
    }

    /// Monotonic deadline for the next renewal.
    fn renewal_deadline(&self) -> Instant {
        let wait = renewal_wait(&self.session, Utc::now(), self.credentials.retry_interval());
        if self.session.time_until_renewal(Utc::now()).is_zero() {
            warn!(
                expires_at = %self.session.expires_at,
                wait_ms = wait.as_millis() as u64,
                "Token expires within the safety margin"
            );
        }
        Instant::now() + wait
    }
}

/// Time to wait before renewing `session`.
///
/// Normally the renewal point, `expires_at` minus the safety margin. Once that
/// has passed, wait the retry interval but at most half of the remaining
/// lifetime, so renewal still happens before expiry without hammering the
/// server in a tight loop.
fn renewal_wait(session: &Session, now: DateTime<Utc>, retry_interval: Duration) -> Duration {
    let wait = session.time_until_renewal(now);
    if !wait.is_zero() {
        return wait;
    }
    let remaining = (session.expires_at - now).to_std().unwrap_or(Duration::ZERO);
    retry_interval.min(remaining / 2)
}

/// Log in over and over until it works or `stop` resolves.
///
/// `stop` yields the error to return when the attempt loop is abandoned.
async fn login_until_success<F>(
    transport: &dyn LoginTransport,
    credentials: &Credentials,
    stop: F,
) -> Result<Session, SessionError>
where
    F: Future<Output = SessionError>,
{
    tokio::pin!(stop);
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;

        let result = tokio::select! {
            biased;
            reason = &mut stop => return Err(reason),
            result = transport.login(credentials.username(), credentials.password()) => result,
        };

        match result.and_then(check_not_expired) {
            Ok(session) => {
                if attempt > 1 {
                    info!(attempts = attempt, "Login succeeded after retrying");
                }
                return Ok(session);
            }
            Err(err) => {
                error!(
                    transport = transport.name(),
                    attempt = attempt,
                    retry_in_ms = credentials.retry_interval().as_millis() as u64,
                    error = %err,
                    "Login failed"
                );
            }
        }

        tokio::select! {
            biased;
            reason = &mut stop => return Err(reason),
            _ = sleep(credentials.retry_interval()) => {}
        }
    }
}

fn check_not_expired(session: Session) -> Result<Session, LoginError> {
    if session.is_expired() {
        Err(LoginError::AlreadyExpired(session.expires_at))
    } else {
        Ok(session)
    }
}

fn store_user_id(slot: &Mutex<String>, session: &Session) {
    let mut user_id = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    user_id.clone_from(&session.user_id);
}
