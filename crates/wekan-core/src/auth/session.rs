use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Time before expiry at which the token is renewed.
/// 5 seconds leaves room for one login round trip before the old token dies.
pub const RENEWAL_SAFETY_MARGIN: StdDuration = StdDuration::from_secs(5);

/// The result of one successful login.
///
/// A session is always replaced as a whole, so the token and its expiry are
/// never observed out of step with each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        token: impl Into<String>,
        user_id: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Wall-clock instant at which the token should be renewed
    pub fn renew_at(&self) -> DateTime<Utc> {
        self.expires_at - Duration::seconds(RENEWAL_SAFETY_MARGIN.as_secs() as i64)
    }

    /// Time from `now` until the renewal point, zero if it already passed
    pub fn time_until_renewal(&self, now: DateTime<Utc>) -> StdDuration {
        (self.renew_at() - now).to_std().unwrap_or(StdDuration::ZERO)
    }
}
