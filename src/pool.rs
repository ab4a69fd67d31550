//! Credential pool with time-windowed quota budgets.
//!
//! Holds an ordered list of API credentials, each with an independent daily
//! quota. The batch runner owns the pool for the duration of a run; nothing
//! else mutates it.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Utc};
use tracing::{debug, info, warn};

/// Quota windows are aligned to midnight in Korea Standard Time, which is
/// when DART resets per-key usage counters.
const WINDOW_OFFSET_HOURS: i32 = 9;

/// Credential pool errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PoolError {
    /// A usage charge would drive the quota counter negative
    #[error("quota underflow: cost {cost} exceeds remaining {remaining}")]
    QuotaUnderflow {
        /// Requested charge
        cost: u32,
        /// Quota left on the active credential
        remaining: u32,
    },

    /// Every credential in the pool has zero remaining quota
    #[error("all credentials exhausted")]
    Exhausted,

    /// The pool was constructed without any credentials
    #[error("credential pool is empty")]
    Empty,
}

/// An API access token with an independent quota budget.
#[derive(Debug, Clone)]
pub struct Credential {
    token: String,
    quota_remaining: u32,
    quota_window_start: DateTime<Utc>,
}

impl Credential {
    fn new(token: String, ceiling: u32, now: DateTime<Utc>) -> Self {
        Self {
            token,
            quota_remaining: ceiling,
            quota_window_start: window_start(now),
        }
    }

    /// The raw API key.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Calls left in the current quota window.
    pub fn quota_remaining(&self) -> u32 {
        self.quota_remaining
    }

    /// Start of the quota window this credential was last reset in.
    pub fn quota_window_start(&self) -> DateTime<Utc> {
        self.quota_window_start
    }
}

/// Start of the quota window containing `now` (midnight KST, expressed in UTC).
fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let kst = FixedOffset::east_opt(WINDOW_OFFSET_HOURS * 3600)
        .expect("fixed offset within range");
    let local_midnight = now
        .with_timezone(&kst)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time");
    (local_midnight - ChronoDuration::hours(WINDOW_OFFSET_HOURS as i64)).and_utc()
}

/// Ordered, rotatable set of API credentials.
///
/// The first credential in configuration order is active initially;
/// [`CredentialPool::advance`] moves to the next credential with remaining
/// quota. Exhaustion of the whole pool is a recoverable condition surfaced
/// as [`PoolError::Exhausted`], never a panic.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
    active: usize,
    ceiling: u32,
}

impl CredentialPool {
    /// Build a pool from tokens in priority order, each starting with a
    /// full `ceiling` for the current quota window.
    pub fn new(tokens: Vec<String>, ceiling: u32) -> Self {
        Self::new_at(tokens, ceiling, Utc::now())
    }

    fn new_at(tokens: Vec<String>, ceiling: u32, now: DateTime<Utc>) -> Self {
        let credentials = tokens
            .into_iter()
            .map(|t| Credential::new(t, ceiling, now))
            .collect();
        Self {
            credentials,
            active: 0,
            ceiling,
        }
    }

    /// Number of credentials in the pool.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Whether the pool holds no credentials at all.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// The active credential.
    ///
    /// # Panics
    /// Panics on an empty pool; use [`CredentialPool::ensure_available`]
    /// in runner code, which reports emptiness as an error.
    pub fn current(&self) -> &Credential {
        &self.credentials[self.active]
    }

    /// Charge `cost` calls against the active credential.
    ///
    /// Callers must have checked availability first; a charge exceeding the
    /// remaining quota is a guard violation reported as
    /// [`PoolError::QuotaUnderflow`].
    pub fn record_usage(&mut self, cost: u32) -> Result<(), PoolError> {
        let cred = &mut self.credentials[self.active];
        if cost > cred.quota_remaining {
            return Err(PoolError::QuotaUnderflow {
                cost,
                remaining: cred.quota_remaining,
            });
        }
        cred.quota_remaining -= cost;
        Ok(())
    }

    /// Zero the active credential's local counter after the remote side
    /// signaled quota exhaustion. The remote signal wins over local
    /// bookkeeping.
    pub fn mark_exhausted(&mut self) {
        let cred = &mut self.credentials[self.active];
        warn!(
            token_tail = %token_tail(&cred.token),
            local_remaining = cred.quota_remaining,
            "remote signaled quota exhaustion; zeroing local counter"
        );
        cred.quota_remaining = 0;
    }

    /// Move to the next credential in priority order with remaining quota.
    ///
    /// Returns `None` when every credential is exhausted.
    pub fn advance(&mut self) -> Option<&Credential> {
        self.advance_at(Utc::now())
    }

    fn advance_at(&mut self, now: DateTime<Utc>) -> Option<&Credential> {
        self.reset_windows_at(now);
        let start = self.active;
        for step in 1..=self.credentials.len() {
            let idx = (start + step) % self.credentials.len();
            if self.credentials[idx].quota_remaining > 0 {
                self.active = idx;
                info!(
                    token_tail = %token_tail(&self.credentials[idx].token),
                    remaining = self.credentials[idx].quota_remaining,
                    "rotated to next credential"
                );
                return Some(&self.credentials[idx]);
            }
        }
        None
    }

    /// Reset any credential whose quota window has rolled over.
    ///
    /// Called lazily before every usage check; resets `quota_remaining` to
    /// the ceiling and stamps the new window start.
    pub fn reset_if_new_window(&mut self) {
        self.reset_windows_at(Utc::now());
    }

    fn reset_windows_at(&mut self, now: DateTime<Utc>) {
        let current_window = window_start(now);
        for cred in &mut self.credentials {
            if current_window > cred.quota_window_start {
                debug!(
                    token_tail = %token_tail(&cred.token),
                    "quota window rolled over; resetting counter"
                );
                cred.quota_remaining = self.ceiling;
                cred.quota_window_start = current_window;
            }
        }
    }

    /// Return a usable credential, rotating if the active one is spent.
    ///
    /// Resets rolled-over windows first, so a pool that looked exhausted
    /// yesterday comes back on its own after midnight KST.
    pub fn ensure_available(&mut self) -> Result<&Credential, PoolError> {
        self.ensure_available_at(Utc::now())
    }

    fn ensure_available_at(&mut self, now: DateTime<Utc>) -> Result<&Credential, PoolError> {
        if self.credentials.is_empty() {
            return Err(PoolError::Empty);
        }
        self.reset_windows_at(now);
        if self.credentials[self.active].quota_remaining > 0 {
            return Ok(&self.credentials[self.active]);
        }
        if self.advance_at(now).is_none() {
            return Err(PoolError::Exhausted);
        }
        Ok(&self.credentials[self.active])
    }
}

/// Last four characters of a token, for logging without leaking the key.
fn token_tail(token: &str) -> String {
    let tail: String = token
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("…{tail}")
}
