//! Cached bearer credential for the directory API.
//!
//! One [`CredentialCache`] is shared by every lookup. A credential is never
//! handed out once `now >= expires_at - margin`; the next caller refreshes
//! it. Concurrent refreshes may both hit the auth endpoint, and whichever
//! finishes last is the one kept.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;

use crate::error::DirectoryError;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A freshly issued token and its lifetime, as returned by the auth endpoint.
#[derive(Debug)]
pub struct IssuedToken {
    pub token: SecretString,
    pub expires_in: Duration,
}

/// A cached token with its absolute expiry.
#[derive(Debug)]
pub struct CachedCredential {
    pub token: SecretString,
    pub expires_at: DateTime<Utc>,
}

/// Process-wide credential cache.
pub struct CredentialCache {
    slot: RwLock<Option<CachedCredential>>,
    margin: Duration,
    clock: Arc<dyn Clock>,
}

impl CredentialCache {
    pub fn new(margin: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: RwLock::new(None),
            margin,
            clock,
        }
    }

    /// The cached token, if it is still outside the refresh margin.
    pub async fn current(&self) -> Option<SecretString> {
        let slot = self.slot.read().await;
        let cred = slot.as_ref()?;
        if self.is_fresh(cred) {
            Some(SecretString::from(cred.token.expose_secret()))
        } else {
            None
        }
    }

    /// Return the cached token, or call `acquire` and cache its result.
    pub async fn get_or_refresh<F, Fut>(&self, acquire: F) -> Result<SecretString, DirectoryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<IssuedToken, DirectoryError>>,
    {
        if let Some(token) = self.current().await {
            return Ok(token);
        }

        tracing::debug!("Directory credential missing or expiring, refreshing");
        let issued = acquire().await?;
        let token = SecretString::from(issued.token.expose_secret());
        self.store(issued).await?;
        Ok(token)
    }

    /// Cache a newly issued token. A lifetime that does not fit a timestamp
    /// is rejected and leaves the cache untouched.
    pub async fn store(&self, issued: IssuedToken) -> Result<(), DirectoryError> {
        let expires_at = self.expires_at(issued.expires_in)?;
        *self.slot.write().await = Some(CachedCredential {
            token: issued.token,
            expires_at,
        });
        Ok(())
    }

    /// Drop the cached token so the next call refreshes.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    /// Expiry of the cached token, if any.
    pub async fn expires_at_snapshot(&self) -> Option<DateTime<Utc>> {
        self.slot.read().await.as_ref().map(|c| c.expires_at)
    }

    /// An out-of-range margin makes every token stale.
    fn is_fresh(&self, cred: &CachedCredential) -> bool {
        chrono::Duration::from_std(self.margin)
            .ok()
            .and_then(|margin| cred.expires_at.checked_sub_signed(margin))
            .is_some_and(|deadline| self.clock.now() < deadline)
    }

    fn expires_at(&self, expires_in: Duration) -> Result<DateTime<Utc>, DirectoryError> {
        chrono::Duration::from_std(expires_in)
            .ok()
            .and_then(|lifetime| self.clock.now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                DirectoryError::CredentialFailed(format!(
                    "token lifetime of {}s out of range",
                    expires_in.as_secs()
                ))
            })
    }
}
