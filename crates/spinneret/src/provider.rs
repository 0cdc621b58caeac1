//! Connection-string ownership and rotation
//!
//! [`ConnectionProvider`] owns the live connection string. Failures whose
//! message carries the store's authentication prefix are recoverable: the
//! provider swaps in a replacement from the rotation source and tells the
//! writer to restart the batch, bounded per operation. Everything else
//! propagates untouched.
//!
//! The string is deliberately not serialized against concurrent writers:
//! rotation from several workers at once just overwrites, and the latest
//! value wins (eventually-consistent, best-effort).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::SensitiveString;

/// Case-insensitive message prefix that marks a failure as recoverable by
/// rotating the connection string.
const AUTH_FAILURE_PREFIX: &str = "authentication to host";

/// External source of replacement connection strings.
#[async_trait]
pub trait ConnectStringSource: Send + Sync {
    /// Fetch a new connection string
    async fn get_new(&self) -> Result<String>;
}

/// Outcome of classifying a write failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The connection string was rotated; restart the whole batch
    Retry,
    /// Fatal for this operation; surface the error
    Propagate,
}

/// Bounds for connection-string acquisition and rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Maximum refresh attempts per operation
    pub max_attempts: u32,
    /// Sleep between attempts
    pub backoff: Duration,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RotationPolicy {
    /// Create a policy with explicit bounds
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }
}

/// Owns the current connection string and rotates it on authentication
/// failure.
pub struct ConnectionProvider {
    current: RwLock<Option<SensitiveString>>,
    source: Option<Arc<dyn ConnectStringSource>>,
    policy: RotationPolicy,
}

impl ConnectionProvider {
    /// Provider over a fixed connection string, with no rotation source
    pub fn fixed(connect_string: impl Into<SensitiveString>) -> Self {
        Self {
            current: RwLock::new(Some(connect_string.into())),
            source: None,
            policy: RotationPolicy::default(),
        }
    }

    /// Provider that acquires its string from a rotation source
    pub fn rotating(source: Arc<dyn ConnectStringSource>) -> Self {
        Self {
            current: RwLock::new(None),
            source: Some(source),
            policy: RotationPolicy::default(),
        }
    }

    /// Seed the provider with an initial string (rotation still applies)
    pub fn with_initial(self, connect_string: impl Into<SensitiveString>) -> Self {
        *self.current.write() = Some(connect_string.into());
        self
    }

    /// Override the acquisition/rotation bounds
    pub fn with_policy(mut self, policy: RotationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Whether a rotation source is configured
    pub fn is_rotatable(&self) -> bool {
        self.source.is_some()
    }

    fn has_value(&self) -> bool {
        self.current.read().as_ref().is_some_and(|s| !s.is_empty())
    }

    fn store(&self, value: String) {
        *self.current.write() = Some(SensitiveString::new(value));
    }

    /// The current connection string, for opening a connection.
    pub fn current(&self) -> Result<SensitiveString> {
        self.current
            .read()
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::config("connection string is not initialized"))
    }

    /// Make sure a non-empty connection string is available.
    ///
    /// With no rotation source an empty string is immediately fatal. With
    /// one, the provider attempts up to `max_attempts` fetches, sleeping
    /// one backoff between attempts, and fails if the string is still
    /// empty after exhaustion.
    pub async fn ensure_initialized(&self) -> Result<()> {
        if self.has_value() {
            return Ok(());
        }
        let Some(source) = &self.source else {
            return Err(Error::config(
                "connection string is empty and no rotation source is configured",
            ));
        };
        for attempt in 1..=self.policy.max_attempts {
            match source.get_new().await {
                Ok(value) if !value.is_empty() => {
                    self.store(value);
                    debug!(attempt, "acquired connection string from rotation source");
                    return Ok(());
                }
                Ok(_) => {
                    warn!(attempt, "rotation source returned an empty connection string");
                }
                Err(error) => {
                    warn!(attempt, error = %error, "failed to fetch connection string");
                }
            }
            if attempt < self.policy.max_attempts {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }
        Err(Error::config(format!(
            "no usable connection string after {} attempts",
            self.policy.max_attempts
        )))
    }

    /// Classify a write failure and decide whether the batch restarts.
    ///
    /// `retries` is the cumulative retry count for the current operation,
    /// starting at 1 for the first failure. Only failures matching the
    /// authentication prefix rotate, only while a source exists and the
    /// count stays within bounds; the rotation path sleeps one backoff
    /// before fetching, blocking just the calling worker.
    pub async fn handle_write_failure(&self, error: &Error, retries: u32) -> RetryDecision {
        if !is_auth_failure(error) {
            return RetryDecision::Propagate;
        }
        let Some(source) = &self.source else {
            return RetryDecision::Propagate;
        };
        if retries > self.policy.max_attempts {
            warn!(
                retries,
                "authentication retries exhausted, propagating failure"
            );
            return RetryDecision::Propagate;
        }
        tokio::time::sleep(self.policy.backoff).await;
        match source.get_new().await {
            Ok(value) if !value.is_empty() => {
                self.store(value);
                warn!(
                    retries,
                    error = %error,
                    "rotated connection string after authentication failure"
                );
                RetryDecision::Retry
            }
            Ok(_) => {
                warn!(retries, "rotation source returned an empty connection string");
                RetryDecision::Propagate
            }
            Err(fetch_error) => {
                warn!(retries, error = %fetch_error, "failed to rotate connection string");
                RetryDecision::Propagate
            }
        }
    }
}

/// Whether an error message carries the authentication prefix.
fn is_auth_failure(error: &Error) -> bool {
    error
        .message()
        .to_lowercase()
        .starts_with(AUTH_FAILURE_PREFIX)
}
