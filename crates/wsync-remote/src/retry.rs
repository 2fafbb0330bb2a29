//! Back-off for throttled requests
//!
//! The workspace API answers `429 Too Many Requests` (and occasionally
//! `503 Service Unavailable`) with a `Retry-After` header when a client sends
//! too much at once. The applier keeps many uploads in flight, so this is
//! expected during large initial syncs.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::warn;

/// Default wait when the server gives no usable `Retry-After`
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Longest wait honoured from a `Retry-After` header
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// How throttled requests are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Wait used when the response carries no `Retry-After`
    pub default_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            default_delay: DEFAULT_RETRY_AFTER,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            default_delay: Duration::ZERO,
        }
    }
}

/// Returns true for statuses that mean "try again later"
pub fn is_throttled(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

/// Parses a `Retry-After` header value
///
/// Accepts delay-seconds or an HTTP date. Values that cannot be parsed, and
/// dates in the past, yield `default`; waits are capped at one minute.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Duration::from_secs(seconds).min(MAX_RETRY_AFTER);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let wait = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        if let Ok(wait) = wait.to_std() {
            return wait.min(MAX_RETRY_AFTER);
        }
        return default;
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
