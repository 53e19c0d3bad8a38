//! Retry policy validation and backoff arithmetic

use crate::error::ArtifactError;
use artifactor_types::RetryPolicy;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Exclusive upper bound for `max_retries`
pub const MAX_RETRIES_LIMIT: u32 = 10;
/// Exclusive upper bound for `backoff_factor`, in seconds
pub const BACKOFF_FACTOR_LIMIT: f64 = 120.0;
/// No single backoff sleep exceeds this
pub const BACKOFF_MAX: Duration = Duration::from_secs(120);

/// Statuses whose `Retry-After` header is honoured
const RETRY_AFTER_STATUSES: [u16; 3] = [413, 429, 503];

/// Reject policies outside the supported ranges
pub fn validate_policy(policy: &RetryPolicy) -> Result<(), ArtifactError> {
    if policy.max_retries >= MAX_RETRIES_LIMIT {
        return Err(ArtifactError::InvalidArgument(format!(
            "max_retries must be in [0, {}), got {}",
            MAX_RETRIES_LIMIT, policy.max_retries
        )));
    }
    if !(0.0..BACKOFF_FACTOR_LIMIT).contains(&policy.backoff_factor) {
        return Err(ArtifactError::InvalidArgument(format!(
            "backoff_factor must be in [0, {}), got {}",
            BACKOFF_FACTOR_LIMIT, policy.backoff_factor
        )));
    }
    Ok(())
}

/// Sleep before the `retry`-th retry (1-based): `factor * 2^(retry - 1)`.
pub fn backoff_delay(retry: u32, backoff_factor: f64) -> Duration {
    if retry == 0 || backoff_factor <= 0.0 {
        return Duration::ZERO;
    }
    let exponent = retry.saturating_sub(1).min(31) as i32;
    let secs = backoff_factor * 2f64.powi(exponent);
    if secs >= BACKOFF_MAX.as_secs_f64() {
        BACKOFF_MAX
    } else {
        Duration::from_secs_f64(secs)
    }
}

/// Server-requested delay, if the response status allows one
pub fn retry_after(status: u16, headers: &HeaderMap) -> Option<Duration> {
    if !RETRY_AFTER_STATUSES.contains(&status) {
        return None;
    }
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(BACKOFF_MAX))
}

/// Whether a transport-level failure is worth another attempt
pub fn is_transient(error: &reqwest::Error) -> bool {
    error.is_connect()
        || error.is_timeout()
        || error.is_request()
        || error.is_body()
        || error.is_decode()
        || error.is_redirect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_backoff_delay_doubles() {
        assert_eq!(backoff_delay(0, 1.0), Duration::ZERO);
        assert_eq!(backoff_delay(1, 1.0), Duration::from_secs(1));
        assert_eq!(backoff_delay(2, 1.0), Duration::from_secs(2));
        assert_eq!(backoff_delay(3, 1.0), Duration::from_secs(4));
        assert_eq!(backoff_delay(4, 0.5), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_delay_zero_factor() {
        for retry in 0..10 {
            assert_eq!(backoff_delay(retry, 0.0), Duration::ZERO);
        }
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        assert_eq!(backoff_delay(9, 119.0), BACKOFF_MAX);
        assert_eq!(backoff_delay(u32::MAX, 2.0), BACKOFF_MAX);
    }

    #[test]
    fn test_every_policy_in_range_validates() {
        for max_retries in 0..MAX_RETRIES_LIMIT {
            for factor in [0.0, 0.001, 1.0, 60.0, 119.999] {
                let policy = RetryPolicy::new(max_retries, factor);
                assert!(validate_policy(&policy).is_ok(), "{:?}", policy);
            }
        }
    }

    #[test]
    fn test_out_of_range_policies_rejected() {
        assert!(matches!(
            validate_policy(&RetryPolicy::new(10, 1.0)),
            Err(ArtifactError::InvalidArgument(_))
        ));
        assert!(validate_policy(&RetryPolicy::new(1, 120.0)).is_err());
        assert!(validate_policy(&RetryPolicy::new(1, -0.5)).is_err());
        assert!(validate_policy(&RetryPolicy::new(1, f64::NAN)).is_err());
    }

    #[test]
    fn test_retry_after_only_for_throttling_statuses() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));

        assert_eq!(retry_after(429, &headers), Some(Duration::from_secs(3)));
        assert_eq!(retry_after(503, &headers), Some(Duration::from_secs(3)));
        assert_eq!(retry_after(500, &headers), None);
        assert_eq!(retry_after(429, &HeaderMap::new()), None);
    }
}
