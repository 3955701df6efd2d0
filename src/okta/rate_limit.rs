//! Rate limit headers and the waits derived from them.

use reqwest::header::HeaderMap;
use std::time::Duration;

use crate::error::ApiError;

pub const LIMIT_HEADER: &str = "x-rate-limit-limit";
pub const REMAINING_HEADER: &str = "x-rate-limit-remaining";
pub const RESET_HEADER: &str = "x-rate-limit-reset";

/// Added to the advertised reset instant before retrying a 429.
pub const RESET_SAFETY_MARGIN_SECS: i64 = 5;

/// Rate limit state advertised on a response. Missing or unparsable headers are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    /// Epoch seconds at which the current window resets.
    pub reset: Option<i64>,
}

impl RateLimit {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        fn parse<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse().ok())
        }

        Self {
            limit: parse(headers, LIMIT_HEADER),
            remaining: parse(headers, REMAINING_HEADER),
            reset: parse(headers, RESET_HEADER),
        }
    }

    pub fn reset_epoch(&self) -> Result<i64, ApiError> {
        self.reset.ok_or(ApiError::RateLimitHeader(RESET_HEADER))
    }

    /// Whether remaining quota has dropped to `limit * percent / 100` or below.
    /// Always false at 100 percent.
    pub fn below_threshold(&self, throttle_percent: u8) -> Result<bool, ApiError> {
        if throttle_percent >= 100 {
            return Ok(false);
        }
        let limit = self.limit.ok_or(ApiError::RateLimitHeader(LIMIT_HEADER))?;
        let remaining = self
            .remaining
            .ok_or(ApiError::RateLimitHeader(REMAINING_HEADER))?;
        Ok(u128::from(remaining) * 100 <= u128::from(limit) * u128::from(throttle_percent))
    }
}

/// Wait before resubmitting after a 429: until the reset instant plus the safety margin.
pub fn retry_after_reset(reset_epoch: i64, now_epoch: i64) -> Duration {
    seconds_from(reset_epoch - now_epoch + RESET_SAFETY_MARGIN_SECS)
}

/// Wait until the reset instant, used for self-throttling after a success.
pub fn until_reset(reset_epoch: i64, now_epoch: i64) -> Duration {
    seconds_from(reset_epoch - now_epoch)
}

pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

fn seconds_from(secs: i64) -> Duration {
    Duration::from_secs(u64::try_from(secs).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn parses_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(LIMIT_HEADER, HeaderValue::from_static("600"));
        headers.insert(REMAINING_HEADER, HeaderValue::from_static("599"));
        headers.insert(RESET_HEADER, HeaderValue::from_static("1700000000"));

        assert_eq!(
            RateLimit::from_headers(&headers),
            RateLimit {
                limit: Some(600),
                remaining: Some(599),
                reset: Some(1_700_000_000),
            }
        );
    }

    #[test]
    fn tolerates_garbage_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(LIMIT_HEADER, HeaderValue::from_static("lots"));
        let parsed = RateLimit::from_headers(&headers);
        assert_eq!(parsed, RateLimit::default());
        assert!(matches!(
            parsed.reset_epoch(),
            Err(ApiError::RateLimitHeader(RESET_HEADER))
        ));
    }

    #[test]
    fn retry_wait_adds_margin_and_never_goes_negative() {
        assert_eq!(retry_after_reset(1_010, 1_000), Duration::from_secs(15));
        assert_eq!(retry_after_reset(1_000, 1_000), Duration::from_secs(5));
        assert_eq!(retry_after_reset(900, 1_000), Duration::ZERO);
    }

    #[test]
    fn until_reset_clamps_to_zero() {
        assert_eq!(until_reset(1_030, 1_000), Duration::from_secs(30));
        assert_eq!(until_reset(990, 1_000), Duration::ZERO);
    }

    #[test]
    fn threshold_is_inclusive() {
        let state = RateLimit {
            limit: Some(600),
            remaining: Some(300),
            reset: Some(0),
        };
        assert!(state.below_threshold(50).unwrap());
        assert!(
            !RateLimit {
                remaining: Some(301),
                ..state
            }
            .below_threshold(50)
            .unwrap()
        );
    }

    #[test]
    fn full_speed_never_throttles() {
        let exhausted = RateLimit {
            limit: Some(600),
            remaining: Some(0),
            reset: None,
        };
        assert!(!exhausted.below_threshold(100).unwrap());
        assert!(!RateLimit::default().below_threshold(100).unwrap());
    }

    #[test]
    fn threshold_needs_headers() {
        assert!(matches!(
            RateLimit::default().below_threshold(50),
            Err(ApiError::RateLimitHeader(LIMIT_HEADER))
        ));
    }
}
