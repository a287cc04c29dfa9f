//! Bounded retry with exponential backoff

use crate::crawler::FetchRequest;
use std::time::Duration;

/// What to do with a request whose attempt just failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue this request (retry count already incremented)
    Retry(FetchRequest),
    /// Budget spent; drop the request
    GiveUp(FetchRequest),
}

/// Fixed per-request retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RETRIES, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Doublings stop here so the delay cannot overflow
    const MAX_BACKOFF_EXPONENT: u32 = 16;

    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decides the fate of a failed request
    ///
    /// A request that has failed `n < max_retries` times goes back as a retry
    /// with `n + 1`; one that has already been retried `max_retries` times is
    /// given up on, for `max_retries + 1` attempts in total.
    pub fn on_failure(&self, mut request: FetchRequest) -> RetryDecision {
        if request.retry_count < self.max_retries {
            request.retry_count += 1;
            RetryDecision::Retry(request)
        } else {
            RetryDecision::GiveUp(request)
        }
    }

    /// Delay before attempting `request`: zero for a first attempt, then
    /// `backoff * 2^(n-1)` for the n-th retry
    pub fn delay_for(&self, request: &FetchRequest) -> Duration {
        match request.retry_count {
            0 => Duration::ZERO,
            n => {
                let exponent = (n - 1).min(Self::MAX_BACKOFF_EXPONENT);
                self.backoff.saturating_mul(1 << exponent)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> FetchRequest {
        FetchRequest::detail_seed("gaming", "https://shop.example/dp/AAAAAAAAAA")
    }

    #[test]
    fn test_persistent_failure_attempts() {
        for max_retries in [0, 1, 3, 10] {
            let policy = RetryPolicy::new(max_retries, Duration::ZERO);
            let mut current = request();
            let mut attempts = 0;

            loop {
                attempts += 1;
                match policy.on_failure(current) {
                    RetryDecision::Retry(next) => current = next,
                    RetryDecision::GiveUp(last) => {
                        assert_eq!(last.retry_count, max_retries);
                        assert_eq!(last.attempts(), attempts);
                        break;
                    }
                }
            }

            assert_eq!(attempts, max_retries + 1);
        }
    }

    #[test]
    fn test_retry_preserves_identity() {
        let policy = RetryPolicy::default();
        let original = request();

        match policy.on_failure(original.clone()) {
            RetryDecision::Retry(retried) => {
                assert_eq!(retried.url, original.url);
                assert_eq!(retried.kind, original.kind);
                assert_eq!(retried.depth, original.depth);
                assert_eq!(retried.retry_count, 1);
            }
            RetryDecision::GiveUp(_) => panic!("first failure should retry"),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        let mut request = request();

        assert_eq!(policy.delay_for(&request), Duration::ZERO);
        request.retry_count = 1;
        assert_eq!(policy.delay_for(&request), Duration::from_millis(100));
        request.retry_count = 2;
        assert_eq!(policy.delay_for(&request), Duration::from_millis(200));
        request.retry_count = 3;
        assert_eq!(policy.delay_for(&request), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        let policy = RetryPolicy::new(10, Duration::from_secs(u64::MAX / 2));
        let mut request = request();
        request.retry_count = 64;
        assert_eq!(policy.delay_for(&request), Duration::MAX);
    }
}
