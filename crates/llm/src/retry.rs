use std::time::Duration;

/// Fixed-interval retry for transient service failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            interval: Duration::ZERO,
        }
    }

    pub fn fixed(max_retries: usize, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// `attempt` counts failures so far, starting at zero.
    pub fn should_retry(&self, attempt: usize) -> bool {
        attempt < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Rate limiting and server-side failures are worth another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}
