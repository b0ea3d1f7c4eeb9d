use std::fmt::Display;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Delay schedule for retried requests.
///
/// Attempt `i` that fails waits `base_delays[i]` before the next try; once
/// the base delays are used up the remaining `final_retries` attempts wait
/// `final_delay` each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delays: Vec<Duration>,
    pub final_retries: usize,
    pub final_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delays: [1, 2, 4].map(Duration::from_secs).to_vec(),
            final_retries: 2,
            final_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            base_delays: Vec::new(),
            final_retries: 1,
            final_delay: Duration::ZERO,
        }
    }

    /// `attempts` tries with no delay in between.
    #[must_use]
    pub const fn immediate(attempts: usize) -> Self {
        Self {
            base_delays: Vec::new(),
            final_retries: attempts,
            final_delay: Duration::ZERO,
        }
    }

    /// Total number of attempts, never less than one.
    #[must_use]
    pub fn attempts(&self) -> usize {
        (self.base_delays.len() + self.final_retries).max(1)
    }

    fn delay_after(&self, attempt: usize) -> Duration {
        self.base_delays
            .get(attempt)
            .copied()
            .unwrap_or(self.final_delay)
    }
}

/// Retry an async operation following `policy`.
///
/// Returns the first success, or the last error once every attempt failed.
pub async fn retry_with_backoff<F, Fut, T, E>(operation: F, policy: &RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
{
    retry_when(operation, policy, |_| true).await
}

/// Like [`retry_with_backoff`], but stops early when `retryable` rejects
/// the error.
pub async fn retry_when<F, Fut, T, E, P>(
    mut operation: F,
    policy: &RetryPolicy,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let total = policy.attempts();
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt >= total || !retryable(&e) {
                    return Err(e);
                }
                let delay = policy.delay_after(attempt - 1);
                warn!(
                    "Request failed (attempt {attempt}/{total}): {e}. Retrying after {}ms...",
                    delay.as_millis()
                );
                sleep(delay).await;
            }
        }
    }
}
