//! The retry module defines the bounded retry discipline used when cycling interfaces: a
//! fixed number of attempts with a fixed delay in between, retrying only the failures a
//! caller-supplied predicate says are worth another try.  The last failure propagates.
use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;

pub(crate) const DEFAULT_ATTEMPTS: usize = 3;
pub(crate) const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// How often and how patiently to retry one operation.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RetryPolicy {
    /// Total attempts, the first one included.
    pub(crate) attempts: usize,
    pub(crate) delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Run `action` until it succeeds, the predicate declines to retry, or the attempt
    /// budget is spent; the final error is handed back as-is.
    pub(crate) async fn run<A, F, T, E, P>(&self, action: A, retryable: P) -> Result<T, E>
    where
        A: FnMut() -> F,
        F: Future<Output = Result<T, E>>,
        P: FnMut(&E) -> bool,
    {
        let delays = FixedInterval::new(self.delay).take(self.attempts.saturating_sub(1));
        RetryIf::spawn(delays, action, retryable).await
    }
}
