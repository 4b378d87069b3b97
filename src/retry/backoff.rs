use std::future::Future;
use std::time::Duration;

use log::debug;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Raised when a [`CancellationToken`] fires. Never retried, never wrapped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Operation cancelled")]
pub struct Cancelled;

#[derive(Error, Debug)]
pub enum RetryError<E> {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("{0}")]
    Failed(E),
}

impl<E> RetryError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled(_))
    }

    pub fn into_failure(self) -> Option<E> {
        match self {
            RetryError::Failed(error) => Some(error),
            RetryError::Cancelled(_) => None,
        }
    }
}

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub times: u32,
    pub initial_delay: Duration,
    pub factor: f64,
    /// `None` leaves the delay unbounded.
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            times: 3,
            initial_delay: Duration::from_millis(500),
            factor: 2.0,
            max_delay: Some(Duration::from_secs(5)),
        }
    }
}

impl RetryPolicy {
    pub fn new(times: u32, initial_delay: Duration, factor: f64) -> Self {
        Self {
            times,
            initial_delay,
            factor,
            max_delay: None,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// The waits between consecutive attempts, starting with `initial_delay`.
    pub fn delays(&self) -> BackoffDelays {
        BackoffDelays {
            current: self.initial_delay,
            factor: self.factor,
            max_delay: self.max_delay,
        }
    }
}

/// Endless iterator over backoff delays.
#[derive(Debug, Clone)]
pub struct BackoffDelays {
    current: Duration,
    factor: f64,
    max_delay: Option<Duration>,
}

impl Iterator for BackoffDelays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.current;

        let scaled = self.current.as_secs_f64() * self.factor;
        let grown = match Duration::try_from_secs_f64(scaled) {
            Ok(grown) => grown,
            Err(_) if scaled > 0.0 => Duration::MAX,
            Err(_) => Duration::ZERO,
        };
        self.current = match self.max_delay {
            Some(max_delay) => grown.min(max_delay),
            None => grown,
        };

        Some(delay)
    }
}

/// Runs `block` up to `policy.times` times, sleeping between failed attempts.
///
/// After a failure on attempt `i` (0-based) `should_retry(i, &error)` decides
/// whether to keep going; returning `false` surfaces the error right away. The
/// last attempt's result is returned as is. Cancelling `token` aborts both
/// a running attempt and a pending wait with [`RetryError::Cancelled`].
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    mut should_retry: P,
    mut block: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(u32, &E) -> bool,
{
    let times = policy.times.max(1);
    let mut delays = policy.delays();

    for attempt in 0..times - 1 {
        if token.is_cancelled() {
            return Err(Cancelled.into());
        }

        match until_cancelled(token, block(attempt)).await? {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !should_retry(attempt, &error) {
                    debug!("Attempt {} failed and is not retryable", attempt + 1);
                    return Err(RetryError::Failed(error));
                }
            }
        }

        let delay = delays.next().unwrap_or(policy.initial_delay);
        debug!(
            "Attempt {}/{} failed, retrying in {:?}",
            attempt + 1,
            times,
            delay
        );

        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Cancelled.into()),
            _ = tokio::time::sleep(delay) => {}
        }
    }

    if token.is_cancelled() {
        return Err(Cancelled.into());
    }
    until_cancelled(token, block(times - 1))
        .await?
        .map_err(RetryError::Failed)
}

pub(crate) async fn until_cancelled<Fut: Future>(
    token: &CancellationToken,
    future: Fut,
) -> Result<Fut::Output, Cancelled> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Cancelled),
        output = future => Ok(output),
    }
}
