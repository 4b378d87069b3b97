//! Retrying async operations with exponential backoff.
//!
//! Cancellation is carried by a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! and always wins over retrying: it is reported as [`Cancelled`], never handed to a
//! retry predicate and never wrapped by [`run_catching`].

mod backoff;
mod catching;

pub use backoff::{retry_with_backoff, BackoffDelays, Cancelled, RetryError, RetryPolicy};
pub use catching::{run_catching, Caught, MapFailure};
