use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::retry::backoff::{until_cancelled, Cancelled};

/// A failure captured by [`run_catching`].
#[derive(Error, Debug)]
pub enum Caught<E> {
    #[error("{0}")]
    Failed(E),

    #[error("Operation panicked: {0}")]
    Panicked(String),
}

/// Runs `future` and turns its failures into values.
///
/// Errors come back as `Ok(Err(Caught::Failed(_)))` and panics as
/// `Ok(Err(Caught::Panicked(_)))`. Only cancellation of `token` is reported
/// through the outer `Err`, so callers can `?` it straight up the stack.
pub async fn run_catching<T, E, Fut>(
    token: &CancellationToken,
    future: Fut,
) -> Result<Result<T, Caught<E>>, Cancelled>
where
    Fut: Future<Output = Result<T, E>>,
{
    if token.is_cancelled() {
        return Err(Cancelled);
    }

    let outcome = until_cancelled(token, AssertUnwindSafe(future).catch_unwind()).await?;

    Ok(match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(Caught::Failed(error)),
        Err(panic) => Err(Caught::Panicked(panic_message(panic))),
    })
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Rewrites the error carried by a caught failure, leaving successes and
/// panics alone.
pub trait MapFailure<T, E> {
    fn map_failure<E2, F>(self, f: F) -> Result<T, Caught<E2>>
    where
        F: FnOnce(E) -> E2;
}

impl<T, E> MapFailure<T, E> for Result<T, Caught<E>> {
    fn map_failure<E2, F>(self, f: F) -> Result<T, Caught<E2>>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Ok(value) => Ok(value),
            Err(Caught::Failed(error)) => Err(Caught::Failed(f(error))),
            Err(Caught::Panicked(message)) => Err(Caught::Panicked(message)),
        }
    }
}
