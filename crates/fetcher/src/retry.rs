use std::future::Future;
use std::time::Duration;
use log::warn;
use crate::job::CancelToken;

/// Result of a bounded retry loop
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// The operation succeeded on attempt `attempts` (1-based)
    Succeeded { value: T, attempts: u32 },
    /// Every attempt failed; no further attempts are made
    Exhausted { attempts: u32, last_error: anyhow::Error },
    /// Cancellation was requested before or between attempts
    Cancelled,
}

/// Run `op` up to `max_attempts` times with a fixed delay between a
/// failed attempt and the next one. The delay is cancellable, as is
/// the gap before each attempt; the operation itself is responsible
/// for observing the token internally if it is long-running.
pub async fn with_fixed_delay<T, F, Fut>(
    max_attempts: u32,
    delay: Duration,
    cancel: &CancelToken,
    mut op: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut last_error: Option<anyhow::Error> = None;

    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return RetryOutcome::Cancelled;
        }

        match op(attempt).await {
            Ok(value) => return RetryOutcome::Succeeded { value, attempts: attempt },
            Err(e) => {
                warn!("Attempt {attempt}/{max_attempts} failed: {e}");
                last_error = Some(e);
            }
        }

        if attempt < max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return RetryOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    RetryOutcome::Exhausted {
        attempts: max_attempts,
        last_error: last_error.unwrap_or_else(|| anyhow::anyhow!("no attempts were made")),
    }
}
