use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tracing::warn;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Retries `make` until it succeeds, sleeping with jittered exponential
/// backoff (500ms doubling, capped at 30s) between attempts.
///
/// Never gives up on its own: from the caller's point of view the operation
/// either succeeds or the surrounding task is cancelled. Callers abandon an
/// in-flight retry loop by dropping the returned future (e.g. losing a
/// `tokio::select!` race against a cancellation token).
pub async fn retry_forever<T, E, F, Fut>(operation: &str, mut make: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut backoff = ExponentialBackoff::from_millis(2)
        .factor(250)
        .max_delay(MAX_BACKOFF)
        .map(jitter);

    loop {
        match make().await {
            Ok(value) => return value,
            Err(error) => {
                let delay = backoff.next().unwrap_or(MAX_BACKOFF);
                warn!(operation, %error, ?delay, "request failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
