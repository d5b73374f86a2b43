use crate::core::errors::ExchangeError;
use crate::core::types::{Balance, ClosedTrade, Position};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Callback invoked for every balance snapshot delivered by a wallet stream.
pub type WalletHandler = Arc<dyn Fn(Balance) + Send + Sync>;

/// Callback invoked for every position delivered by a position stream.
/// A zero quantity means the position was closed.
pub type PositionHandler = Arc<dyn Fn(Position) + Send + Sync>;

/// REST surface of one exchange's futures API.
///
/// Implementations wrap every call in [`crate::core::retry::retry_forever`],
/// so a call either eventually succeeds or the caller abandons it by
/// dropping the future. Terminal failures are never surfaced during normal
/// operation; the `Result` exists for non-conforming test doubles.
#[async_trait]
pub trait FuturesRest: Send + Sync {
    /// Current account balance for the settlement asset.
    async fn balance(&self) -> Result<Balance, ExchangeError>;

    /// Open positions. Entries with zero quantity are filtered at the
    /// source; a returned position always has `quantity > 0`.
    async fn positions(&self) -> Result<Vec<Position>, ExchangeError>;

    /// Closed trades updated at or after `start_time`, deduplicated by
    /// order id. May require several paginated round trips server-side.
    async fn closed_trades(
        &self,
        start_time: DateTime<Utc>,
    ) -> Result<Vec<ClosedTrade>, ExchangeError>;
}

/// Streaming surface of one exchange's futures API.
///
/// An exchange without native push support may synthesize these streams by
/// polling REST on a fixed interval; subscribers cannot tell the difference.
#[async_trait]
pub trait FuturesStream: Send + Sync {
    async fn subscribe_wallet_updates(
        &self,
        handler: WalletHandler,
    ) -> Result<UpdateSubscription, ExchangeError>;

    async fn subscribe_position_updates(
        &self,
        handler: PositionHandler,
    ) -> Result<UpdateSubscription, ExchangeError>;
}

/// Handle to one live streaming subscription.
///
/// The driving task owns the connection and invokes the handler; this
/// handle only observes and controls it. Dropping the handle without
/// calling [`UpdateSubscription::close`] leaves the task running.
pub struct UpdateSubscription {
    topic: String,
    auto_reconnect: Arc<AtomicBool>,
    connection_lost: Option<mpsc::UnboundedReceiver<()>>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl UpdateSubscription {
    pub fn new(
        topic: impl Into<String>,
        auto_reconnect: Arc<AtomicBool>,
        connection_lost: mpsc::UnboundedReceiver<()>,
        shutdown: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            topic: topic.into(),
            auto_reconnect,
            connection_lost: Some(connection_lost),
            shutdown,
            task: Some(task),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Keep the stream alive across transport drops: after a lost
    /// connection the driving task re-establishes and re-subscribes
    /// instead of terminating.
    pub fn enable_auto_reconnect(&self) {
        self.auto_reconnect.store(true, Ordering::Relaxed);
    }

    /// Takes the connection-lost channel. Yields one message per dropped
    /// connection; the channel closes when the subscription ends. Can be
    /// taken once.
    pub fn take_connection_lost(&mut self) -> Option<mpsc::UnboundedReceiver<()>> {
        self.connection_lost.take()
    }

    /// Closes the subscription and waits for its driving task to finish,
    /// so no handler invocation happens after this returns. Idempotent.
    pub async fn close(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(join_error) = task.await {
                if join_error.is_panic() {
                    error!(topic = %self.topic, %join_error, "subscription task panicked");
                }
            }
        }
    }
}
