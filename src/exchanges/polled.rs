use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::errors::ExchangeError;
use crate::core::traits::{
    FuturesRest, FuturesStream, PositionHandler, UpdateSubscription, WalletHandler,
};

/// Synthesizes a push stream for exchanges without one by polling REST on a
/// fixed interval and invoking the same handler contract. Subscribers
/// cannot tell a poller from a native stream.
///
/// A poller has no transport to lose, so its connection-lost channel never
/// fires; the REST gateway underneath already absorbs transient failures.
pub struct PolledStream {
    rest: Arc<dyn FuturesRest>,
    interval: Duration,
}

impl PolledStream {
    pub fn new(rest: Arc<dyn FuturesRest>, interval: Duration) -> Self {
        Self { rest, interval }
    }

    fn spawn_poller<F, Fut>(&self, topic: &'static str, poll: F) -> UpdateSubscription
    where
        F: Fn(Arc<dyn FuturesRest>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ExchangeError>> + Send,
    {
        let auto_reconnect = Arc::new(AtomicBool::new(false));
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let rest = Arc::clone(&self.rest);
        let interval = self.interval;
        let poller_shutdown = shutdown.clone();

        let task = tokio::spawn(async move {
            // Held so the connection-lost channel stays open for the
            // subscription's lifetime.
            let _lost_tx = lost_tx;
            loop {
                tokio::select! {
                    () = poller_shutdown.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
                tokio::select! {
                    () = poller_shutdown.cancelled() => break,
                    result = poll(Arc::clone(&rest)) => {
                        if let Err(err) = result {
                            warn!(topic, error = %err, "poll failed, retrying next interval");
                        }
                    }
                }
            }
        });

        UpdateSubscription::new(topic, auto_reconnect, lost_rx, shutdown, task)
    }
}

#[async_trait]
impl FuturesStream for PolledStream {
    async fn subscribe_wallet_updates(
        &self,
        handler: WalletHandler,
    ) -> Result<UpdateSubscription, ExchangeError> {
        Ok(self.spawn_poller("wallet-poll", move |rest| {
            let handler = Arc::clone(&handler);
            async move {
                let balance = rest.balance().await?;
                handler(balance);
                Ok(())
            }
        }))
    }

    async fn subscribe_position_updates(
        &self,
        handler: PositionHandler,
    ) -> Result<UpdateSubscription, ExchangeError> {
        Ok(self.spawn_poller("position-poll", move |rest| {
            let handler = Arc::clone(&handler);
            async move {
                let positions = rest.positions().await?;
                for position in positions {
                    handler(position);
                }
                Ok(())
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Balance, ClosedTrade, Position};
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    struct FixedRest {
        balance: Balance,
    }

    #[async_trait]
    impl FuturesRest for FixedRest {
        async fn balance(&self) -> Result<Balance, ExchangeError> {
            Ok(self.balance)
        }

        async fn positions(&self) -> Result<Vec<Position>, ExchangeError> {
            Ok(Vec::new())
        }

        async fn closed_trades(
            &self,
            _start_time: DateTime<Utc>,
        ) -> Result<Vec<ClosedTrade>, ExchangeError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poller_delivers_balances_through_handler() {
        let rest = Arc::new(FixedRest {
            balance: Balance {
                equity: Some(dec!(42)),
                ..Balance::default()
            },
        });
        let stream = PolledStream::new(rest, Duration::from_secs(10));

        let seen: Arc<Mutex<Vec<Balance>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut subscription = stream
            .subscribe_wallet_updates(Arc::new(move |balance| sink.lock().push(balance)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(25)).await;
        subscription.close().await;

        let seen = seen.lock();
        assert!(seen.len() >= 2, "expected at least two polls, got {}", seen.len());
        assert_eq!(seen[0].equity, Some(dec!(42)));
    }

    #[tokio::test(start_paused = true)]
    async fn no_handler_runs_after_close() {
        let rest = Arc::new(FixedRest {
            balance: Balance::default(),
        });
        let stream = PolledStream::new(rest, Duration::from_secs(10));

        let seen: Arc<Mutex<Vec<Balance>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut subscription = stream
            .subscribe_wallet_updates(Arc::new(move |balance| sink.lock().push(balance)))
            .await
            .unwrap();

        subscription.close().await;
        let count_at_close = seen.lock().len();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(seen.lock().len(), count_at_close);
    }
}
