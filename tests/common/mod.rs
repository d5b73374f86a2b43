use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use perpdash::core::errors::ExchangeError;
use perpdash::core::traits::{
    FuturesRest, FuturesStream, PositionHandler, UpdateSubscription, WalletHandler,
};
use perpdash::{Balance, ClosedTrade, Position};

/// REST gateway double serving whatever the test sets.
#[derive(Default)]
pub struct MockRest {
    pub balance: Mutex<Balance>,
    pub positions: Mutex<Vec<Position>>,
    pub closed_trades: Mutex<Vec<ClosedTrade>>,
    pub requested_starts: Mutex<Vec<DateTime<Utc>>>,
}

#[async_trait]
impl FuturesRest for MockRest {
    async fn balance(&self) -> Result<Balance, ExchangeError> {
        Ok(*self.balance.lock())
    }

    async fn positions(&self) -> Result<Vec<Position>, ExchangeError> {
        Ok(self.positions.lock().clone())
    }

    async fn closed_trades(
        &self,
        start_time: DateTime<Utc>,
    ) -> Result<Vec<ClosedTrade>, ExchangeError> {
        self.requested_starts.lock().push(start_time);
        Ok(self.closed_trades.lock().clone())
    }
}

struct MockSubscriptionState {
    lost_tx: mpsc::UnboundedSender<()>,
    closed: Arc<AtomicBool>,
}

/// Streaming gateway double. Captures the synchronizer's handlers so tests
/// can push updates and drop connections at will.
#[derive(Default)]
pub struct MockStream {
    wallet_handlers: Mutex<Vec<WalletHandler>>,
    position_handlers: Mutex<Vec<PositionHandler>>,
    wallet_subscriptions: Mutex<Vec<MockSubscriptionState>>,
    position_subscriptions: Mutex<Vec<MockSubscriptionState>>,
}

impl MockStream {
    pub fn push_wallet(&self, balance: Balance) {
        for handler in self.wallet_handlers.lock().iter() {
            handler(balance);
        }
    }

    pub fn push_position(&self, position: Position) {
        for handler in self.position_handlers.lock().iter() {
            handler(position.clone());
        }
    }

    pub fn drop_wallet_connection(&self) {
        for subscription in self.wallet_subscriptions.lock().iter() {
            let _ = subscription.lost_tx.send(());
        }
    }

    pub fn drop_position_connection(&self) {
        for subscription in self.position_subscriptions.lock().iter() {
            let _ = subscription.lost_tx.send(());
        }
    }

    pub fn wallet_subscribed(&self) -> bool {
        !self.wallet_handlers.lock().is_empty()
    }

    pub fn all_subscriptions_closed(&self) -> bool {
        let wallets = self.wallet_subscriptions.lock();
        let positions = self.position_subscriptions.lock();
        !wallets.is_empty()
            && wallets
                .iter()
                .chain(positions.iter())
                .all(|s| s.closed.load(Ordering::SeqCst))
    }

    fn make_subscription(&self, topic: &str) -> (MockSubscriptionState, UpdateSubscription) {
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let closed = Arc::new(AtomicBool::new(false));

        let closed_flag = Arc::clone(&closed);
        let task_shutdown = shutdown.clone();
        let task = tokio::spawn(async move {
            task_shutdown.cancelled().await;
            closed_flag.store(true, Ordering::SeqCst);
        });

        let state = MockSubscriptionState { lost_tx, closed };
        let subscription = UpdateSubscription::new(
            topic,
            Arc::new(AtomicBool::new(false)),
            lost_rx,
            shutdown,
            task,
        );
        (state, subscription)
    }
}

#[async_trait]
impl FuturesStream for MockStream {
    async fn subscribe_wallet_updates(
        &self,
        handler: WalletHandler,
    ) -> Result<UpdateSubscription, ExchangeError> {
        self.wallet_handlers.lock().push(handler);
        let (state, subscription) = self.make_subscription("wallet");
        self.wallet_subscriptions.lock().push(state);
        Ok(subscription)
    }

    async fn subscribe_position_updates(
        &self,
        handler: PositionHandler,
    ) -> Result<UpdateSubscription, ExchangeError> {
        self.position_handlers.lock().push(handler);
        let (state, subscription) = self.make_subscription("position");
        self.position_subscriptions.lock().push(state);
        Ok(subscription)
    }
}

/// Polls `condition` until it holds or the timeout elapses.
pub async fn wait_until(condition: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
