use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as TimeDelta, NaiveTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::errors::ExchangeError;
use crate::core::traits::{
    FuturesRest, FuturesStream, PositionHandler, UpdateSubscription, WalletHandler,
};
use crate::core::types::{Balance, ClosedTrade, DailyPnl, Position, PositionKey};

/// Closed trades whose update time falls behind this horizon are discarded.
const RETENTION_DAYS: i64 = 5;

/// Cadence of the incremental closed-trade fetch.
const UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Everything a reader can observe, guarded by one lock per account.
///
/// `positions_snapshot` is a copy-on-write published view: rebuilt on every
/// positions write, handed out by `Arc` clone on every read.
struct AccountState {
    balance: Balance,
    positions: HashMap<PositionKey, Position>,
    positions_snapshot: Arc<[Position]>,
    closed_trades: HashMap<String, ClosedTrade>,
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            balance: Balance::default(),
            positions: HashMap::new(),
            positions_snapshot: Arc::new([]),
            closed_trades: HashMap::new(),
        }
    }
}

impl AccountState {
    fn republish_positions(&mut self) {
        self.positions_snapshot = self.positions.values().cloned().collect();
    }

    fn upsert_closed_trades(&mut self, trades: Vec<ClosedTrade>) {
        for trade in trades {
            self.closed_trades.insert(trade.order_id.clone(), trade);
        }
        let cutoff = retention_cutoff();
        self.closed_trades
            .retain(|_, trade| trade.update_time >= cutoff);
    }
}

/// Start of the closed-trade retention window: UTC midnight today minus
/// [`RETENTION_DAYS`].
fn retention_cutoff() -> DateTime<Utc> {
    let midnight = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
    midnight - TimeDelta::days(RETENTION_DAYS)
}

/// Keeps one account's balance, open positions and recent closed-trade PnL
/// continuously in sync with the exchange.
///
/// An authoritative REST snapshot is taken at start, then extended by push
/// updates from the exchange's streams and a once-a-minute incremental
/// closed-trade fetch. A lost stream connection triggers a full REST
/// re-fetch of the affected category, which bounds staleness to one round
/// trip after reconnect no matter how many updates were missed.
///
/// Readers never block on network I/O: every REST call is awaited with the
/// state lock released, and the lock is only taken for in-memory copies.
pub struct AccountSynchronizer {
    name: String,
    rest: Arc<dyn FuturesRest>,
    stream: Arc<dyn FuturesStream>,
    state: Mutex<AccountState>,
    subscriptions: tokio::sync::Mutex<Vec<UpdateSubscription>>,
    shutdown: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Clone, Copy)]
enum ReinitTarget {
    Balance,
    Positions,
}

impl AccountSynchronizer {
    pub fn new(
        name: impl Into<String>,
        rest: Arc<dyn FuturesRest>,
        stream: Arc<dyn FuturesStream>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            rest,
            stream,
            state: Mutex::new(AccountState::default()),
            subscriptions: tokio::sync::Mutex::new(Vec::new()),
            shutdown: Mutex::new(None),
            task: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schedules the background synchronization task and returns
    /// immediately; bootstrap happens on that task. Cancelling `cancel`
    /// winds the task down and closes its subscriptions, but only
    /// [`AccountSynchronizer::stop`] waits for that teardown.
    pub fn start(self: &Arc<Self>, cancel: &CancellationToken) {
        let mut task_slot = self.task.lock();
        if task_slot.is_some() {
            warn!(account = %self.name, "synchronizer already started");
            return;
        }

        let shutdown = cancel.child_token();
        *self.shutdown.lock() = Some(shutdown.clone());

        let this = Arc::clone(self);
        *task_slot = Some(tokio::spawn(async move {
            this.run(shutdown).await;
        }));
    }

    /// Closes every streaming subscription (awaiting each close, so no
    /// handler fires after this returns), then cancels the background task
    /// and waits for it to finish. Idempotent.
    pub async fn stop(&self) {
        let mut subscriptions = self.subscriptions.lock().await;
        for subscription in subscriptions.iter_mut() {
            subscription.close().await;
        }
        subscriptions.clear();
        drop(subscriptions);

        let shutdown = self.shutdown.lock().take();
        if let Some(shutdown) = shutdown {
            shutdown.cancel();
        }

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(join_error) = task.await {
                if join_error.is_panic() {
                    error!(account = %self.name, %join_error, "synchronizer task panicked");
                }
            }
        }

        info!(account = %self.name, "synchronizer stopped");
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        if let Err(err) = self.subscribe_streams(&shutdown).await {
            error!(account = %self.name, error = %err, "failed to open streaming subscriptions");
        }

        if let Err(err) = self.reinitialize_balance(&shutdown).await {
            error!(account = %self.name, error = %err, "failed to initialize balance");
        }
        if let Err(err) = self.reinitialize_positions(&shutdown).await {
            error!(account = %self.name, error = %err, "failed to initialize positions");
        }
        if let Err(err) = self.reinitialize_closed_trades(&shutdown).await {
            error!(account = %self.name, error = %err, "failed to initialize closed trades");
        }

        info!(account = %self.name, "account state bootstrapped");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(UPDATE_INTERVAL) => {}
            }

            if let Err(err) = self.update_closed_trades(&shutdown).await {
                warn!(account = %self.name, error = %err, "failed to update closed trades");
            }
        }

        // Stop may have raced subscription registration and seen an empty
        // list; nothing must outlive this task.
        let mut subscriptions = self.subscriptions.lock().await;
        for subscription in subscriptions.iter_mut() {
            subscription.close().await;
        }
        subscriptions.clear();
    }

    /// Opens the wallet and position streams and wires each stream's
    /// connection-lost events to the matching reinitialize operation. The
    /// streams' own drivers re-establish dropped connections; our only job
    /// on reconnect is to erase whatever drifted while disconnected.
    async fn subscribe_streams(
        self: &Arc<Self>,
        shutdown: &CancellationToken,
    ) -> Result<(), ExchangeError> {
        let this = Arc::clone(self);
        let wallet_handler: WalletHandler = Arc::new(move |balance| this.on_wallet_update(balance));
        let mut wallet = self.stream.subscribe_wallet_updates(wallet_handler).await?;
        wallet.enable_auto_reconnect();
        self.spawn_reinit_watcher(&mut wallet, shutdown, ReinitTarget::Balance);

        let this = Arc::clone(self);
        let position_handler: PositionHandler =
            Arc::new(move |position| this.on_position_update(position));
        let mut positions = self
            .stream
            .subscribe_position_updates(position_handler)
            .await?;
        positions.enable_auto_reconnect();
        self.spawn_reinit_watcher(&mut positions, shutdown, ReinitTarget::Positions);

        let mut subscriptions = self.subscriptions.lock().await;
        subscriptions.push(wallet);
        subscriptions.push(positions);
        Ok(())
    }

    fn spawn_reinit_watcher(
        self: &Arc<Self>,
        subscription: &mut UpdateSubscription,
        shutdown: &CancellationToken,
        target: ReinitTarget,
    ) {
        let Some(mut lost) = subscription.take_connection_lost() else {
            return;
        };
        let this = Arc::clone(self);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    event = lost.recv() => {
                        if event.is_none() {
                            break;
                        }
                        warn!(account = %this.name, ?target, "stream connection lost, re-fetching snapshot");
                        let result = match target {
                            ReinitTarget::Balance => this.reinitialize_balance(&shutdown).await,
                            ReinitTarget::Positions => this.reinitialize_positions(&shutdown).await,
                        };
                        if let Err(err) = result {
                            error!(account = %this.name, ?target, error = %err, "reinitialize after reconnect failed");
                        }
                    }
                }
            }
        });
    }

    async fn reinitialize_balance(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<(), ExchangeError> {
        let balance = tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            result = self.rest.balance() => result?,
        };

        self.state.lock().balance = balance;
        debug!(account = %self.name, "balance reinitialized");
        Ok(())
    }

    /// Full replace, not merge: this is the authoritative resync path used
    /// after reconnect, so entries the exchange no longer reports must
    /// disappear.
    async fn reinitialize_positions(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<(), ExchangeError> {
        let positions = tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            result = self.rest.positions() => result?,
        };

        let mut state = self.state.lock();
        state.positions.clear();
        for position in positions {
            state.positions.insert(position.key(), position);
        }
        state.republish_positions();
        debug!(account = %self.name, count = state.positions.len(), "positions reinitialized");
        Ok(())
    }

    async fn reinitialize_closed_trades(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<(), ExchangeError> {
        let start_time = retention_cutoff();
        let trades = tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            result = self.rest.closed_trades(start_time) => result?,
        };

        self.state.lock().upsert_closed_trades(trades);
        Ok(())
    }

    /// Extends the closed-trade history from the most recent trade already
    /// held, so each tick fetches only what is new since the last
    /// successfully observed trade. A missed tick self-heals on the next
    /// one.
    async fn update_closed_trades(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<(), ExchangeError> {
        let start_time = {
            let state = self.state.lock();
            state
                .closed_trades
                .values()
                .map(|trade| trade.update_time)
                .max()
                .unwrap_or_else(retention_cutoff)
        };

        // The fetch must never hold the state lock.
        let trades = tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            result = self.rest.closed_trades(start_time) => result?,
        };

        self.state.lock().upsert_closed_trades(trades);
        Ok(())
    }

    /// Stream callback; purely in-memory. A non-positive quantity closes
    /// the `(symbol, side)` entry, anything else upserts it.
    fn on_position_update(&self, position: Position) {
        let mut state = self.state.lock();
        if position.quantity <= Decimal::ZERO {
            state.positions.remove(&position.key());
        } else {
            state.positions.insert(position.key(), position);
        }
        state.republish_positions();
    }

    /// Stream callback; replaces the balance wholesale.
    fn on_wallet_update(&self, balance: Balance) {
        self.state.lock().balance = balance;
    }

    // --- query facade -----------------------------------------------------

    /// Latest known balance; default (all fields empty) before bootstrap.
    pub fn balance(&self) -> Balance {
        self.state.lock().balance
    }

    /// Published snapshot of open positions. Cheap: clones an `Arc`, never
    /// the array.
    pub fn positions(&self) -> Arc<[Position]> {
        Arc::clone(&self.state.lock().positions_snapshot)
    }

    /// Realized PnL summed per UTC calendar date over the retained
    /// closed-trade window. No ordering is guaranteed.
    pub fn daily_pnl(&self) -> Vec<DailyPnl> {
        let mut by_date: HashMap<chrono::NaiveDate, Decimal> = HashMap::new();
        {
            let state = self.state.lock();
            for trade in state.closed_trades.values() {
                *by_date.entry(trade.update_time.date_naive()).or_default() += trade.closed_pnl;
            }
        }
        by_date
            .into_iter()
            .map(|(date, pnl)| DailyPnl { date, pnl })
            .collect()
    }
}
