mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as TimeDelta, Utc};
use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;

use common::{wait_until, MockRest, MockStream};
use perpdash::core::types::{Balance, ClosedTrade, Position, PositionSide, TradeMode};
use perpdash::AccountSynchronizer;

const WAIT: Duration = Duration::from_secs(2);

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn position(symbol: &str, side: PositionSide, quantity: rust_decimal::Decimal) -> Position {
    let now = Utc::now();
    Position::new(
        symbol,
        side,
        quantity,
        dec!(60000),
        dec!(0),
        TradeMode::CrossMargin,
        now,
        now,
    )
}

fn trade(order_id: &str, pnl: rust_decimal::Decimal) -> ClosedTrade {
    let now = Utc::now();
    ClosedTrade::new("BTCUSDT", order_id, pnl, now, now)
}

struct Harness {
    rest: Arc<MockRest>,
    stream: Arc<MockStream>,
    sync: Arc<AccountSynchronizer>,
    cancel: CancellationToken,
}

fn harness() -> Harness {
    init_tracing();
    let rest = Arc::new(MockRest::default());
    let stream = Arc::new(MockStream::default());
    let sync = AccountSynchronizer::new(
        "it-account",
        Arc::clone(&rest) as Arc<dyn perpdash::core::traits::FuturesRest>,
        Arc::clone(&stream) as Arc<dyn perpdash::core::traits::FuturesStream>,
    );
    Harness {
        rest,
        stream,
        sync,
        cancel: CancellationToken::new(),
    }
}

#[tokio::test]
async fn bootstrap_populates_the_snapshot() {
    let h = harness();
    *h.rest.balance.lock() = Balance {
        equity: Some(dec!(2500)),
        wallet_balance: Some(dec!(2400)),
        unrealized_pnl: Some(dec!(100)),
        realized_pnl: None,
    };
    *h.rest.positions.lock() = vec![position("BTCUSDT", PositionSide::Buy, dec!(1))];
    *h.rest.closed_trades.lock() = vec![trade("A_Trade", dec!(10))];

    h.sync.start(&h.cancel);
    assert!(wait_until(|| !h.sync.positions().is_empty(), WAIT).await);
    assert!(wait_until(|| !h.sync.daily_pnl().is_empty(), WAIT).await);

    assert_eq!(h.sync.balance().equity, Some(dec!(2500)));
    let positions = h.sync.positions();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].symbol, "BTCUSDT");
    assert_eq!(h.sync.daily_pnl()[0].pnl, dec!(10));

    h.sync.stop().await;
}

#[tokio::test]
async fn reads_before_bootstrap_return_defaults() {
    let h = harness();
    assert_eq!(h.sync.balance(), Balance::default());
    assert!(h.sync.positions().is_empty());
    assert!(h.sync.daily_pnl().is_empty());
}

#[tokio::test]
async fn pushed_zero_quantity_closes_the_position() {
    let h = harness();
    *h.rest.positions.lock() = vec![position("BTCUSD", PositionSide::Buy, dec!(1))];

    h.sync.start(&h.cancel);
    assert!(wait_until(|| h.sync.positions().len() == 1, WAIT).await);

    h.stream
        .push_position(position("BTCUSD", PositionSide::Buy, dec!(0)));
    assert!(h.sync.positions().is_empty());

    h.sync.stop().await;
}

#[tokio::test]
async fn pushed_wallet_update_replaces_the_balance() {
    let h = harness();
    *h.rest.balance.lock() = Balance {
        equity: Some(dec!(100)),
        wallet_balance: Some(dec!(100)),
        unrealized_pnl: None,
        realized_pnl: None,
    };

    h.sync.start(&h.cancel);
    assert!(
        wait_until(|| h.sync.balance().equity == Some(dec!(100)), WAIT).await,
        "bootstrap balance never arrived"
    );

    h.stream.push_wallet(Balance {
        equity: Some(dec!(175)),
        ..Balance::default()
    });
    let balance = h.sync.balance();
    assert_eq!(balance.equity, Some(dec!(175)));
    assert_eq!(balance.wallet_balance, None);

    h.sync.stop().await;
}

#[tokio::test]
async fn lost_position_connection_triggers_a_resync() {
    let h = harness();
    *h.rest.positions.lock() = vec![position("BTCUSDT", PositionSide::Buy, dec!(1))];

    h.sync.start(&h.cancel);
    assert!(wait_until(|| h.sync.positions().len() == 1, WAIT).await);

    // While "disconnected" the account changed entirely; the stale entry
    // must vanish after the reconnect resync.
    *h.rest.positions.lock() = vec![position("ETHUSDT", PositionSide::Sell, dec!(4))];
    h.stream.drop_position_connection();

    assert!(
        wait_until(
            || {
                let snapshot = h.sync.positions();
                snapshot.len() == 1 && snapshot[0].symbol == "ETHUSDT"
            },
            WAIT
        )
        .await,
        "resync after connection loss never happened"
    );

    h.sync.stop().await;
}

#[tokio::test]
async fn lost_wallet_connection_triggers_a_balance_refetch() {
    let h = harness();
    *h.rest.balance.lock() = Balance {
        equity: Some(dec!(100)),
        ..Balance::default()
    };

    h.sync.start(&h.cancel);
    assert!(wait_until(|| h.sync.balance().equity == Some(dec!(100)), WAIT).await);

    *h.rest.balance.lock() = Balance {
        equity: Some(dec!(55)),
        ..Balance::default()
    };
    h.stream.drop_wallet_connection();

    assert!(
        wait_until(|| h.sync.balance().equity == Some(dec!(55)), WAIT).await,
        "balance refetch after connection loss never happened"
    );

    h.sync.stop().await;
}

#[tokio::test]
async fn stop_closes_every_subscription() {
    let h = harness();
    h.sync.start(&h.cancel);
    assert!(wait_until(|| h.stream.wallet_subscribed(), WAIT).await);

    h.sync.stop().await;
    assert!(h.stream.all_subscriptions_closed());

    // Idempotent.
    h.sync.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_readers_never_observe_a_torn_snapshot() {
    let h = harness();
    h.sync.start(&h.cancel);
    assert!(wait_until(|| h.stream.wallet_subscribed(), WAIT).await);

    let symbols = ["BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT"];

    let mut writers = Vec::new();
    for (w, symbol) in symbols.into_iter().enumerate() {
        let stream = Arc::clone(&h.stream);
        writers.push(tokio::spawn(async move {
            for i in 0..200u32 {
                // Alternate upserts and removals of the same key.
                let quantity = if i % 5 == 4 {
                    dec!(0)
                } else {
                    rust_decimal::Decimal::from(i + 1)
                };
                stream.push_position(position(symbol, PositionSide::Buy, quantity));
                stream.push_wallet(Balance {
                    equity: Some(rust_decimal::Decimal::from(w as u32 * 1000 + i)),
                    ..Balance::default()
                });
                tokio::task::yield_now().await;
            }
        }));
    }

    let mut readers = Vec::new();
    for _ in 0..4 {
        let sync = Arc::clone(&h.sync);
        readers.push(tokio::spawn(async move {
            for _ in 0..500u32 {
                let snapshot = sync.positions();
                let mut keys: Vec<_> = snapshot.iter().map(Position::key).collect();
                keys.sort_by(|a, b| (&a.symbol, a.side as u8).cmp(&(&b.symbol, b.side as u8)));
                let before = keys.len();
                keys.dedup();
                assert_eq!(before, keys.len(), "duplicate key in published snapshot");
                assert!(snapshot.len() <= 4, "snapshot larger than writer key space");
                let _ = sync.balance();
                tokio::task::yield_now().await;
            }
        }));
    }

    for result in futures::future::join_all(writers).await {
        result.unwrap();
    }
    for result in futures::future::join_all(readers).await {
        result.unwrap();
    }

    h.sync.stop().await;
}

#[tokio::test]
async fn bootstrap_requests_the_full_retention_window() {
    let h = harness();
    h.sync.start(&h.cancel);
    assert!(wait_until(|| !h.rest.requested_starts.lock().is_empty(), WAIT).await);

    let start = h.rest.requested_starts.lock()[0];
    let age = Utc::now() - start;
    // Five days back from UTC midnight, so between 5 and 6 days ago.
    assert!(
        age >= TimeDelta::days(5) && age <= TimeDelta::days(6),
        "unexpected start {start}"
    );

    h.sync.stop().await;
}
