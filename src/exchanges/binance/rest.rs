use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::warn;

use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::retry::retry_forever;
use crate::core::traits::FuturesRest;
use crate::core::types::{Balance, ClosedTrade, Position};
use crate::exchanges::binance::converters;
use crate::exchanges::binance::types::{BinanceBalance, BinanceIncome, BinancePositionRisk};
use crate::exchanges::SETTLE_ASSET;

/// Rate-limit courtesy pause between paginated requests.
const PAGE_THROTTLE: Duration = Duration::from_secs(1);

/// Income history page size; a full page means more data may follow.
const INCOME_PAGE_SIZE: usize = 1000;

/// Thin typed wrapper around `RestClient` for the Binance USD-M futures API
pub struct BinanceRest<R: RestClient> {
    client: R,
}

impl<R: RestClient> BinanceRest<R> {
    pub fn new(client: R) -> Self {
        Self { client }
    }

    pub async fn balances(&self) -> Result<Vec<BinanceBalance>, ExchangeError> {
        self.client.get_json("/fapi/v2/balance", &[], true).await
    }

    pub async fn position_risk(&self) -> Result<Vec<BinancePositionRisk>, ExchangeError> {
        self.client
            .get_json("/fapi/v2/positionRisk", &[], true)
            .await
    }

    pub async fn income(
        &self,
        start_time_ms: i64,
        limit: usize,
    ) -> Result<Vec<BinanceIncome>, ExchangeError> {
        let start_time = start_time_ms.to_string();
        let limit = limit.to_string();
        let params = [
            ("startTime", start_time.as_str()),
            ("limit", limit.as_str()),
        ];
        self.client.get_json("/fapi/v1/income", &params, true).await
    }
}

/// [`FuturesRest`] gateway for Binance USD-M futures.
pub struct BinanceFuturesRest<R: RestClient> {
    rest: BinanceRest<R>,
}

impl<R: RestClient> BinanceFuturesRest<R> {
    pub fn new(client: R) -> Self {
        Self {
            rest: BinanceRest::new(client),
        }
    }
}

#[async_trait]
impl<R: RestClient> FuturesRest for BinanceFuturesRest<R> {
    async fn balance(&self) -> Result<Balance, ExchangeError> {
        let balances = retry_forever("binance balances", || self.rest.balances()).await;

        for wire in &balances {
            if wire.asset.eq_ignore_ascii_case(SETTLE_ASSET) {
                return Ok(converters::balance_from_wire(wire));
            }
        }

        Ok(Balance::default())
    }

    async fn positions(&self) -> Result<Vec<Position>, ExchangeError> {
        let wires = retry_forever("binance positions", || self.rest.position_risk()).await;

        let mut positions = Vec::new();
        for wire in &wires {
            match converters::position_from_wire(wire) {
                Some(position) if position.quantity > Decimal::ZERO => positions.push(position),
                Some(_) => {} // flat entry, positionRisk lists every symbol
                None => {
                    warn!(symbol = %wire.symbol, "could not convert position, record skipped");
                }
            }
        }
        Ok(positions)
    }

    /// The income endpoint has no cursor; while a page comes back full, the
    /// next page starts from the newest record time seen so far. Overlap is
    /// absorbed by deduplicating on the synthesized order id.
    async fn closed_trades(
        &self,
        start_time: DateTime<Utc>,
    ) -> Result<Vec<ClosedTrade>, ExchangeError> {
        let trades = retry_forever("binance income history", || async move {
            let mut trades: HashMap<String, ClosedTrade> = HashMap::new();
            let mut page_start_ms = start_time.timestamp_millis();
            loop {
                let page = self.rest.income(page_start_ms, INCOME_PAGE_SIZE).await?;
                let page_len = page.len();
                let page_max_time = page.iter().map(|record| record.time).max();

                for record in &page {
                    if let Some(trade) = converters::closed_trade_from_income(record) {
                        trades.insert(trade.order_id.clone(), trade);
                    }
                }

                if page_len < INCOME_PAGE_SIZE {
                    break;
                }
                match page_max_time {
                    // No forward progress is possible if every record in
                    // the full page shares the start timestamp.
                    Some(max_time) if max_time > page_start_ms => page_start_ms = max_time,
                    _ => break,
                }
                tokio::time::sleep(PAGE_THROTTLE).await;
            }
            Ok::<_, ExchangeError>(trades)
        })
        .await;

        Ok(trades.into_values().collect())
    }
}
