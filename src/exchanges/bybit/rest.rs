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
use crate::exchanges::bybit::converters;
use crate::exchanges::bybit::types::{
    BybitClosedPnlResult, BybitPositionResult, BybitResponse, BybitWalletResult,
};
use crate::exchanges::SETTLE_ASSET;

/// Rate-limit courtesy pause between paginated requests.
const PAGE_THROTTLE: Duration = Duration::from_secs(1);

const CLOSED_PNL_PAGE_SIZE: &str = "200";

/// Thin typed wrapper around `RestClient` for the Bybit v5 API
pub struct BybitRest<R: RestClient> {
    client: R,
}

impl<R: RestClient> BybitRest<R> {
    pub fn new(client: R) -> Self {
        Self { client }
    }

    pub async fn wallet_balance(
        &self,
    ) -> Result<BybitResponse<BybitWalletResult>, ExchangeError> {
        let params = [("accountType", "UNIFIED")];
        self.client
            .get_json("/v5/account/wallet-balance", &params, true)
            .await
    }

    pub async fn positions(
        &self,
        settle_coin: &str,
        cursor: Option<&str>,
    ) -> Result<BybitResponse<BybitPositionResult>, ExchangeError> {
        let mut params = vec![("category", "linear"), ("settleCoin", settle_coin)];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        self.client
            .get_json("/v5/position/list", &params, true)
            .await
    }

    pub async fn closed_pnl(
        &self,
        start_time_ms: i64,
        cursor: Option<&str>,
    ) -> Result<BybitResponse<BybitClosedPnlResult>, ExchangeError> {
        let start_time = start_time_ms.to_string();
        let mut params = vec![
            ("category", "linear"),
            ("startTime", start_time.as_str()),
            ("limit", CLOSED_PNL_PAGE_SIZE),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        self.client
            .get_json("/v5/position/closed-pnl", &params, true)
            .await
    }
}

fn into_result<T>(response: BybitResponse<T>) -> Result<T, ExchangeError> {
    if response.ret_code != 0 {
        return Err(ExchangeError::ApiError {
            code: response.ret_code,
            message: response.ret_msg,
        });
    }
    Ok(response.result)
}

fn next_cursor(cursor: Option<String>) -> Option<String> {
    cursor.filter(|c| !c.trim().is_empty())
}

/// [`FuturesRest`] gateway for Bybit linear futures.
///
/// Every operation retries without bound, so from the synchronizer's point
/// of view a call either succeeds or gets dropped at shutdown.
pub struct BybitFuturesRest<R: RestClient> {
    rest: BybitRest<R>,
}

impl<R: RestClient> BybitFuturesRest<R> {
    pub fn new(client: R) -> Self {
        Self {
            rest: BybitRest::new(client),
        }
    }
}

#[async_trait]
impl<R: RestClient> FuturesRest for BybitFuturesRest<R> {
    async fn balance(&self) -> Result<Balance, ExchangeError> {
        let wallets = retry_forever("bybit wallet balance", || async move {
            into_result(self.rest.wallet_balance().await?)
        })
        .await;

        for account in &wallets.list {
            if account.account_type != "UNIFIED" {
                continue;
            }
            if let Some(coin) = account
                .coin
                .iter()
                .find(|c| c.coin.eq_ignore_ascii_case(SETTLE_ASSET))
            {
                return Ok(converters::balance_from_coin(coin));
            }
        }

        Ok(Balance::default())
    }

    async fn positions(&self) -> Result<Vec<Position>, ExchangeError> {
        let positions = retry_forever("bybit positions", || async move {
            let mut positions = Vec::new();
            let mut cursor: Option<String> = None;
            loop {
                let response = self.rest.positions(SETTLE_ASSET, cursor.as_deref()).await?;
                let result = into_result(response)?;
                for wire in &result.list {
                    match converters::position_from_wire(wire) {
                        Some(position) if position.quantity > Decimal::ZERO => {
                            positions.push(position);
                        }
                        Some(_) => {}
                        None => {
                            warn!(symbol = %wire.symbol, "could not convert position, record skipped");
                        }
                    }
                }
                match next_cursor(result.next_page_cursor) {
                    Some(next) => {
                        tokio::time::sleep(PAGE_THROTTLE).await;
                        cursor = Some(next);
                    }
                    None => break,
                }
            }
            Ok::<_, ExchangeError>(positions)
        })
        .await;

        Ok(positions)
    }

    async fn closed_trades(
        &self,
        start_time: DateTime<Utc>,
    ) -> Result<Vec<ClosedTrade>, ExchangeError> {
        let start_time_ms = start_time.timestamp_millis();
        let trades = retry_forever("bybit closed pnl", || async move {
            let mut trades: HashMap<String, ClosedTrade> = HashMap::new();
            let mut cursor: Option<String> = None;
            loop {
                let response = self
                    .rest
                    .closed_pnl(start_time_ms, cursor.as_deref())
                    .await?;
                let result = into_result(response)?;
                for wire in &result.list {
                    match converters::closed_trade_from_wire(wire) {
                        Some(trade) => {
                            trades.insert(trade.order_id.clone(), trade);
                        }
                        None => {
                            warn!(symbol = %wire.symbol, "could not convert closed trade, record skipped");
                        }
                    }
                }
                match next_cursor(result.next_page_cursor) {
                    Some(next) => {
                        tokio::time::sleep(PAGE_THROTTLE).await;
                        cursor = Some(next);
                    }
                    None => break,
                }
            }
            Ok::<_, ExchangeError>(trades)
        })
        .await;

        Ok(trades.into_values().collect())
    }
}
