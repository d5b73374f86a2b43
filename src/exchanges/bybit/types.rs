use serde::{Deserialize, Serialize};

/// Envelope every Bybit v5 REST response arrives in.
#[derive(Debug, Deserialize, Serialize)]
pub struct BybitResponse<T> {
    #[serde(rename = "retCode")]
    pub ret_code: i32,
    #[serde(rename = "retMsg", default)]
    pub ret_msg: String,
    pub result: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BybitWalletResult {
    #[serde(default)]
    pub list: Vec<BybitWalletAccount>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BybitWalletAccount {
    #[serde(rename = "accountType", default)]
    pub account_type: String,
    #[serde(default)]
    pub coin: Vec<BybitCoinBalance>,
}

/// Per-coin slice of a wallet account. All numeric fields are strings on
/// the wire and may be empty.
#[derive(Debug, Deserialize, Serialize)]
pub struct BybitCoinBalance {
    pub coin: String,
    #[serde(default)]
    pub equity: String,
    #[serde(rename = "walletBalance", default)]
    pub wallet_balance: String,
    #[serde(rename = "unrealisedPnl", default)]
    pub unrealised_pnl: String,
    #[serde(rename = "cumRealisedPnl", default)]
    pub cum_realised_pnl: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BybitPositionResult {
    #[serde(default)]
    pub list: Vec<BybitPosition>,
    #[serde(rename = "nextPageCursor", default)]
    pub next_page_cursor: Option<String>,
}

/// Position record, shared between the REST position list and the private
/// WebSocket `position` topic (which names the price field differently).
#[derive(Debug, Deserialize, Serialize)]
pub struct BybitPosition {
    pub symbol: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub size: String,
    #[serde(rename = "avgPrice", alias = "entryPrice", default)]
    pub avg_price: String,
    #[serde(rename = "unrealisedPnl", default)]
    pub unrealised_pnl: String,
    #[serde(rename = "tradeMode", default)]
    pub trade_mode: i32,
    #[serde(rename = "createdTime", default)]
    pub created_time: String,
    #[serde(rename = "updatedTime", default)]
    pub updated_time: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BybitClosedPnlResult {
    #[serde(default)]
    pub list: Vec<BybitClosedPnl>,
    #[serde(rename = "nextPageCursor", default)]
    pub next_page_cursor: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BybitClosedPnl {
    pub symbol: String,
    #[serde(rename = "orderId", default)]
    pub order_id: String,
    #[serde(rename = "execType", default)]
    pub exec_type: String,
    #[serde(rename = "closedPnl", default)]
    pub closed_pnl: String,
    #[serde(rename = "createdTime", default)]
    pub created_time: String,
    #[serde(rename = "updatedTime", default)]
    pub updated_time: String,
}
