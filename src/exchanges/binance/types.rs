use serde::{Deserialize, Serialize};

/// One entry of `GET /fapi/v2/balance`.
#[derive(Debug, Deserialize, Serialize)]
pub struct BinanceBalance {
    pub asset: String,
    #[serde(rename = "crossWalletBalance", default)]
    pub cross_wallet_balance: String,
    #[serde(rename = "crossUnPnl", default)]
    pub cross_un_pnl: String,
}

/// One entry of `GET /fapi/v2/positionRisk`.
#[derive(Debug, Deserialize, Serialize)]
pub struct BinancePositionRisk {
    pub symbol: String,
    #[serde(rename = "positionAmt", default)]
    pub position_amt: String,
    #[serde(rename = "entryPrice", default)]
    pub entry_price: String,
    #[serde(rename = "unRealizedProfit", default)]
    pub unrealized_profit: String,
    #[serde(rename = "marginType", default)]
    pub margin_type: String,
    #[serde(rename = "positionSide", default)]
    pub position_side: String,
    #[serde(rename = "updateTime", default)]
    pub update_time: i64,
}

/// One entry of `GET /fapi/v1/income`.
#[derive(Debug, Deserialize, Serialize)]
pub struct BinanceIncome {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(rename = "incomeType", default)]
    pub income_type: Option<String>,
    #[serde(default)]
    pub income: String,
    #[serde(default)]
    pub time: i64,
    #[serde(rename = "tranId", default)]
    pub tran_id: i64,
}
