pub mod binance;
pub mod bybit;
pub mod polled;

/// Settlement asset tracked across all gateways. Balances are reported for
/// this asset and positions are filtered to contracts settling in it.
pub const SETTLE_ASSET: &str = "USDT";
