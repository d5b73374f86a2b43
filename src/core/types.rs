use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account-level balance snapshot.
///
/// Every field is optional because exchanges differ in what they report;
/// a balance is always replaced wholesale, never merged field by field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub equity: Option<Decimal>,
    pub wallet_balance: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
}

/// Direction of an open position.
///
/// `None` is a real value on exchanges that do not distinguish direction
/// (one-way mode); `(symbol, None)` is one more valid distinct position key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Buy,
    Sell,
    None,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "Buy"),
            Self::Sell => write!(f, "Sell"),
            Self::None => write!(f, "None"),
        }
    }
}

/// Margin mode a position was opened under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeMode {
    CrossMargin,
    Isolated,
}

/// Identity of a position within one account.
///
/// Hedge mode accounts hold a Buy and a Sell entry for the same symbol
/// simultaneously, so the side is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub symbol: String,
    pub side: PositionSide,
}

/// One open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub trade_mode: TradeMode,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl Position {
    /// Builds a position, clamping `update_time` so it never precedes
    /// `create_time`. Some exchanges report a stale update timestamp; the
    /// record is corrected, never rejected.
    pub fn new(
        symbol: impl Into<String>,
        side: PositionSide,
        quantity: Decimal,
        average_price: Decimal,
        unrealized_pnl: Decimal,
        trade_mode: TradeMode,
        create_time: DateTime<Utc>,
        update_time: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            average_price,
            unrealized_pnl,
            trade_mode,
            create_time,
            update_time: update_time.max(create_time),
        }
    }

    pub fn key(&self) -> PositionKey {
        PositionKey {
            symbol: self.symbol.clone(),
            side: self.side,
        }
    }
}

/// One closed trade with realized PnL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    /// Globally unique within the exchange; re-delivery of the same id
    /// overwrites the previous record.
    pub order_id: String,
    pub closed_pnl: Decimal,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl ClosedTrade {
    /// Builds a closed trade with the same timestamp clamp as [`Position::new`].
    pub fn new(
        symbol: impl Into<String>,
        order_id: impl Into<String>,
        closed_pnl: Decimal,
        create_time: DateTime<Utc>,
        update_time: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            order_id: order_id.into(),
            closed_pnl,
            create_time,
            update_time: update_time.max(create_time),
        }
    }
}

/// Realized PnL summed over one UTC calendar date.
///
/// Derived on query from the closed-trade set; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPnl {
    pub date: NaiveDate,
    pub pnl: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn position_clamps_update_time_to_create_time() {
        let position = Position::new(
            "BTCUSDT",
            PositionSide::Buy,
            dec!(1),
            dec!(50000),
            dec!(0),
            TradeMode::CrossMargin,
            ts(2_000),
            ts(1_000),
        );
        assert_eq!(position.update_time, position.create_time);
    }

    #[test]
    fn position_keeps_later_update_time() {
        let position = Position::new(
            "BTCUSDT",
            PositionSide::Sell,
            dec!(2),
            dec!(50000),
            dec!(-1.5),
            TradeMode::Isolated,
            ts(1_000),
            ts(3_000),
        );
        assert_eq!(position.update_time, ts(3_000));
    }

    #[test]
    fn closed_trade_clamps_update_time_to_create_time() {
        let trade = ClosedTrade::new("ETHUSDT", "42_Trade", dec!(10), ts(500), ts(100));
        assert_eq!(trade.update_time, trade.create_time);
    }

    #[test]
    fn hedge_mode_sides_have_distinct_keys() {
        let long = Position::new(
            "BTCUSDT",
            PositionSide::Buy,
            dec!(1),
            dec!(50000),
            dec!(0),
            TradeMode::CrossMargin,
            ts(0),
            ts(0),
        );
        let short = Position {
            side: PositionSide::Sell,
            ..long.clone()
        };
        assert_ne!(long.key(), short.key());
    }
}
