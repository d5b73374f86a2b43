use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::core::types::{Balance, ClosedTrade, Position, PositionSide, TradeMode};
use crate::exchanges::binance::types::{BinanceBalance, BinanceIncome, BinancePositionRisk};

/// Income types that contribute to closed-trade PnL.
pub const PNL_INCOME_TYPES: [&str; 3] = ["REALIZED_PNL", "FUNDING_FEE", "COMMISSION"];

fn parse_decimal(value: &str) -> Option<Decimal> {
    if value.is_empty() {
        return None;
    }
    value.parse().ok()
}

fn parse_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

pub fn balance_from_wire(wire: &BinanceBalance) -> Balance {
    let wallet = parse_decimal(&wire.cross_wallet_balance);
    let unrealized = parse_decimal(&wire.cross_un_pnl);
    Balance {
        equity: match (wallet, unrealized) {
            (Some(w), Some(u)) => Some(w - u),
            _ => wallet,
        },
        wallet_balance: wallet,
        unrealized_pnl: unrealized,
        realized_pnl: Some(Decimal::ZERO),
    }
}

/// Maps one position-risk record. `positionAmt` is signed on the wire; the
/// canonical quantity is its magnitude. Flat entries (quantity zero) are
/// mapped, not rejected; the caller filters them without logging.
pub fn position_from_wire(wire: &BinancePositionRisk) -> Option<Position> {
    let amount = parse_decimal(&wire.position_amt)?;
    let quantity = amount.abs();
    let entry_price = parse_decimal(&wire.entry_price)?;
    let update_time = parse_millis(wire.update_time)?;

    let side = match wire.position_side.as_str() {
        "LONG" => PositionSide::Buy,
        "SHORT" => PositionSide::Sell,
        _ => PositionSide::None,
    };
    let trade_mode = if wire.margin_type.eq_ignore_ascii_case("isolated") {
        TradeMode::Isolated
    } else {
        TradeMode::CrossMargin
    };

    // positionRisk carries no creation timestamp; both times are the
    // update time, matching what the exchange can actually tell us.
    Some(Position::new(
        wire.symbol.clone(),
        side,
        quantity,
        entry_price,
        parse_decimal(&wire.unrealized_profit).unwrap_or_default(),
        trade_mode,
        update_time,
        update_time,
    ))
}

/// Maps one income record to a closed trade. Records missing a symbol or
/// income type, or of an income type that is not PnL-relevant, map to
/// `None`.
pub fn closed_trade_from_income(wire: &BinanceIncome) -> Option<ClosedTrade> {
    let symbol = wire.symbol.as_deref().filter(|s| !s.is_empty())?;
    let income_type = wire.income_type.as_deref()?;
    if !PNL_INCOME_TYPES.contains(&income_type) {
        return None;
    }
    let closed_pnl = parse_decimal(&wire.income)?;
    let time = parse_millis(wire.time)?;

    Some(ClosedTrade::new(
        symbol,
        format!("{}_{}", wire.tran_id, income_type),
        closed_pnl,
        time,
        time,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn balance_equity_is_wallet_minus_unrealized() {
        let wire = BinanceBalance {
            asset: "USDT".to_string(),
            cross_wallet_balance: "1000".to_string(),
            cross_un_pnl: "25".to_string(),
        };
        let balance = balance_from_wire(&wire);
        assert_eq!(balance.equity, Some(dec!(975)));
        assert_eq!(balance.wallet_balance, Some(dec!(1000)));
        assert_eq!(balance.realized_pnl, Some(Decimal::ZERO));
    }

    #[test]
    fn short_position_maps_to_positive_quantity() {
        let wire = BinancePositionRisk {
            symbol: "BTCUSDT".to_string(),
            position_amt: "-0.5".to_string(),
            entry_price: "64000".to_string(),
            unrealized_profit: "10".to_string(),
            margin_type: "cross".to_string(),
            position_side: "SHORT".to_string(),
            update_time: 1_700_000_000_000,
        };
        let position = position_from_wire(&wire).unwrap();
        assert_eq!(position.quantity, dec!(0.5));
        assert_eq!(position.side, PositionSide::Sell);
        assert_eq!(position.trade_mode, TradeMode::CrossMargin);
    }

    #[test]
    fn flat_position_maps_with_zero_quantity() {
        let wire = BinancePositionRisk {
            symbol: "BTCUSDT".to_string(),
            position_amt: "0".to_string(),
            entry_price: "0".to_string(),
            unrealized_profit: "0".to_string(),
            margin_type: "cross".to_string(),
            position_side: "BOTH".to_string(),
            update_time: 1_700_000_000_000,
        };
        assert_eq!(position_from_wire(&wire).unwrap().quantity, Decimal::ZERO);
    }

    #[test]
    fn one_way_mode_maps_to_side_none() {
        let wire = BinancePositionRisk {
            symbol: "BTCUSDT".to_string(),
            position_amt: "1.5".to_string(),
            entry_price: "64000".to_string(),
            unrealized_profit: "0".to_string(),
            margin_type: "isolated".to_string(),
            position_side: "BOTH".to_string(),
            update_time: 1_700_000_000_000,
        };
        let position = position_from_wire(&wire).unwrap();
        assert_eq!(position.side, PositionSide::None);
        assert_eq!(position.trade_mode, TradeMode::Isolated);
    }

    #[test]
    fn realized_pnl_income_maps_to_trade() {
        let wire = BinanceIncome {
            symbol: Some("ETHUSDT".to_string()),
            income_type: Some("REALIZED_PNL".to_string()),
            income: "12.34".to_string(),
            time: 1_700_000_000_000,
            tran_id: 987,
        };
        let trade = closed_trade_from_income(&wire).unwrap();
        assert_eq!(trade.order_id, "987_REALIZED_PNL");
        assert_eq!(trade.closed_pnl, dec!(12.34));
    }

    #[test]
    fn non_pnl_income_is_filtered() {
        let wire = BinanceIncome {
            symbol: Some("ETHUSDT".to_string()),
            income_type: Some("TRANSFER".to_string()),
            income: "500".to_string(),
            time: 1_700_000_000_000,
            tran_id: 988,
        };
        assert!(closed_trade_from_income(&wire).is_none());
    }

    #[test]
    fn income_without_symbol_is_skipped() {
        let wire = BinanceIncome {
            symbol: None,
            income_type: Some("REALIZED_PNL".to_string()),
            income: "1".to_string(),
            time: 1_700_000_000_000,
            tran_id: 989,
        };
        assert!(closed_trade_from_income(&wire).is_none());
    }
}
