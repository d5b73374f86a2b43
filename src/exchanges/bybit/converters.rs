use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::core::types::{Balance, ClosedTrade, Position, PositionSide, TradeMode};
use crate::exchanges::bybit::types::{BybitClosedPnl, BybitCoinBalance, BybitPosition};

fn parse_decimal(value: &str) -> Option<Decimal> {
    if value.is_empty() {
        return None;
    }
    value.parse().ok()
}

fn parse_millis(value: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = value.parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

fn side_from_wire(value: &str) -> PositionSide {
    match value {
        "Buy" => PositionSide::Buy,
        "Sell" => PositionSide::Sell,
        _ => PositionSide::None,
    }
}

fn trade_mode_from_wire(value: i32) -> TradeMode {
    // 0 = cross margin, 1 = isolated.
    if value == 1 {
        TradeMode::Isolated
    } else {
        TradeMode::CrossMargin
    }
}

pub fn balance_from_coin(coin: &BybitCoinBalance) -> Balance {
    Balance {
        equity: parse_decimal(&coin.equity),
        wallet_balance: parse_decimal(&coin.wallet_balance),
        unrealized_pnl: parse_decimal(&coin.unrealised_pnl),
        realized_pnl: parse_decimal(&coin.cum_realised_pnl),
    }
}

/// Maps one wire position to the canonical model. Returns `None` when a
/// required field is missing or unparseable; the caller skips the record.
pub fn position_from_wire(wire: &BybitPosition) -> Option<Position> {
    let quantity = parse_decimal(&wire.size)?;
    let average_price = parse_decimal(&wire.avg_price)?;
    let create_time = parse_millis(&wire.created_time)?;
    let update_time = parse_millis(&wire.updated_time).unwrap_or(create_time);

    Some(Position::new(
        wire.symbol.clone(),
        side_from_wire(&wire.side),
        quantity,
        average_price,
        parse_decimal(&wire.unrealised_pnl).unwrap_or_default(),
        trade_mode_from_wire(wire.trade_mode),
        create_time,
        update_time,
    ))
}

/// Maps one closed-PnL record. The order id alone is not unique across
/// execution types, so the exec type is folded into the identity.
pub fn closed_trade_from_wire(wire: &BybitClosedPnl) -> Option<ClosedTrade> {
    if wire.order_id.is_empty() {
        return None;
    }
    let closed_pnl = parse_decimal(&wire.closed_pnl)?;
    let create_time = parse_millis(&wire.created_time)?;
    let update_time = parse_millis(&wire.updated_time).unwrap_or(create_time);

    Some(ClosedTrade::new(
        wire.symbol.clone(),
        format!("{}_{}", wire.order_id, wire.exec_type),
        closed_pnl,
        create_time,
        update_time,
    ))
}
