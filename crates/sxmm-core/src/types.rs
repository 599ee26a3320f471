//! Market, order and position types.
//!
//! Everything here is an ephemeral view of exchange state: snapshots,
//! open orders and positions are fetched fresh every cycle and never
//! cached across ticks.

use crate::decimal::{Price, Size};
use crate::error::{CoreError, Result};
use crate::order::{ClientOrderId, OrderId, OrderSide, OrderType, TimeInForce};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quote currency suffix used by StandX perpetual symbols.
const QUOTE_SUFFIX: &str = "-USD";

/// Perpetual symbol (e.g. `BTC-USD`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Normalize user input into an exchange symbol.
    ///
    /// Upper-cases the input and appends `-USD` when missing, so
    /// `btc` and `BTC-USD` both resolve to `BTC-USD`.
    pub fn normalize(raw: &str) -> Result<Self> {
        let upper = raw.trim().to_uppercase();
        if upper.is_empty() {
            return Err(CoreError::InvalidSymbol("empty symbol".to_string()));
        }
        if upper.ends_with(QUOTE_SUFFIX) {
            if upper.len() == QUOTE_SUFFIX.len() {
                return Err(CoreError::InvalidSymbol(raw.to_string()));
            }
            Ok(Self(upper))
        } else {
            Ok(Self(format!("{upper}{QUOTE_SUFFIX}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference price for one symbol, fetched once per cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSnapshot {
    pub symbol: Symbol,
    pub mark_price: Price,
}

/// Side of a two-sided quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteSide {
    Bid,
    Ask,
}

impl QuoteSide {
    /// Order side that rests on this side of the book.
    pub fn order_side(&self) -> OrderSide {
        match self {
            Self::Bid => OrderSide::Buy,
            Self::Ask => OrderSide::Sell,
        }
    }
}

impl fmt::Display for QuoteSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bid => write!(f, "bid"),
            Self::Ask => write!(f, "ask"),
        }
    }
}

/// One side of a derived quote. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub symbol: Symbol,
    pub side: QuoteSide,
    /// Price formatted with `precision` fractional digits.
    pub price: String,
    pub precision: u32,
}

/// Bid/ask pair derived from one mark price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotePair {
    pub mark_price: Price,
    pub bid: Quote,
    pub ask: Quote,
}

impl QuotePair {
    /// Both sides, bid first.
    pub fn sides(&self) -> [&Quote; 2] {
        [&self.bid, &self.ask]
    }
}

/// Resting order as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: OrderSide,
    #[serde(default)]
    pub price: Option<Price>,
    pub qty: Size,
    #[serde(default)]
    pub status: String,
}

/// Net position for one symbol. Positive qty = long, negative = short.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub qty: Size,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.qty.is_zero()
    }
}

/// Account balance as reported by the exchange.
///
/// Only shown to the operator, so the exchange's layout is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountBalance(serde_json::Value);

impl AccountBalance {
    pub fn new(raw: serde_json::Value) -> Self {
        Self(raw)
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

impl fmt::Display for AccountBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order placement request, transport-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub qty: Size,
    /// Limit price as sent on the wire; `None` for market orders.
    pub price: Option<String>,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub cl_ord_id: ClientOrderId,
}

impl OrderRequest {
    /// Resting GTC limit order at the quoted price.
    pub fn resting_limit(quote: &Quote, qty: Size) -> Self {
        Self {
            symbol: quote.symbol.clone(),
            side: quote.side.order_side(),
            order_type: OrderType::Limit,
            qty,
            price: Some(quote.price.clone()),
            time_in_force: TimeInForce::GoodTilCancelled,
            reduce_only: false,
            cl_ord_id: ClientOrderId::new(),
        }
    }

    /// Reduce-only IOC market order.
    pub fn reduce_only_market(symbol: Symbol, side: OrderSide, qty: Size) -> Self {
        Self {
            symbol,
            side,
            order_type: OrderType::Market,
            qty,
            price: None,
            time_in_force: TimeInForce::ImmediateOrCancel,
            reduce_only: true,
            cl_ord_id: ClientOrderId::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_symbol_normalize() {
        assert_eq!(Symbol::normalize("btc").unwrap().as_str(), "BTC-USD");
        assert_eq!(Symbol::normalize("BTC-USD").unwrap().as_str(), "BTC-USD");
        assert_eq!(Symbol::normalize(" eth ").unwrap().as_str(), "ETH-USD");
        assert!(Symbol::normalize("").is_err());
        assert!(Symbol::normalize("-usd").is_err());
    }

    #[test]
    fn test_quote_side_maps_to_order_side() {
        assert_eq!(QuoteSide::Bid.order_side(), OrderSide::Buy);
        assert_eq!(QuoteSide::Ask.order_side(), OrderSide::Sell);
    }

    #[test]
    fn test_order_record_from_exchange_json() {
        let raw = r#"{
            "id": 1234,
            "symbol": "BTC-USD",
            "side": "buy",
            "price": "29976.00",
            "qty": "0.0015",
            "status": "open",
            "time_in_force": "gtc"
        }"#;
        let record: OrderRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.id.as_str(), "1234");
        assert_eq!(record.side, OrderSide::Buy);
        assert_eq!(record.price, Some(Price::new(dec!(29976.00))));
        assert_eq!(record.qty, Size::new(dec!(0.0015)));
    }

    #[test]
    fn test_account_balance_keeps_exchange_fields() {
        let raw = r#"{"balance": "1000.5", "upnl": "-2.1", "equity": "998.4"}"#;
        let balance: AccountBalance = serde_json::from_str(raw).unwrap();
        assert_eq!(balance.as_json()["equity"], "998.4");
        assert!(balance.to_string().contains("\"upnl\":\"-2.1\""));
    }

    #[test]
    fn test_position_flat() {
        let raw = r#"{"symbol": "BTC-USD", "qty": "-0.01", "entry_price": "0"}"#;
        let position: Position = serde_json::from_str(raw).unwrap();
        assert!(!position.is_flat());
        assert_eq!(position.qty, Size::new(dec!(-0.01)));
    }

    #[test]
    fn test_resting_limit_request() {
        let quote = Quote {
            symbol: Symbol::normalize("BTC").unwrap(),
            side: QuoteSide::Ask,
            price: "30024.00".to_string(),
            precision: 2,
        };
        let req = OrderRequest::resting_limit(&quote, Size::new(dec!(0.0015)));
        assert_eq!(req.side, OrderSide::Sell);
        assert_eq!(req.order_type, OrderType::Limit);
        assert_eq!(req.time_in_force, TimeInForce::GoodTilCancelled);
        assert!(!req.reduce_only);
        assert_eq!(req.price.as_deref(), Some("30024.00"));
    }

    #[test]
    fn test_reduce_only_market_request() {
        let req = OrderRequest::reduce_only_market(
            Symbol::normalize("BTC").unwrap(),
            OrderSide::Buy,
            Size::new(dec!(0.01)),
        );
        assert_eq!(req.order_type, OrderType::Market);
        assert_eq!(req.time_in_force, TimeInForce::ImmediateOrCancel);
        assert!(req.reduce_only);
        assert!(req.price.is_none());
    }
}
