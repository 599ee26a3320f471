//! Core domain types for the StandX market-making bot.
//!
//! This crate provides the data model shared by every other crate:
//! - `Symbol`: normalized perpetual symbol (e.g. `BTC-USD`)
//! - `Price`, `Size`: precision-safe numeric types
//! - `OrderSide`, `OrderType`, `TimeInForce`: trading enums
//! - `MarketSnapshot`, `Quote`, `QuotePair`, `OrderRecord`, `Position`, `OrderRequest`
//! - `AccountBalance`: raw balance view for the connection check

pub mod decimal;
pub mod error;
pub mod order;
pub mod types;

pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use order::{ClientOrderId, OrderId, OrderSide, OrderType, TimeInForce};
pub use types::{
    AccountBalance, MarketSnapshot, OrderRecord, OrderRequest, Position, Quote, QuotePair, QuoteSide, Symbol,
};
