//! Quoting error types.

use rust_decimal::Decimal;
use sxmm_core::QuoteSide;
use sxmm_gateway::GatewayError;
use thiserror::Error;

/// Quote derivation rejected its input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuoteError {
    #[error("Invalid mark price: {0}")]
    InvalidPrice(String),

    /// Rounding to the quote precision pushed a side to or past the ceiling.
    #[error("{side} {price} is {bps} bps from mark, ceiling is {max_bps} bps")]
    SpreadCeiling {
        side: QuoteSide,
        price: String,
        bps: Decimal,
        max_bps: Decimal,
    },
}

/// Errors that abort a whole tick.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Mark price unavailable for {symbol}: {source}")]
    PriceUnavailable {
        symbol: String,
        #[source]
        source: GatewayError,
    },

    #[error("Cannot quote: {0}")]
    InvalidQuote(#[from] QuoteError),
}
