//! Quoting configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sxmm_core::{Size, Symbol};

/// Spread and price formatting parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteConfig {
    /// Distance of each side from the mark price, in basis points.
    #[serde(default = "default_spread_bps")]
    pub spread_bps: Decimal,

    /// Upper bound (exclusive) on `spread_bps`, checked at startup.
    #[serde(default = "default_max_spread_bps")]
    pub max_spread_bps: Decimal,

    /// Mark prices below this use `low_price_decimals`, at or above it
    /// `high_price_decimals`. Approximates tick size; not exchange metadata.
    #[serde(default = "default_precision_threshold")]
    pub precision_threshold: Decimal,

    #[serde(default = "default_low_price_decimals")]
    pub low_price_decimals: u32,

    #[serde(default = "default_high_price_decimals")]
    pub high_price_decimals: u32,
}

fn default_spread_bps() -> Decimal {
    dec!(8)
}

fn default_max_spread_bps() -> Decimal {
    dec!(10)
}

fn default_precision_threshold() -> Decimal {
    dec!(100)
}

fn default_low_price_decimals() -> u32 {
    4
}

fn default_high_price_decimals() -> u32 {
    2
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            spread_bps: default_spread_bps(),
            max_spread_bps: default_max_spread_bps(),
            precision_threshold: default_precision_threshold(),
            low_price_decimals: default_low_price_decimals(),
            high_price_decimals: default_high_price_decimals(),
        }
    }
}

/// Everything one tick needs besides the gateway and credentials.
/// Fixed for the lifetime of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSettings {
    pub symbol: Symbol,
    pub order_size: Size,
    pub quote: QuoteConfig,
}
