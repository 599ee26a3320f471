//! Quote price calculation.
//!
//! Bid and ask sit a fixed number of basis points either side of the mark
//! price:
//!
//! ```text
//! factor = spread_bps / 10000
//! bid    = mark * (1 - factor)
//! ask    = mark * (1 + factor)
//! ```
//!
//! Both prices are formatted with a precision picked from the mark price
//! magnitude (see `precision_for`). After rounding, each side must still be
//! strictly inside `max_spread_bps` of the mark.

use rust_decimal::Decimal;
use sxmm_core::decimal::BPS_PER_UNIT;
use sxmm_core::{MarketSnapshot, Price, Quote, QuotePair, QuoteSide};

use crate::config::QuoteConfig;
use crate::error::QuoteError;

/// Fractional digits used to format quotes for `mark_price`.
///
/// Below `precision_threshold` uses `low_price_decimals`; the threshold
/// itself and above use `high_price_decimals`.
pub fn precision_for(mark_price: Price, config: &QuoteConfig) -> u32 {
    if mark_price.inner() < config.precision_threshold {
        config.low_price_decimals
    } else {
        config.high_price_decimals
    }
}

/// Derive the bid/ask pair for a snapshot.
///
/// # Errors
/// - `QuoteError::InvalidPrice` when the mark price is zero or negative.
/// - `QuoteError::SpreadCeiling` when a rounded side lands at or beyond
///   `max_spread_bps` from the mark (coarse precision on a low price).
pub fn compute_quotes(
    snapshot: &MarketSnapshot,
    config: &QuoteConfig,
) -> Result<QuotePair, QuoteError> {
    let mark = snapshot.mark_price;
    if !mark.is_positive() {
        return Err(QuoteError::InvalidPrice(mark.to_string()));
    }

    let factor = config.spread_bps / BPS_PER_UNIT;
    let precision = precision_for(mark, config);

    let quote = |side: QuoteSide, raw: Price| -> Result<Quote, QuoteError> {
        let price = raw.round_to(precision);
        let bps = price.bps_from(mark).unwrap_or_default().abs();
        if bps >= config.max_spread_bps {
            return Err(QuoteError::SpreadCeiling {
                side,
                price: price.to_fixed(precision),
                bps: bps.round_dp(2),
                max_bps: config.max_spread_bps,
            });
        }
        Ok(Quote {
            symbol: snapshot.symbol.clone(),
            side,
            price: price.to_fixed(precision),
            precision,
        })
    };

    Ok(QuotePair {
        mark_price: mark,
        bid: quote(QuoteSide::Bid, mark * (Decimal::ONE - factor))?,
        ask: quote(QuoteSide::Ask, mark * (Decimal::ONE + factor))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sxmm_core::Symbol;

    fn snapshot(symbol: &str, mark: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            symbol: Symbol::normalize(symbol).unwrap(),
            mark_price: Price::new(mark),
        }
    }

    #[test]
    fn test_btc_scenario_two_decimals() {
        let pair = compute_quotes(&snapshot("BTC", dec!(30000)), &QuoteConfig::default()).unwrap();
        assert_eq!(pair.bid.price, "29976.00");
        assert_eq!(pair.ask.price, "30024.00");
        assert_eq!(pair.bid.precision, 2);
        assert_eq!(pair.bid.side, QuoteSide::Bid);
        assert_eq!(pair.ask.side, QuoteSide::Ask);
        assert_eq!(pair.bid.symbol.as_str(), "BTC-USD");
    }

    #[test]
    fn test_low_price_scenario_four_decimals() {
        let pair = compute_quotes(&snapshot("DOGE", dec!(0.95)), &QuoteConfig::default()).unwrap();
        assert_eq!(pair.bid.price, "0.9492");
        assert_eq!(pair.ask.price, "0.9508");
        assert_eq!(pair.ask.precision, 4);
    }

    #[test]
    fn test_precision_boundary() {
        let config = QuoteConfig::default();
        assert_eq!(precision_for(Price::new(dec!(99.9999)), &config), 4);
        assert_eq!(precision_for(Price::new(dec!(100.0)), &config), 2);
        assert_eq!(precision_for(Price::new(dec!(100)), &config), 2);
    }

    #[test]
    fn test_configurable_threshold() {
        let config = QuoteConfig {
            precision_threshold: dec!(1),
            low_price_decimals: 6,
            high_price_decimals: 3,
            ..QuoteConfig::default()
        };
        let pair = compute_quotes(&snapshot("ETH", dec!(2000)), &config).unwrap();
        assert_eq!(pair.bid.price, "1998.400");
        assert_eq!(precision_for(Price::new(dec!(0.5)), &config), 6);
    }

    #[test]
    fn test_rejects_non_positive_mark() {
        let config = QuoteConfig::default();
        assert!(matches!(
            compute_quotes(&snapshot("BTC", Decimal::ZERO), &config),
            Err(QuoteError::InvalidPrice(_))
        ));
        assert!(matches!(
            compute_quotes(&snapshot("BTC", dec!(-5)), &config),
            Err(QuoteError::InvalidPrice(_))
        ));
    }

    #[test]
    fn test_rounding_past_ceiling_is_rejected() {
        // 4 decimals on a 0.01234 mark moves the bid to 0.0123, ~32 bps away.
        let err = compute_quotes(&snapshot("PEPE", dec!(0.01234)), &QuoteConfig::default())
            .unwrap_err();
        match err {
            QuoteError::SpreadCeiling {
                side, price, bps, max_bps,
            } => {
                assert_eq!(side, QuoteSide::Bid);
                assert_eq!(price, "0.0123");
                assert!(bps > dec!(30));
                assert_eq!(max_bps, dec!(10));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let finer = QuoteConfig {
            low_price_decimals: 8,
            ..QuoteConfig::default()
        };
        let pair = compute_quotes(&snapshot("PEPE", dec!(0.01234)), &finer).unwrap();
        assert_eq!(pair.bid.price, "0.01233013");
    }

    #[test]
    fn test_spread_property_across_magnitudes() {
        let marks = [
            dec!(1.25),
            dec!(0.95),
            dec!(3.5),
            dec!(99.99),
            dec!(100),
            dec!(2500.5),
            dec!(30000),
            dec!(98765.43),
        ];
        for spread_bps in [dec!(1), dec!(5), dec!(8), dec!(9.5)] {
            let config = QuoteConfig {
                spread_bps,
                ..QuoteConfig::default()
            };
            for mark in marks {
                let pair = compute_quotes(&snapshot("BTC", mark), &config).unwrap();
                let bid: Decimal = pair.bid.price.parse().unwrap();
                let ask: Decimal = pair.ask.price.parse().unwrap();
                assert!(bid < mark, "bid {bid} >= mark {mark}");
                assert!(ask > mark, "ask {ask} <= mark {mark}");

                // Rounding to the quote precision moves each side by at most
                // half a unit in the last place.
                let unit = Decimal::new(1, pair.bid.precision);
                let expected = mark * spread_bps * dec!(2) / BPS_PER_UNIT;
                assert!(
                    ((ask - bid) - expected).abs() <= unit,
                    "mark {mark} spread {spread_bps}: width {} vs {expected}",
                    ask - bid
                );
            }
        }
    }
}
