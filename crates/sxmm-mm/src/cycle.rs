//! One quoting tick.
//!
//! Steps, in order:
//! 1. Fetch the mark price. Failure aborts the tick (`CycleError`).
//! 2. Compute the bid/ask pair.
//! 3. Cancel every resting order on the symbol.
//! 4. Flatten any residual position.
//! 5. Place a GTC buy at the bid, then a GTC sell at the ask.
//!
//! Steps 3 to 5 never fail the tick: each yields an outcome value that ends
//! up in the `CycleReport`, and a failure in one does not skip the others.

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::prelude::ToPrimitive;
use sxmm_core::{OrderRequest, Price, QuotePair, QuoteSide, Symbol};
use sxmm_gateway::{AuthContext, ExchangeGateway};
use sxmm_telemetry::Metrics;
use tracing::{error, info};

use crate::config::CycleSettings;
use crate::error::CycleError;
use crate::inventory::{FlattenOutcome, InventoryGuard};
use crate::quote_engine::compute_quotes;
use crate::reconciler::{CancelReport, OrderReconciler};

/// Result of placing one side of the quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementOutcome {
    Accepted {
        side: QuoteSide,
        price: String,
        request_id: Option<String>,
    },
    Rejected {
        side: QuoteSide,
        price: String,
        error: String,
    },
}

impl PlacementOutcome {
    pub fn side(&self) -> QuoteSide {
        match self {
            Self::Accepted { side, .. } | Self::Rejected { side, .. } => *side,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Everything one completed tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub quotes: QuotePair,
    pub cancel: CancelReport,
    pub flatten: FlattenOutcome,
    /// Bid first, then ask.
    pub placements: Vec<PlacementOutcome>,
}

impl CycleReport {
    pub fn mark_price(&self) -> Price {
        self.quotes.mark_price
    }

    /// True when no isolated step reported a failure.
    pub fn is_clean(&self) -> bool {
        self.cancel.is_complete()
            && !matches!(
                self.flatten,
                FlattenOutcome::Failed { .. } | FlattenOutcome::QueryFailed { .. }
            )
            && self.placements.iter().all(PlacementOutcome::is_accepted)
    }
}

/// Runs ticks against one gateway with one set of credentials.
pub struct QuotingCycle<G: ?Sized> {
    gateway: Arc<G>,
    auth: Arc<AuthContext>,
    settings: Arc<CycleSettings>,
    reconciler: OrderReconciler<G>,
    guard: InventoryGuard<G>,
}

impl<G: ?Sized> Clone for QuotingCycle<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            auth: Arc::clone(&self.auth),
            settings: Arc::clone(&self.settings),
            reconciler: self.reconciler.clone(),
            guard: self.guard.clone(),
        }
    }
}

impl<G: ExchangeGateway + ?Sized> QuotingCycle<G> {
    pub fn new(gateway: Arc<G>, auth: Arc<AuthContext>, settings: CycleSettings) -> Self {
        Self {
            reconciler: OrderReconciler::new(Arc::clone(&gateway), Arc::clone(&auth)),
            guard: InventoryGuard::new(Arc::clone(&gateway), Arc::clone(&auth)),
            gateway,
            auth,
            settings: Arc::new(settings),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.settings.symbol
    }

    /// Reconciler sharing this cycle's gateway and credentials.
    pub fn reconciler(&self) -> &OrderReconciler<G> {
        &self.reconciler
    }

    /// Run one tick.
    ///
    /// # Errors
    /// Only when no usable mark price could be obtained.
    pub async fn run_once(&self) -> Result<CycleReport, CycleError> {
        let started = Instant::now();
        let result = self.run_steps().await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let outcome = match &result {
            Ok(report) if report.is_clean() => "ok",
            Ok(_) => "partial",
            Err(_) => "aborted",
        };
        Metrics::cycle_finished(outcome, elapsed_ms);
        result
    }

    async fn run_steps(&self) -> Result<CycleReport, CycleError> {
        let symbol = &self.settings.symbol;

        let snapshot = self
            .gateway
            .mark_price(symbol)
            .await
            .map_err(|source| CycleError::PriceUnavailable {
                symbol: symbol.to_string(),
                source,
            })?;
        if let Some(mark) = snapshot.mark_price.inner().to_f64() {
            Metrics::mark_price(symbol.as_str(), mark);
        }

        let quotes = compute_quotes(&snapshot, &self.settings.quote)?;
        info!(
            %symbol,
            mark_price = %quotes.mark_price,
            bid = %quotes.bid.price,
            ask = %quotes.ask.price,
            "Quotes computed"
        );

        let cancel = self.reconciler.cancel_all(symbol).await;
        let flatten = self.guard.flatten_if_needed(symbol).await;

        let mut placements = Vec::with_capacity(2);
        for quote in quotes.sides() {
            let request = OrderRequest::resting_limit(quote, self.settings.order_size);
            let side = request.side;
            let outcome = match self.gateway.place_order(&self.auth, &request).await {
                Ok(ack) => {
                    info!(
                        %symbol,
                        %side,
                        price = %quote.price,
                        qty = %request.qty,
                        cl_ord_id = %request.cl_ord_id,
                        "Order placed"
                    );
                    Metrics::order_placed(side.as_str(), "accepted");
                    PlacementOutcome::Accepted {
                        side: quote.side,
                        price: quote.price.clone(),
                        request_id: ack.request_id,
                    }
                }
                Err(e) => {
                    error!(
                        %symbol,
                        %side,
                        price = %quote.price,
                        error = %e,
                        "Order placement failed"
                    );
                    Metrics::order_placed(side.as_str(), "rejected");
                    PlacementOutcome::Rejected {
                        side: quote.side,
                        price: quote.price.clone(),
                        error: e.to_string(),
                    }
                }
            };
            placements.push(outcome);
        }

        Ok(CycleReport {
            quotes,
            cancel,
            flatten,
            placements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuoteConfig;
    use crate::reconciler::CancelMode;
    use rust_decimal_macros::dec;
    use sxmm_core::{OrderSide, OrderType, Position, Size, TimeInForce};
    use sxmm_gateway::{GatewayCall, MockGateway, RequestSigner};

    fn setup(mark: rust_decimal::Decimal) -> (Arc<MockGateway>, QuotingCycle<MockGateway>) {
        let gateway = Arc::new(MockGateway::new(Price::new(mark)));
        let auth = Arc::new(AuthContext::new(
            "token",
            RequestSigner::from_bytes(&[3u8; 32]),
            "test",
        ));
        let settings = CycleSettings {
            symbol: Symbol::normalize("BTC").unwrap(),
            order_size: Size::new(dec!(0.0015)),
            quote: QuoteConfig::default(),
        };
        let cycle = QuotingCycle::new(Arc::clone(&gateway), auth, settings);
        (gateway, cycle)
    }

    #[tokio::test]
    async fn test_tick_places_bid_and_ask() {
        let (gateway, cycle) = setup(dec!(30000));

        let report = cycle.run_once().await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.mark_price(), Price::new(dec!(30000)));
        let placed = gateway.placed_orders();
        assert_eq!(placed.len(), 2);

        assert_eq!(placed[0].side, OrderSide::Buy);
        assert_eq!(placed[0].price.as_deref(), Some("29976.00"));
        assert_eq!(placed[1].side, OrderSide::Sell);
        assert_eq!(placed[1].price.as_deref(), Some("30024.00"));
        for order in &placed {
            assert_eq!(order.order_type, OrderType::Limit);
            assert_eq!(order.time_in_force, TimeInForce::GoodTilCancelled);
            assert!(!order.reduce_only);
            assert_eq!(order.qty, Size::new(dec!(0.0015)));
        }
    }

    #[tokio::test]
    async fn test_step_order() {
        let (gateway, cycle) = setup(dec!(30000));
        let symbol = cycle.symbol().clone();
        gateway.add_resting_order(&symbol, OrderSide::Buy, Price::new(dec!(29000)));
        gateway.set_positions(vec![Position {
            symbol: symbol.clone(),
            qty: Size::new(dec!(0.002)),
        }]);

        cycle.run_once().await.unwrap();

        let kinds: Vec<&str> = gateway
            .calls()
            .iter()
            .map(|c| match c {
                GatewayCall::MarkPrice(_) => "price",
                GatewayCall::OpenOrders(_) => "open_orders",
                GatewayCall::Cancel(_) => "cancel",
                GatewayCall::Positions(_) => "positions",
                GatewayCall::Place(req) if req.reduce_only => "flatten",
                GatewayCall::Place(_) => "place",
                GatewayCall::Balance => "balance",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["price", "open_orders", "cancel", "positions", "flatten", "place", "place"]
        );
    }

    #[tokio::test]
    async fn test_second_tick_replaces_first_ticks_orders() {
        let (gateway, cycle) = setup(dec!(30000));

        cycle.run_once().await.unwrap();
        gateway.set_mark_price(Some(Price::new(dec!(31000))));
        let report = cycle.run_once().await.unwrap();

        assert_eq!(report.cancel.cancelled, 2);
        let resting: Vec<String> = gateway
            .resting_orders()
            .into_iter()
            .filter_map(|o| o.price.map(|p| p.to_fixed(2)))
            .collect();
        assert_eq!(resting, vec!["30975.20", "31024.80"]);
    }

    #[tokio::test]
    async fn test_price_failure_aborts_tick() {
        let (gateway, cycle) = setup(dec!(30000));
        gateway.fail_next_prices(1);

        let err = cycle.run_once().await.unwrap_err();

        assert!(matches!(err, CycleError::PriceUnavailable { .. }));
        assert_eq!(gateway.calls().len(), 1);
        assert!(gateway.placed_orders().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_mark_aborts_tick() {
        let (gateway, cycle) = setup(dec!(0));

        let err = cycle.run_once().await.unwrap_err();

        assert!(matches!(err, CycleError::InvalidQuote(_)));
        assert!(gateway.placed_orders().is_empty());
        assert!(gateway.cancel_requests().is_empty());
    }

    #[tokio::test]
    async fn test_isolated_failures_do_not_stop_later_steps() {
        let (gateway, cycle) = setup(dec!(30000));
        let symbol = cycle.symbol().clone();
        gateway.set_fail_open_orders(true);
        gateway.set_fail_positions(true);

        let report = cycle.run_once().await.unwrap();

        assert_eq!(report.cancel.mode, CancelMode::ListFailed);
        assert!(matches!(report.flatten, FlattenOutcome::QueryFailed { .. }));
        assert_eq!(report.placements.len(), 2);
        assert!(report.placements.iter().all(PlacementOutcome::is_accepted));
        assert!(!report.is_clean());
        assert_eq!(
            gateway
                .resting_orders()
                .iter()
                .filter(|o| o.symbol == symbol)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_bid_rejection_still_places_ask() {
        let (gateway, cycle) = setup(dec!(30000));
        gateway.fail_placement_side(OrderSide::Buy);

        let report = cycle.run_once().await.unwrap();

        assert!(!report.placements[0].is_accepted());
        assert_eq!(report.placements[0].side(), QuoteSide::Bid);
        assert!(report.placements[1].is_accepted());
        assert_eq!(gateway.placed_orders().len(), 2);
        assert_eq!(gateway.resting_orders().len(), 1);
        assert_eq!(gateway.resting_orders()[0].side, OrderSide::Sell);
    }

    #[tokio::test]
    async fn test_flatten_failure_still_places_quotes() {
        let (gateway, cycle) = setup(dec!(30000));
        let symbol = cycle.symbol().clone();
        gateway.set_positions(vec![Position {
            symbol,
            qty: Size::new(dec!(-0.01)),
        }]);
        gateway.set_fail_reduce_only(true);

        let report = cycle.run_once().await.unwrap();

        assert!(matches!(
            report.flatten,
            FlattenOutcome::Failed {
                side: OrderSide::Buy,
                ..
            }
        ));
        assert_eq!(report.placements.iter().filter(|p| p.is_accepted()).count(), 2);
    }
}
