//! Best-effort cancellation of every resting order for a symbol.
//!
//! 1. Query open orders.
//! 2. None: done, no cancel request is sent.
//! 3. One batch cancel with every id.
//! 4. Batch rejected: cancel each id on its own, collecting failures.
//!
//! `cancel_all` never returns an error. The report says how many orders were
//! cancelled; callers that need certainty must re-query open orders.

use std::fmt;
use std::sync::Arc;

use sxmm_core::{OrderId, Symbol};
use sxmm_gateway::{AuthContext, ExchangeGateway};
use sxmm_telemetry::Metrics;
use tracing::{debug, error, info, warn};

/// How the orders were (or were not) cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMode {
    /// Open orders could not be listed; nothing was attempted.
    ListFailed,
    /// No open orders.
    Nothing,
    /// One batch request cancelled everything.
    Batch,
    /// Batch was rejected; orders were cancelled one by one.
    Individual,
}

impl CancelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListFailed => "list_failed",
            Self::Nothing => "nothing",
            Self::Batch => "batch",
            Self::Individual => "individual",
        }
    }
}

impl fmt::Display for CancelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one cancel pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelReport {
    /// Open orders found.
    pub found: usize,
    /// Orders cancelled.
    pub cancelled: usize,
    /// Orders whose individual cancel failed, with the error text.
    pub failed: Vec<(OrderId, String)>,
    pub mode: CancelMode,
}

impl CancelReport {
    fn empty(mode: CancelMode) -> Self {
        Self {
            found: 0,
            cancelled: 0,
            failed: Vec::new(),
            mode,
        }
    }

    /// True when every listed order was cancelled.
    pub fn is_complete(&self) -> bool {
        self.mode != CancelMode::ListFailed && self.failed.is_empty()
    }
}

/// Cancels resting orders for the active account.
pub struct OrderReconciler<G: ?Sized> {
    gateway: Arc<G>,
    auth: Arc<AuthContext>,
}

impl<G: ?Sized> Clone for OrderReconciler<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            auth: Arc::clone(&self.auth),
        }
    }
}

impl<G: ExchangeGateway + ?Sized> OrderReconciler<G> {
    pub fn new(gateway: Arc<G>, auth: Arc<AuthContext>) -> Self {
        Self { gateway, auth }
    }

    /// Cancel every open order for `symbol`.
    pub async fn cancel_all(&self, symbol: &Symbol) -> CancelReport {
        let orders = match self.gateway.open_orders(&self.auth, symbol).await {
            Ok(orders) => orders,
            Err(e) => {
                error!(%symbol, step = "cancel_all", error = %e, "Failed to list open orders");
                return CancelReport::empty(CancelMode::ListFailed);
            }
        };

        if orders.is_empty() {
            debug!(%symbol, "No open orders to cancel");
            return CancelReport::empty(CancelMode::Nothing);
        }

        let ids: Vec<OrderId> = orders.into_iter().map(|o| o.id).collect();
        let found = ids.len();

        match self.gateway.cancel_orders(&self.auth, &ids).await {
            Ok(()) => {
                info!(%symbol, count = found, "Cancelled open orders");
                Metrics::orders_cancelled(CancelMode::Batch.as_str(), found);
                return CancelReport {
                    found,
                    cancelled: found,
                    failed: Vec::new(),
                    mode: CancelMode::Batch,
                };
            }
            Err(e) => {
                warn!(
                    %symbol,
                    count = found,
                    error = %e,
                    "Batch cancel failed, cancelling orders individually"
                );
            }
        }

        let mut cancelled = 0;
        let mut failed = Vec::new();
        for id in ids {
            match self
                .gateway
                .cancel_orders(&self.auth, std::slice::from_ref(&id))
                .await
            {
                Ok(()) => cancelled += 1,
                Err(e) => {
                    error!(%symbol, order_id = %id, error = %e, "Failed to cancel order");
                    failed.push((id, e.to_string()));
                }
            }
        }

        Metrics::orders_cancelled(CancelMode::Individual.as_str(), cancelled);
        Metrics::cancel_failures(failed.len());
        info!(
            %symbol,
            count = cancelled,
            failed = failed.len(),
            "Cancelled open orders individually"
        );

        CancelReport {
            found,
            cancelled,
            failed,
            mode: CancelMode::Individual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sxmm_core::{OrderSide, Price};
    use sxmm_gateway::{MockGateway, RequestSigner};

    fn setup() -> (Arc<MockGateway>, OrderReconciler<MockGateway>, Symbol) {
        let gateway = Arc::new(MockGateway::new(Price::new(dec!(30000))));
        let auth = Arc::new(AuthContext::new(
            "token",
            RequestSigner::from_bytes(&[1u8; 32]),
            "test",
        ));
        let reconciler = OrderReconciler::new(Arc::clone(&gateway), auth);
        (gateway, reconciler, Symbol::normalize("BTC").unwrap())
    }

    #[tokio::test]
    async fn test_no_open_orders_sends_no_cancel() {
        let (gateway, reconciler, symbol) = setup();

        let report = reconciler.cancel_all(&symbol).await;

        assert_eq!(report.cancelled, 0);
        assert_eq!(report.mode, CancelMode::Nothing);
        assert!(gateway.cancel_requests().is_empty());
    }

    #[tokio::test]
    async fn test_batch_cancel_all() {
        let (gateway, reconciler, symbol) = setup();
        let a = gateway.add_resting_order(&symbol, OrderSide::Buy, Price::new(dec!(29976)));
        let b = gateway.add_resting_order(&symbol, OrderSide::Sell, Price::new(dec!(30024)));

        let report = reconciler.cancel_all(&symbol).await;

        assert_eq!(report.cancelled, 2);
        assert_eq!(report.mode, CancelMode::Batch);
        assert_eq!(gateway.cancel_requests(), vec![vec![a, b]]);
        assert!(gateway.resting_orders().is_empty());
    }

    #[tokio::test]
    async fn test_batch_failure_falls_back_to_individual() {
        let (gateway, reconciler, symbol) = setup();
        let a = gateway.add_resting_order(&symbol, OrderSide::Buy, Price::new(dec!(29976)));
        let b = gateway.add_resting_order(&symbol, OrderSide::Sell, Price::new(dec!(30024)));
        let c = gateway.add_resting_order(&symbol, OrderSide::Buy, Price::new(dec!(29970)));
        gateway.set_fail_batch_cancel(true);
        gateway.fail_cancel_of(b.clone());

        let report = reconciler.cancel_all(&symbol).await;

        assert_eq!(report.mode, CancelMode::Individual);
        assert_eq!(report.found, 3);
        assert_eq!(report.cancelled, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, b);
        assert!(!report.is_complete());

        let requests = gateway.cancel_requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(&requests[1..], &[vec![a], vec![b.clone()], vec![c]]);

        let remaining: Vec<OrderId> = gateway.resting_orders().into_iter().map(|o| o.id).collect();
        assert_eq!(remaining, vec![b]);
    }

    #[tokio::test]
    async fn test_list_failure_is_swallowed() {
        let (gateway, reconciler, symbol) = setup();
        gateway.add_resting_order(&symbol, OrderSide::Buy, Price::new(dec!(29976)));
        gateway.set_fail_open_orders(true);

        let report = reconciler.cancel_all(&symbol).await;

        assert_eq!(report.cancelled, 0);
        assert_eq!(report.mode, CancelMode::ListFailed);
        assert!(gateway.cancel_requests().is_empty());
    }

    #[tokio::test]
    async fn test_only_target_symbol_is_cancelled() {
        let (gateway, reconciler, symbol) = setup();
        let eth = Symbol::normalize("ETH").unwrap();
        gateway.add_resting_order(&symbol, OrderSide::Buy, Price::new(dec!(29976)));
        gateway.add_resting_order(&eth, OrderSide::Sell, Price::new(dec!(2001)));

        let report = reconciler.cancel_all(&symbol).await;

        assert_eq!(report.cancelled, 1);
        let remaining = gateway.resting_orders();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].symbol, eth);
    }
}
