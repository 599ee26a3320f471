//! Residual inventory flattening.
//!
//! Any non-zero position on the active symbol is closed with a reduce-only
//! IOC market order for its full size. This is best effort: price can move
//! between detection and execution and partial fills are expected. The next
//! tick detects whatever remains and tries again.

use std::sync::Arc;

use sxmm_core::{OrderRequest, OrderSide, Size, Symbol};
use sxmm_gateway::{AuthContext, ExchangeGateway};
use sxmm_telemetry::Metrics;
use tracing::{debug, error, info, warn};

/// What one inventory check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlattenOutcome {
    /// No position (or zero qty) on the symbol.
    Flat,
    /// Reduce-only order accepted by the exchange.
    Submitted { side: OrderSide, qty: Size },
    /// Reduce-only order rejected or not delivered.
    Failed {
        side: OrderSide,
        qty: Size,
        error: String,
    },
    /// Positions could not be queried; nothing was attempted.
    QueryFailed { error: String },
}

impl FlattenOutcome {
    /// True when a reduce-only order was sent.
    pub fn attempted(&self) -> bool {
        matches!(self, Self::Submitted { .. } | Self::Failed { .. })
    }
}

/// Keeps the active symbol near flat.
pub struct InventoryGuard<G: ?Sized> {
    gateway: Arc<G>,
    auth: Arc<AuthContext>,
}

impl<G: ?Sized> Clone for InventoryGuard<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            auth: Arc::clone(&self.auth),
        }
    }
}

impl<G: ExchangeGateway + ?Sized> InventoryGuard<G> {
    pub fn new(gateway: Arc<G>, auth: Arc<AuthContext>) -> Self {
        Self { gateway, auth }
    }

    /// Flatten the position on `symbol` if it is non-zero.
    pub async fn flatten_if_needed(&self, symbol: &Symbol) -> FlattenOutcome {
        let positions = match self.gateway.positions(&self.auth, symbol).await {
            Ok(positions) => positions,
            Err(e) => {
                error!(%symbol, step = "flatten", error = %e, "Failed to query positions");
                return FlattenOutcome::QueryFailed {
                    error: e.to_string(),
                };
            }
        };

        let qty = positions
            .iter()
            .find(|p| &p.symbol == symbol)
            .map(|p| p.qty)
            .unwrap_or(Size::ZERO);

        if qty.is_zero() {
            debug!(%symbol, "Position flat");
            return FlattenOutcome::Flat;
        }

        let side = if qty.is_positive() {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };
        let size = qty.abs();
        warn!(%symbol, position = %qty, %side, qty = %size, "Residual position detected, flattening");

        let request = OrderRequest::reduce_only_market(symbol.clone(), side, size);
        match self.gateway.place_order(&self.auth, &request).await {
            Ok(ack) => {
                info!(
                    %symbol,
                    %side,
                    qty = %size,
                    request_id = ?ack.request_id,
                    "Reduce-only flatten order submitted"
                );
                Metrics::flatten_attempt(side.as_str(), "submitted");
                FlattenOutcome::Submitted { side, qty: size }
            }
            Err(e) => {
                error!(%symbol, %side, qty = %size, error = %e, "Reduce-only flatten order failed");
                Metrics::flatten_attempt(side.as_str(), "failed");
                FlattenOutcome::Failed {
                    side,
                    qty: size,
                    error: e.to_string(),
                }
            }
        }
    }
}
