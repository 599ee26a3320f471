//! Read-only connection check (`--check`).
//!
//! Verifies credentials and connectivity without touching orders: fetches
//! the account balance, then the mark price, open orders and positions for
//! the symbol, and logs them.

use sxmm_core::{AccountBalance, MarketSnapshot, OrderRecord, Position, Symbol};
use sxmm_gateway::{AuthContext, ExchangeGateway, GatewayResult};
use tracing::info;

/// What the exchange reported for the account.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub balance: AccountBalance,
    pub snapshot: MarketSnapshot,
    pub open_orders: Vec<OrderRecord>,
    /// Positions on the checked symbol only.
    pub positions: Vec<Position>,
}

/// Query the account state for `symbol`. Never places or cancels orders.
pub async fn connection_check<G: ExchangeGateway + ?Sized>(
    gateway: &G,
    auth: &AuthContext,
    symbol: &Symbol,
) -> GatewayResult<CheckReport> {
    let balance = gateway.balance(auth).await?;
    info!(account = auth.account_label(), balance = %balance, "Account balance");

    let snapshot = gateway.mark_price(symbol).await?;
    info!(%symbol, mark_price = %snapshot.mark_price, "Mark price");

    let open_orders = gateway.open_orders(auth, symbol).await?;
    info!(%symbol, count = open_orders.len(), "Open orders");
    for order in &open_orders {
        info!(
            order_id = %order.id,
            side = %order.side,
            price = ?order.price.map(|p| p.to_string()),
            qty = %order.qty,
            status = %order.status,
            "Open order"
        );
    }

    let positions: Vec<Position> = gateway
        .positions(auth, symbol)
        .await?
        .into_iter()
        .filter(|p| &p.symbol == symbol)
        .collect();
    for position in &positions {
        info!(%symbol, qty = %position.qty, flat = position.is_flat(), "Position");
    }
    if positions.is_empty() {
        info!(%symbol, "No position");
    }

    Ok(CheckReport {
        balance,
        snapshot,
        open_orders,
        positions,
    })
}
