//! Exchange gateway trait.
//!
//! Provides a trait-based abstraction over the exchange REST API so the
//! quoting core can be driven by:
//! - `StandxClient` in production
//! - `MockGateway` in tests (in-memory order book of resting orders)

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use sxmm_core::{
    AccountBalance, MarketSnapshot, OrderId, OrderRecord, OrderRequest, OrderSide, OrderType, Position, Price,
    Size, Symbol,
};

use crate::auth::AuthContext;
use crate::error::{GatewayError, GatewayResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Exchange acknowledgement of an accepted order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderAck {
    pub request_id: Option<String>,
}

/// Operations the bot consumes from the exchange.
///
/// Authenticated calls take the run's `AuthContext` by reference; the
/// gateway never stores credentials itself.
pub trait ExchangeGateway: Send + Sync {
    /// Current mark price for `symbol`.
    fn mark_price<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, GatewayResult<MarketSnapshot>>;

    /// Resting orders for `symbol`.
    fn open_orders<'a>(
        &'a self,
        auth: &'a AuthContext,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, GatewayResult<Vec<OrderRecord>>>;

    /// Cancel the given orders in one request.
    fn cancel_orders<'a>(
        &'a self,
        auth: &'a AuthContext,
        ids: &'a [OrderId],
    ) -> BoxFuture<'a, GatewayResult<()>>;

    /// Positions, possibly including other symbols.
    fn positions<'a>(
        &'a self,
        auth: &'a AuthContext,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, GatewayResult<Vec<Position>>>;

    /// Submit one order.
    fn place_order<'a>(
        &'a self,
        auth: &'a AuthContext,
        request: &'a OrderRequest,
    ) -> BoxFuture<'a, GatewayResult<OrderAck>>;

    /// Account balance.
    fn balance<'a>(&'a self, auth: &'a AuthContext) -> BoxFuture<'a, GatewayResult<AccountBalance>>;
}

/// Call recorded by `MockGateway`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    MarkPrice(Symbol),
    OpenOrders(Symbol),
    Cancel(Vec<OrderId>),
    Positions(Symbol),
    Place(OrderRequest),
    Balance,
}

/// In-memory exchange for tests.
///
/// Accepted limit orders rest until cancelled; every call is recorded.
/// Failures are scripted per operation.
#[derive(Debug, Default)]
pub struct MockGateway {
    calls: Mutex<Vec<GatewayCall>>,
    mark_price: Mutex<Option<Price>>,
    price_failures: AtomicUsize,
    price_latency: Mutex<Option<Duration>>,
    panic_on_price: AtomicBool,
    open_orders_latency: Mutex<Option<Duration>>,
    cancel_latency: Mutex<Option<Duration>>,
    resting: Mutex<Vec<OrderRecord>>,
    positions: Mutex<Vec<Position>>,
    next_order_id: AtomicU64,
    fail_open_orders: AtomicBool,
    fail_batch_cancel: AtomicBool,
    failing_cancel_ids: Mutex<HashSet<OrderId>>,
    fail_positions: AtomicBool,
    failing_sides: Mutex<HashSet<OrderSide>>,
    fail_reduce_only: AtomicBool,
    balance: Mutex<AccountBalance>,
}

impl MockGateway {
    /// Create a mock quoting `mark_price`.
    pub fn new(mark_price: Price) -> Self {
        let mock = Self::default();
        *mock.mark_price.lock() = Some(mark_price);
        mock
    }

    pub fn set_mark_price(&self, price: Option<Price>) {
        *self.mark_price.lock() = price;
    }

    /// Fail the next `n` mark price requests.
    pub fn fail_next_prices(&self, n: usize) {
        self.price_failures.store(n, Ordering::SeqCst);
    }

    /// Delay every mark price response.
    pub fn set_price_latency(&self, latency: Duration) {
        *self.price_latency.lock() = Some(latency);
    }

    /// Panic inside every mark price request while set.
    pub fn set_panic_on_price(&self, panic: bool) {
        self.panic_on_price.store(panic, Ordering::SeqCst);
    }

    /// Delay every open orders response.
    pub fn set_open_orders_latency(&self, latency: Duration) {
        *self.open_orders_latency.lock() = Some(latency);
    }

    /// Delay every cancel response.
    pub fn set_cancel_latency(&self, latency: Duration) {
        *self.cancel_latency.lock() = Some(latency);
    }

    pub fn set_balance(&self, balance: AccountBalance) {
        *self.balance.lock() = balance;
    }

    /// Seed a resting order; returns its id.
    pub fn add_resting_order(&self, symbol: &Symbol, side: OrderSide, price: Price) -> OrderId {
        let id = self.allocate_id();
        self.resting.lock().push(OrderRecord {
            id: id.clone(),
            symbol: symbol.clone(),
            side,
            price: Some(price),
            qty: Size::new(Decimal::ONE),
            status: "open".to_string(),
        });
        id
    }

    pub fn set_positions(&self, positions: Vec<Position>) {
        *self.positions.lock() = positions;
    }

    pub fn set_fail_open_orders(&self, fail: bool) {
        self.fail_open_orders.store(fail, Ordering::SeqCst);
    }

    /// Fail every cancel request carrying more than one id.
    pub fn set_fail_batch_cancel(&self, fail: bool) {
        self.fail_batch_cancel.store(fail, Ordering::SeqCst);
    }

    /// Fail every cancel request that includes `id`.
    pub fn fail_cancel_of(&self, id: OrderId) {
        self.failing_cancel_ids.lock().insert(id);
    }

    pub fn set_fail_positions(&self, fail: bool) {
        self.fail_positions.store(fail, Ordering::SeqCst);
    }

    /// Reject non-reduce-only placements on `side`.
    pub fn fail_placement_side(&self, side: OrderSide) {
        self.failing_sides.lock().insert(side);
    }

    pub fn set_fail_reduce_only(&self, fail: bool) {
        self.fail_reduce_only.store(fail, Ordering::SeqCst);
    }

    /// All calls, in order.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Id lists of every cancel request, in order.
    pub fn cancel_requests(&self) -> Vec<Vec<OrderId>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                GatewayCall::Cancel(ids) => Some(ids.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every placement request, accepted or not.
    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                GatewayCall::Place(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn mark_price_requests(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, GatewayCall::MarkPrice(_)))
            .count()
    }

    /// Orders currently resting on the mock book.
    pub fn resting_orders(&self) -> Vec<OrderRecord> {
        self.resting.lock().clone()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().push(call);
    }

    fn allocate_id(&self) -> OrderId {
        let n = self.next_order_id.fetch_add(1, Ordering::SeqCst) + 1;
        OrderId::new(n.to_string())
    }

    fn rejected(message: &str) -> GatewayError {
        GatewayError::Api {
            code: 400,
            message: message.to_string(),
        }
    }
}

impl ExchangeGateway for MockGateway {
    fn mark_price<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, GatewayResult<MarketSnapshot>> {
        Box::pin(async move {
            self.record(GatewayCall::MarkPrice(symbol.clone()));
            let latency = *self.price_latency.lock();
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            if self.panic_on_price.load(Ordering::SeqCst) {
                panic!("mark price handler panicked");
            }

            let scripted_failure = self
                .price_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if scripted_failure {
                return Err(GatewayError::Http("price feed unavailable".to_string()));
            }

            let price = *self.mark_price.lock();
            price
                .map(|mark_price| MarketSnapshot {
                    symbol: symbol.clone(),
                    mark_price,
                })
                .ok_or_else(|| GatewayError::Decode("no mark price".to_string()))
        })
    }

    fn open_orders<'a>(
        &'a self,
        _auth: &'a AuthContext,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, GatewayResult<Vec<OrderRecord>>> {
        Box::pin(async move {
            self.record(GatewayCall::OpenOrders(symbol.clone()));
            let latency = *self.open_orders_latency.lock();
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            if self.fail_open_orders.load(Ordering::SeqCst) {
                return Err(GatewayError::Http("open orders unavailable".to_string()));
            }
            Ok(self
                .resting
                .lock()
                .iter()
                .filter(|o| &o.symbol == symbol)
                .cloned()
                .collect())
        })
    }

    fn cancel_orders<'a>(
        &'a self,
        _auth: &'a AuthContext,
        ids: &'a [OrderId],
    ) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            self.record(GatewayCall::Cancel(ids.to_vec()));
            let latency = *self.cancel_latency.lock();
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            if ids.len() > 1 && self.fail_batch_cancel.load(Ordering::SeqCst) {
                return Err(Self::rejected("batch cancel rejected"));
            }
            {
                let failing = self.failing_cancel_ids.lock();
                if let Some(id) = ids.iter().find(|id| failing.contains(*id)) {
                    return Err(Self::rejected(&format!("cancel of {id} rejected")));
                }
            }
            self.resting.lock().retain(|o| !ids.contains(&o.id));
            Ok(())
        })
    }

    fn positions<'a>(
        &'a self,
        _auth: &'a AuthContext,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, GatewayResult<Vec<Position>>> {
        Box::pin(async move {
            self.record(GatewayCall::Positions(symbol.clone()));
            if self.fail_positions.load(Ordering::SeqCst) {
                return Err(GatewayError::Http("positions unavailable".to_string()));
            }
            Ok(self.positions.lock().clone())
        })
    }

    fn place_order<'a>(
        &'a self,
        _auth: &'a AuthContext,
        request: &'a OrderRequest,
    ) -> BoxFuture<'a, GatewayResult<OrderAck>> {
        Box::pin(async move {
            self.record(GatewayCall::Place(request.clone()));

            if request.reduce_only {
                if self.fail_reduce_only.load(Ordering::SeqCst) {
                    return Err(Self::rejected("reduce-only order rejected"));
                }
                return Ok(OrderAck::default());
            }
            if self.failing_sides.lock().contains(&request.side) {
                return Err(Self::rejected("order rejected"));
            }

            if request.order_type == OrderType::Limit {
                let price = request.price.as_deref().and_then(|p| p.parse().ok());
                let id = self.allocate_id();
                self.resting.lock().push(OrderRecord {
                    id,
                    symbol: request.symbol.clone(),
                    side: request.side,
                    price,
                    qty: request.qty,
                    status: "open".to_string(),
                });
            }
            Ok(OrderAck {
                request_id: Some(request.cl_ord_id.to_string()),
            })
        })
    }

    fn balance<'a>(&'a self, _auth: &'a AuthContext) -> BoxFuture<'a, GatewayResult<AccountBalance>> {
        Box::pin(async move {
            self.record(GatewayCall::Balance);
            Ok(self.balance.lock().clone())
        })
    }
}
