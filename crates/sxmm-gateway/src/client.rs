//! StandX perps REST client.
//!
//! Reads use the bearer token only. State-changing requests (`new_order`,
//! `cancel_orders`) additionally carry the ed25519 signing headers computed
//! over the exact JSON body that is sent.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use sxmm_core::{AccountBalance, MarketSnapshot, OrderId, OrderRecord, OrderRequest, Position, Price, Symbol};
use tracing::debug;

use crate::auth::AuthContext;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{BoxFuture, ExchangeGateway, OrderAck};
use crate::signer::{
    HEADER_REQUEST_ID, HEADER_REQUEST_SIGNATURE, HEADER_REQUEST_TIMESTAMP, HEADER_REQUEST_VERSION,
};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct SymbolPriceResponse {
    mark_price: Price,
}

#[derive(Debug, Deserialize)]
struct OpenOrdersResponse {
    #[serde(default)]
    result: Vec<OrderRecord>,
}

/// Envelope returned by every state-changing endpoint.
#[derive(Debug, Deserialize)]
struct ApiAck {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    request_id: Option<String>,
}

/// Client for the StandX perps API.
pub struct StandxClient {
    client: Client,
    base_url: String,
}

impl StandxClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Perps API base URL (e.g. "https://perps.standx.com")
    pub fn new(base_url: impl Into<String>) -> GatewayResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the current mark price (public endpoint).
    pub async fn query_symbol_price(&self, symbol: &Symbol) -> GatewayResult<MarketSnapshot> {
        let request = self
            .client
            .get(self.url("/api/query_symbol_price"))
            .query(&[("symbol", symbol.as_str())]);
        let body: SymbolPriceResponse = read_json(send(request).await?, "query_symbol_price").await?;

        Ok(MarketSnapshot {
            symbol: symbol.clone(),
            mark_price: body.mark_price,
        })
    }

    pub async fn query_open_orders(
        &self,
        auth: &AuthContext,
        symbol: &Symbol,
    ) -> GatewayResult<Vec<OrderRecord>> {
        let body: OpenOrdersResponse = self
            .get_authed("/api/query_open_orders", auth, Some(symbol))
            .await?;
        Ok(body.result)
    }

    pub async fn query_positions(
        &self,
        auth: &AuthContext,
        symbol: &Symbol,
    ) -> GatewayResult<Vec<Position>> {
        self.get_authed("/api/query_positions", auth, Some(symbol))
            .await
    }

    /// Account balance, returned as the exchange reports it.
    pub async fn query_balance(&self, auth: &AuthContext) -> GatewayResult<AccountBalance> {
        self.get_authed("/api/query_balance", auth, None).await
    }

    /// Cancel a list of orders in one request.
    pub async fn cancel_orders(&self, auth: &AuthContext, ids: &[OrderId]) -> GatewayResult<()> {
        let mut body = Map::new();
        body.insert(
            "order_id_list".to_string(),
            Value::Array(ids.iter().map(OrderId::to_wire).collect()),
        );
        self.post_signed("/api/cancel_orders", auth, &Value::Object(body))
            .await
            .map(|_| ())
    }

    pub async fn new_order(
        &self,
        auth: &AuthContext,
        request: &OrderRequest,
    ) -> GatewayResult<OrderAck> {
        let ack = self
            .post_signed("/api/new_order", auth, &order_body(request))
            .await?;
        Ok(OrderAck {
            request_id: ack.request_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_authed<T: DeserializeOwned>(
        &self,
        path: &str,
        auth: &AuthContext,
        symbol: Option<&Symbol>,
    ) -> GatewayResult<T> {
        let mut request = self.client.get(self.url(path)).bearer_auth(auth.token());
        if let Some(symbol) = symbol {
            request = request.query(&[("symbol", symbol.as_str())]);
        }
        read_json(send(request).await?, path).await
    }

    async fn post_signed(&self, path: &str, auth: &AuthContext, body: &Value) -> GatewayResult<ApiAck> {
        let payload = serde_json::to_string(body)
            .map_err(|e| GatewayError::Decode(format!("Failed to encode {path} body: {e}")))?;
        let signed = auth.signer().signed_headers(&payload);
        debug!(path, request_id = %signed.request_id, "Sending signed request");

        let request = self
            .client
            .post(self.url(path))
            .bearer_auth(auth.token())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(HEADER_REQUEST_VERSION, signed.version)
            .header(HEADER_REQUEST_ID, &signed.request_id)
            .header(HEADER_REQUEST_TIMESTAMP, signed.timestamp.to_string())
            .header(HEADER_REQUEST_SIGNATURE, &signed.signature)
            .body(payload);

        let ack: ApiAck = read_json(send(request).await?, path).await?;
        if ack.code != 0 {
            return Err(GatewayError::Api {
                code: ack.code,
                message: ack.message,
            });
        }
        Ok(ack)
    }
}

/// JSON body for `new_order`; `price` is omitted for market orders.
fn order_body(request: &OrderRequest) -> Value {
    let mut body = Map::new();
    body.insert("symbol".to_string(), Value::from(request.symbol.as_str()));
    body.insert("side".to_string(), Value::from(request.side.as_str()));
    body.insert(
        "order_type".to_string(),
        Value::from(request.order_type.to_string()),
    );
    body.insert("qty".to_string(), Value::from(request.qty.to_wire()));
    body.insert(
        "time_in_force".to_string(),
        Value::from(request.time_in_force.to_string()),
    );
    body.insert("reduce_only".to_string(), Value::from(request.reduce_only));
    if let Some(price) = &request.price {
        body.insert("price".to_string(), Value::from(price.as_str()));
    }
    body.insert(
        "cl_ord_id".to_string(),
        Value::from(request.cl_ord_id.as_str()),
    );
    Value::Object(body)
}

async fn send(request: RequestBuilder) -> GatewayResult<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| GatewayError::Http(format!("HTTP request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> GatewayResult<T> {
    response
        .json()
        .await
        .map_err(|e| GatewayError::Decode(format!("{what}: {e}")))
}

impl ExchangeGateway for StandxClient {
    fn mark_price<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, GatewayResult<MarketSnapshot>> {
        Box::pin(self.query_symbol_price(symbol))
    }

    fn open_orders<'a>(
        &'a self,
        auth: &'a AuthContext,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, GatewayResult<Vec<OrderRecord>>> {
        Box::pin(self.query_open_orders(auth, symbol))
    }

    fn cancel_orders<'a>(
        &'a self,
        auth: &'a AuthContext,
        ids: &'a [OrderId],
    ) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(StandxClient::cancel_orders(self, auth, ids))
    }

    fn positions<'a>(
        &'a self,
        auth: &'a AuthContext,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, GatewayResult<Vec<Position>>> {
        Box::pin(self.query_positions(auth, symbol))
    }

    fn place_order<'a>(
        &'a self,
        auth: &'a AuthContext,
        request: &'a OrderRequest,
    ) -> BoxFuture<'a, GatewayResult<OrderAck>> {
        Box::pin(self.new_order(auth, request))
    }

    fn balance<'a>(&'a self, auth: &'a AuthContext) -> BoxFuture<'a, GatewayResult<AccountBalance>> {
        Box::pin(self.query_balance(auth))
    }
}
