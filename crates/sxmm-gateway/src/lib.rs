//! StandX exchange gateway for the market-making bot.
//!
//! Narrow interfaces the quoting core consumes, plus their StandX adapters:
//! - `ExchangeGateway`: prices, open orders, cancels, positions, placement
//! - `Authenticator`: resolves a `CredentialStrategy` into an `AuthContext`
//! - `RequestSigner`: ed25519 request signing (`x-request-signature`)
//! - `WalletSigner`: EVM wallet used for the interactive login
//!
//! `MockGateway` (an in-memory exchange) and `StaticAuthenticator` are used
//! by the other crates' tests.

pub mod auth;
pub mod client;
pub mod error;
pub mod gateway;
pub mod signer;
pub mod wallet;

pub use auth::{
    AuthContext, Authenticator, Chain, CredentialStrategy, LoginResponse, StandxAuthClient,
    StaticAuthenticator,
};
pub use client::StandxClient;
pub use error::{GatewayError, GatewayResult, KeyError};
pub use gateway::{BoxFuture, ExchangeGateway, GatewayCall, MockGateway, OrderAck};
pub use signer::RequestSigner;
pub use wallet::WalletSigner;
