//! Gateway error types.

use thiserror::Error;

/// Signing-key errors. Fatal at startup.
///
/// Messages never contain key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Invalid wallet private key: {0}")]
    InvalidWalletKey(String),

    #[error("Failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Exchange and authentication errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
