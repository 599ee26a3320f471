//! Ed25519 request signing for StandX trading endpoints.
//!
//! Every state-changing request carries four headers:
//! - `x-request-sign-version`: signing scheme version (`v1`)
//! - `x-request-id`: unique request id
//! - `x-request-timestamp`: milliseconds since epoch
//! - `x-request-signature`: base64 ed25519 signature over
//!   `"{version},{request_id},{timestamp},{payload}"`
//!
//! The key is either loaded from persistent material (token mode) or
//! generated fresh for the session (wallet mode).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signer as _, SigningKey};
use std::fmt;
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::KeyError;

pub const SIGN_VERSION: &str = "v1";
pub const HEADER_REQUEST_VERSION: &str = "x-request-sign-version";
pub const HEADER_REQUEST_ID: &str = "x-request-id";
pub const HEADER_REQUEST_TIMESTAMP: &str = "x-request-timestamp";
pub const HEADER_REQUEST_SIGNATURE: &str = "x-request-signature";

/// Required length of an ed25519 secret key.
const SECRET_KEY_LEN: usize = 32;

/// Headers attached to one signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub version: &'static str,
    pub request_id: String,
    pub timestamp: u64,
    pub signature: String,
}

/// Request-signing capability.
///
/// Security notes:
/// - The secret key is zeroized on drop (`ed25519-dalek` zeroize feature).
/// - `Debug` prints only the public key.
#[derive(Clone)]
pub struct RequestSigner {
    key: SigningKey,
}

impl RequestSigner {
    /// Load a persistent signing key.
    ///
    /// Encodings are tried in order: hex (optional `0x` prefix), standard
    /// base64, base58. The first decoding that yields exactly 32 bytes wins.
    ///
    /// # Errors
    /// Returns `KeyError::InvalidKeyMaterial` when no encoding yields 32 bytes.
    pub fn load(raw: &str) -> Result<Self, KeyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(KeyError::InvalidKeyMaterial("empty key".to_string()));
        }

        let decoders: [(&str, fn(&str) -> Option<Vec<u8>>); 3] = [
            ("hex", decode_hex),
            ("base64", decode_base64),
            ("base58", decode_base58),
        ];

        let mut last_len = 0;
        for (encoding, decode) in decoders {
            let Some(bytes) = decode(trimmed).map(Zeroizing::new) else {
                continue;
            };
            if bytes.len() == SECRET_KEY_LEN {
                let mut secret = Zeroizing::new([0u8; SECRET_KEY_LEN]);
                secret.copy_from_slice(&bytes);
                debug!(encoding, "Signing key decoded");
                return Ok(Self::from_bytes(&secret));
            }
            last_len = bytes.len();
        }

        Err(KeyError::InvalidKeyMaterial(format!(
            "could not decode to {SECRET_KEY_LEN} bytes (last decoded length: {last_len}); \
             expected hex, base64 or base58"
        )))
    }

    /// Generate a fresh key for this session only.
    pub fn ephemeral() -> Self {
        Self {
            key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    pub fn from_bytes(secret: &[u8; SECRET_KEY_LEN]) -> Self {
        Self {
            key: SigningKey::from_bytes(secret),
        }
    }

    /// Base58 public key; StandX uses it as the login `requestId`.
    pub fn public_key_base58(&self) -> String {
        bs58::encode(self.key.verifying_key().as_bytes()).into_string()
    }

    /// Sign `"{version},{request_id},{timestamp},{payload}"`, base64-encoded.
    pub fn sign_request(
        &self,
        version: &str,
        request_id: &str,
        timestamp: u64,
        payload: &str,
    ) -> String {
        let message = format!("{version},{request_id},{timestamp},{payload}");
        let signature = self.key.sign(message.as_bytes());
        BASE64.encode(signature.to_bytes())
    }

    /// Build the signing headers for a request body.
    pub fn signed_headers(&self, payload: &str) -> SignedHeaders {
        let request_id = Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let signature = self.sign_request(SIGN_VERSION, &request_id, timestamp, payload);
        SignedHeaders {
            version: SIGN_VERSION,
            request_id,
            timestamp,
            signature,
        }
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("public_key", &self.public_key_base58())
            .finish()
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    hex::decode(s.trim_start_matches("0x")).ok()
}

fn decode_base64(s: &str) -> Option<Vec<u8>> {
    BASE64.decode(s).ok()
}

fn decode_base58(s: &str) -> Option<Vec<u8>> {
    bs58::decode(s).into_vec().ok()
}
