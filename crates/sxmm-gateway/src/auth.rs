//! Authentication for StandX.
//!
//! Two credential strategies, selected once at startup and never mixed:
//! - `Wallet`: interactive login with an EVM wallet; a fresh ed25519
//!   request-signing key is generated for the session.
//! - `Token`: pre-issued bearer token plus a persistent signing key.
//!
//! Both resolve to an `AuthContext` that lives for the whole run.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;
use zeroize::Zeroizing;

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::BoxFuture;
use crate::signer::RequestSigner;
use crate::wallet::WalletSigner;

/// Default timeout for auth requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Session lifetime requested at login (7 days).
const DEFAULT_EXPIRES_SECONDS: u64 = 7 * 24 * 3600;

/// Account label used when no wallet address is known.
pub const TOKEN_ACCOUNT_LABEL: &str = "API_TOKEN_USER";

/// Chain of the login wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    #[default]
    Bsc,
    Solana,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bsc => "bsc",
            Self::Solana => "solana",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How credentials are obtained.
pub enum CredentialStrategy {
    /// Wallet private key login (ephemeral request-signing key).
    Wallet {
        private_key: Zeroizing<String>,
        chain: Chain,
    },
    /// Pre-issued API token plus persistent signing key.
    Token {
        token: Zeroizing<String>,
        signing_key: Zeroizing<String>,
    },
}

impl CredentialStrategy {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Wallet { .. } => "wallet",
            Self::Token { .. } => "token",
        }
    }
}

impl fmt::Debug for CredentialStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wallet { chain, .. } => f
                .debug_struct("Wallet")
                .field("chain", chain)
                .finish_non_exhaustive(),
            Self::Token { .. } => f.debug_struct("Token").finish_non_exhaustive(),
        }
    }
}

/// Authenticated session: bearer token, signing capability, account label.
///
/// Owned by the runner and shared read-only; never mutated mid-run.
#[derive(Clone)]
pub struct AuthContext {
    token: Zeroizing<String>,
    signer: RequestSigner,
    account_label: String,
}

impl AuthContext {
    pub fn new(token: impl Into<String>, signer: RequestSigner, account_label: impl Into<String>) -> Self {
        Self {
            token: Zeroizing::new(token.into()),
            signer,
            account_label: account_label.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }

    pub fn account_label(&self) -> &str {
        &self.account_label
    }

    /// First characters of the token, safe to log.
    pub fn token_preview(&self) -> String {
        let preview: String = self.token.chars().take(10).collect();
        format!("{preview}...")
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("account_label", &self.account_label)
            .field("token", &self.token_preview())
            .field("signer", &self.signer)
            .finish()
    }
}

/// Result of a wallet login.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Resolves a credential strategy into an `AuthContext`.
pub trait Authenticator: Send + Sync {
    fn authenticate<'a>(
        &'a self,
        strategy: &'a CredentialStrategy,
    ) -> BoxFuture<'a, GatewayResult<AuthContext>>;
}

#[derive(Debug, Serialize)]
struct PrepareSigninRequest<'a> {
    address: &'a str,
    #[serde(rename = "requestId")]
    request_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct PrepareSigninResponse {
    #[serde(default)]
    success: bool,
    #[serde(rename = "signedData")]
    signed_data: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    signature: &'a str,
    #[serde(rename = "signedData")]
    signed_data: &'a str,
    #[serde(rename = "expiresSeconds")]
    expires_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct RawLoginResponse {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SigninClaims {
    message: String,
}

/// Client for the StandX auth service.
pub struct StandxAuthClient {
    client: Client,
    auth_url: String,
    expires_seconds: u64,
}

impl StandxAuthClient {
    /// Create a new auth client.
    ///
    /// # Arguments
    /// * `auth_url` - Base URL of the auth service (e.g. "https://api.standx.com")
    pub fn new(auth_url: impl Into<String>) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            auth_url: auth_url.into().trim_end_matches('/').to_string(),
            expires_seconds: DEFAULT_EXPIRES_SECONDS,
        })
    }

    /// Interactive wallet login.
    ///
    /// 1. `prepare-signin` with the wallet address and the base58 public key
    ///    of `request_signer` as `requestId`; returns a signed JWT.
    /// 2. The JWT's `message` claim is signed by the wallet (EIP-191).
    /// 3. `login` exchanges the signature for a bearer token.
    pub async fn login_with_wallet(
        &self,
        chain: Chain,
        wallet: &WalletSigner,
        request_signer: &RequestSigner,
    ) -> GatewayResult<LoginResponse> {
        let address = wallet.address();
        let request_id = request_signer.public_key_base58();

        let prepare: PrepareSigninResponse = self
            .post_json(
                "/v1/offchain/prepare-signin",
                chain,
                &PrepareSigninRequest {
                    address: &address,
                    request_id: &request_id,
                },
            )
            .await?;

        let signed_data = match prepare.signed_data {
            Some(data) if prepare.success => data,
            _ => return Err(GatewayError::Auth("prepare-signin was not successful".to_string())),
        };

        let message = signin_message(&signed_data)?;
        let signature = wallet.personal_sign(&message).await?;

        let login: RawLoginResponse = self
            .post_json(
                "/v1/offchain/login",
                chain,
                &LoginRequest {
                    signature: &signature,
                    signed_data: &signed_data,
                    expires_seconds: self.expires_seconds,
                },
            )
            .await?;

        let token = login
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GatewayError::Auth("login response has no token".to_string()))?;

        Ok(LoginResponse {
            token,
            expires_at: Utc::now() + chrono::Duration::seconds(self.expires_seconds as i64),
        })
    }

    async fn post_json<B, T>(&self, path: &str, chain: Chain, body: &B) -> GatewayResult<T>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.auth_url, path);
        let response = self
            .client
            .post(&url)
            .query(&[("chain", chain.as_str())])
            .json(body)
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

        response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(format!("{path}: {e}")))
    }

    async fn resolve(&self, strategy: &CredentialStrategy) -> GatewayResult<AuthContext> {
        match strategy {
            CredentialStrategy::Wallet { private_key, chain } => {
                let wallet = WalletSigner::from_hex(private_key)?;
                let request_signer = RequestSigner::ephemeral();
                info!(address = %wallet.address(), chain = %chain, "Authenticating with wallet");

                let login = self.login_with_wallet(*chain, &wallet, &request_signer).await?;
                info!(expires_at = %login.expires_at, "Wallet login successful");

                Ok(AuthContext::new(login.token, request_signer, wallet.address()))
            }
            CredentialStrategy::Token { token, signing_key } => {
                if token.trim().is_empty() {
                    return Err(GatewayError::Auth("API token is empty".to_string()));
                }
                let request_signer = RequestSigner::load(signing_key)?;
                info!("Signing key loaded, using pre-issued API token");

                Ok(AuthContext::new(
                    token.trim(),
                    request_signer,
                    TOKEN_ACCOUNT_LABEL,
                ))
            }
        }
    }
}

impl Authenticator for StandxAuthClient {
    fn authenticate<'a>(
        &'a self,
        strategy: &'a CredentialStrategy,
    ) -> BoxFuture<'a, GatewayResult<AuthContext>> {
        Box::pin(self.resolve(strategy))
    }
}

/// Authenticator returning a fixed result, for tests.
///
/// Records how many times it was asked to authenticate.
#[derive(Debug)]
pub struct StaticAuthenticator {
    context: Option<AuthContext>,
    calls: AtomicUsize,
}

impl StaticAuthenticator {
    /// Always succeeds with `context`.
    pub fn succeeding(context: AuthContext) -> Self {
        Self {
            context: Some(context),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fails with `GatewayError::Auth`.
    pub fn failing() -> Self {
        Self {
            context: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Authenticator for StaticAuthenticator {
    fn authenticate<'a>(
        &'a self,
        _strategy: &'a CredentialStrategy,
    ) -> BoxFuture<'a, GatewayResult<AuthContext>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.context
                .clone()
                .ok_or_else(|| GatewayError::Auth("credentials rejected".to_string()))
        })
    }
}

/// Extract the `message` claim from the prepare-signin JWT payload.
fn signin_message(signed_data: &str) -> GatewayResult<String> {
    let payload = signed_data
        .split('.')
        .nth(1)
        .ok_or_else(|| GatewayError::Decode("signedData is not a JWT".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| GatewayError::Decode(format!("signedData payload: {e}")))?;

    let claims: SigninClaims = serde_json::from_slice(&bytes)
        .map_err(|e| GatewayError::Decode(format!("signedData claims: {e}")))?;

    Ok(claims.message)
}
