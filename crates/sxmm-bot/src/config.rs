//! Configuration management.
//!
//! Resolution order, lowest to highest precedence:
//! 1. Serde defaults
//! 2. TOML file (`config/default.toml`, `--config` or `SXMM_CONFIG`)
//! 3. Environment (`SYMBOL`, `STANDX_API_URL`, `STANDX_AUTH_URL`)
//! 4. CLI flags
//!
//! Credentials never come from the file. They are read from the environment
//! once, for the selected auth mode only.

use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sxmm_core::{Size, Symbol};
use sxmm_gateway::{Chain, CredentialStrategy};
use sxmm_mm::{CycleSettings, QuoteConfig};
use sxmm_telemetry::LogFormat;
use zeroize::Zeroizing;

use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

pub const ENV_WALLET_PRIVATE_KEY: &str = "WALLET_PRIVATE_KEY";
pub const ENV_API_TOKEN: &str = "STANDX_API_TOKEN";
pub const ENV_API_KEY: &str = "STANDX_API_KEY";

/// Largest scale a `rust_decimal` value can carry.
const MAX_PRICE_DECIMALS: u32 = 28;

/// Credential source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Wallet private key login (`WALLET_PRIVATE_KEY`).
    #[default]
    Wallet,
    /// Pre-issued token and signing key (`STANDX_API_TOKEN`, `STANDX_API_KEY`).
    Token,
}

/// `[trading]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Symbol, normalized at startup (`btc` -> `BTC-USD`).
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Size of each resting order, in base asset.
    #[serde(default = "default_order_size")]
    pub order_size: Decimal,
}

fn default_symbol() -> String {
    "BTC-USD".to_string()
}

fn default_order_size() -> Decimal {
    dec!(0.0015)
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            order_size: default_order_size(),
        }
    }
}

/// `[exchange]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_perps_url")]
    pub perps_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_perps_url() -> String {
    "https://perps.standx.com".to_string()
}

fn default_auth_url() -> String {
    "https://api.standx.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            perps_url: default_perps_url(),
            auth_url: default_auth_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// `[auth]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    /// Chain of the login wallet (wallet mode only).
    #[serde(default)]
    pub chain: Chain,
}

/// `[runner]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Sleep after a completed tick.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Sleep after a failed tick. Must be shorter than the refresh interval.
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
    /// Upper bound on the shutdown cancel sweep.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    /// Consecutive failed ticks before the run stops (0 = never).
    #[serde(default)]
    pub max_consecutive_failures: u32,
}

fn default_refresh_interval_secs() -> u64 {
    30
}

fn default_error_backoff_secs() -> u64 {
    5
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            max_consecutive_failures: 0,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `pretty` or `json`. Unset: JSON when `RUST_ENV=production`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<LogFormat>,
}

/// Application configuration as loaded from file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub quoting: QuoteConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Non-secret overrides taken from the environment.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub symbol: Option<String>,
    pub perps_url: Option<String>,
    pub auth_url: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            symbol: non_empty("SYMBOL"),
            perps_url: non_empty("STANDX_API_URL"),
            auth_url: non_empty("STANDX_AUTH_URL"),
        }
    }
}

/// Overrides taken from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub auth_mode: Option<AuthMode>,
    pub symbol: Option<String>,
    pub order_size: Option<Decimal>,
    pub spread_bps: Option<Decimal>,
}

impl AppConfig {
    /// Load configuration from `path`, or defaults if the file does not exist.
    pub fn load(path: &str) -> ConfigResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env(&mut self, env: EnvOverrides) {
        if let Some(symbol) = env.symbol {
            self.trading.symbol = symbol;
        }
        if let Some(url) = env.perps_url {
            self.exchange.perps_url = url;
        }
        if let Some(url) = env.auth_url {
            self.exchange.auth_url = url;
        }
    }

    pub fn apply_cli(&mut self, cli: CliOverrides) {
        if let Some(mode) = cli.auth_mode {
            self.auth.mode = mode;
        }
        if let Some(symbol) = cli.symbol {
            self.trading.symbol = symbol;
        }
        if let Some(size) = cli.order_size {
            self.trading.order_size = size;
        }
        if let Some(spread) = cli.spread_bps {
            self.quoting.spread_bps = spread;
        }
    }

    /// Validate and freeze into the run configuration.
    pub fn resolve(&self) -> ConfigResult<RunConfig> {
        let symbol = Symbol::normalize(&self.trading.symbol)?;
        let quote = &self.quoting;
        let runner = &self.runner;

        if quote.spread_bps <= Decimal::ZERO {
            return Err(invalid(format!(
                "spread_bps must be positive (got {})",
                quote.spread_bps
            )));
        }
        if quote.spread_bps >= quote.max_spread_bps {
            return Err(invalid(format!(
                "spread_bps {} must be below max_spread_bps {}",
                quote.spread_bps, quote.max_spread_bps
            )));
        }
        if self.trading.order_size <= Decimal::ZERO {
            return Err(invalid(format!(
                "order_size must be positive (got {})",
                self.trading.order_size
            )));
        }
        if quote.precision_threshold <= Decimal::ZERO {
            return Err(invalid("precision_threshold must be positive".to_string()));
        }
        for (name, decimals) in [
            ("low_price_decimals", quote.low_price_decimals),
            ("high_price_decimals", quote.high_price_decimals),
        ] {
            if decimals > MAX_PRICE_DECIMALS {
                return Err(invalid(format!(
                    "{name} must be at most {MAX_PRICE_DECIMALS} (got {decimals})"
                )));
            }
        }
        if runner.refresh_interval_secs == 0 {
            return Err(invalid("refresh_interval_secs must be positive".to_string()));
        }
        if runner.error_backoff_secs >= runner.refresh_interval_secs {
            return Err(invalid(format!(
                "error_backoff_secs {} must be shorter than refresh_interval_secs {}",
                runner.error_backoff_secs, runner.refresh_interval_secs
            )));
        }
        if runner.shutdown_timeout_secs == 0 {
            return Err(invalid("shutdown_timeout_secs must be positive".to_string()));
        }
        if self.exchange.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs must be positive".to_string()));
        }

        Ok(RunConfig {
            symbol,
            order_size: Size::new(self.trading.order_size),
            quote: quote.clone(),
            refresh_interval: Duration::from_secs(runner.refresh_interval_secs),
            error_backoff: Duration::from_secs(runner.error_backoff_secs),
            shutdown_timeout: Duration::from_secs(runner.shutdown_timeout_secs),
            max_consecutive_failures: runner.max_consecutive_failures,
        })
    }

    /// Read the credentials for the configured auth mode from the environment.
    pub fn credentials(&self) -> ConfigResult<CredentialStrategy> {
        credentials_from_lookup(self.auth.mode, self.auth.chain, |key| {
            std::env::var(key).ok()
        })
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}

/// Build the credential strategy for `mode` from `lookup`.
///
/// Only the variables of the selected mode are read.
pub fn credentials_from_lookup(
    mode: AuthMode,
    chain: Chain,
    lookup: impl Fn(&str) -> Option<String>,
) -> ConfigResult<CredentialStrategy> {
    let required = |key: &'static str| {
        lookup(key)
            .map(Zeroizing::new)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingCredential(key))
    };

    match mode {
        AuthMode::Wallet => Ok(CredentialStrategy::Wallet {
            private_key: required(ENV_WALLET_PRIVATE_KEY)?,
            chain,
        }),
        AuthMode::Token => Ok(CredentialStrategy::Token {
            token: required(ENV_API_TOKEN)?,
            signing_key: required(ENV_API_KEY)?,
        }),
    }
}

/// Run parameters, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub symbol: Symbol,
    pub order_size: Size,
    pub quote: QuoteConfig,
    pub refresh_interval: Duration,
    pub error_backoff: Duration,
    pub shutdown_timeout: Duration,
    pub max_consecutive_failures: u32,
}

impl RunConfig {
    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            symbol: self.symbol.clone(),
            order_size: self.order_size,
            quote: self.quote.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let run = AppConfig::default().resolve().unwrap();
        assert_eq!(run.symbol.as_str(), "BTC-USD");
        assert_eq!(run.order_size, Size::new(dec!(0.0015)));
        assert_eq!(run.quote.spread_bps, dec!(8));
        assert_eq!(run.refresh_interval, Duration::from_secs(30));
        assert_eq!(run.error_backoff, Duration::from_secs(5));
        assert_eq!(run.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(run.max_consecutive_failures, 0);
    }

    #[test]
    fn test_parse_toml_sections() {
        let config = AppConfig::from_toml(
            r#"
            [trading]
            symbol = "eth"
            order_size = "0.05"

            [quoting]
            spread_bps = "6"
            precision_threshold = "10"

            [exchange]
            perps_url = "http://localhost:8080"

            [auth]
            mode = "token"
            chain = "solana"

            [runner]
            refresh_interval_secs = 15
            error_backoff_secs = 3
            max_consecutive_failures = 20

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.auth.mode, AuthMode::Token);
        assert_eq!(config.auth.chain, Chain::Solana);
        assert_eq!(config.logging.format, Some(LogFormat::Json));
        assert_eq!(config.exchange.auth_url, "https://api.standx.com");

        let run = config.resolve().unwrap();
        assert_eq!(run.symbol.as_str(), "ETH-USD");
        assert_eq!(run.order_size, Size::new(dec!(0.05)));
        assert_eq!(run.quote.spread_bps, dec!(6));
        assert_eq!(run.quote.precision_threshold, dec!(10));
        assert_eq!(run.refresh_interval, Duration::from_secs(15));
        assert_eq!(run.max_consecutive_failures, 20);
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.trading.symbol, "BTC-USD");
        assert_eq!(config.auth.mode, AuthMode::Wallet);
        assert_eq!(config.auth.chain, Chain::Bsc);
        assert!(config.logging.format.is_none());
    }

    #[test]
    fn test_unknown_auth_mode_rejected() {
        let err = AppConfig::from_toml("[auth]\nmode = \"ledger\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_precedence_env_then_cli() {
        let mut config = AppConfig::default();
        config.apply_env(EnvOverrides::from_lookup(env(&[
            ("SYMBOL", "sol"),
            ("STANDX_API_URL", "http://perps.local"),
            ("STANDX_AUTH_URL", ""),
        ])));
        assert_eq!(config.trading.symbol, "sol");
        assert_eq!(config.exchange.perps_url, "http://perps.local");
        assert_eq!(config.exchange.auth_url, "https://api.standx.com");

        config.apply_cli(CliOverrides {
            auth_mode: Some(AuthMode::Token),
            symbol: Some("btc".to_string()),
            order_size: Some(dec!(0.01)),
            spread_bps: Some(dec!(7.5)),
        });
        let run = config.resolve().unwrap();
        assert_eq!(config.auth.mode, AuthMode::Token);
        assert_eq!(run.symbol.as_str(), "BTC-USD");
        assert_eq!(run.order_size, Size::new(dec!(0.01)));
        assert_eq!(run.quote.spread_bps, dec!(7.5));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases: Vec<(&str, Box<dyn Fn(&mut AppConfig)>)> = vec![
            ("zero spread", Box::new(|c: &mut AppConfig| c.quoting.spread_bps = dec!(0))),
            ("spread at ceiling", Box::new(|c: &mut AppConfig| c.quoting.spread_bps = dec!(10))),
            ("negative size", Box::new(|c: &mut AppConfig| c.trading.order_size = dec!(-1))),
            ("zero refresh", Box::new(|c: &mut AppConfig| c.runner.refresh_interval_secs = 0)),
            ("backoff not shorter", Box::new(|c: &mut AppConfig| c.runner.error_backoff_secs = 30)),
            ("zero sweep timeout", Box::new(|c: &mut AppConfig| c.runner.shutdown_timeout_secs = 0)),
            ("low decimals past scale", Box::new(|c: &mut AppConfig| c.quoting.low_price_decimals = 29)),
            ("high decimals past scale", Box::new(|c: &mut AppConfig| c.quoting.high_price_decimals = 40)),
        ];
        for (name, mutate) in cases {
            let mut config = AppConfig::default();
            mutate(&mut config);
            assert!(
                matches!(config.resolve(), Err(ConfigError::Invalid(_))),
                "{name} should be rejected"
            );
        }

        let mut config = AppConfig::default();
        config.quoting.low_price_decimals = 28;
        config.quoting.high_price_decimals = 28;
        assert!(config.resolve().is_ok());

        let mut config = AppConfig::default();
        config.trading.symbol = "  ".to_string();
        assert!(matches!(config.resolve(), Err(ConfigError::Symbol(_))));
    }

    #[test]
    fn test_wallet_credentials() {
        let strategy = credentials_from_lookup(
            AuthMode::Wallet,
            Chain::Bsc,
            env(&[("WALLET_PRIVATE_KEY", "0xabc"), ("STANDX_API_TOKEN", "unused")]),
        )
        .unwrap();
        match strategy {
            CredentialStrategy::Wallet { private_key, chain } => {
                assert_eq!(private_key.as_str(), "0xabc");
                assert_eq!(chain, Chain::Bsc);
            }
            other => panic!("unexpected strategy: {other:?}"),
        }
    }

    #[test]
    fn test_token_credentials_require_both_values() {
        let err = credentials_from_lookup(
            AuthMode::Token,
            Chain::Bsc,
            env(&[("STANDX_API_TOKEN", "jwt")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(ENV_API_KEY)));

        let strategy = credentials_from_lookup(
            AuthMode::Token,
            Chain::Bsc,
            env(&[("STANDX_API_TOKEN", "jwt"), ("STANDX_API_KEY", "key")]),
        )
        .unwrap();
        assert_eq!(strategy.mode(), "token");
    }

    #[test]
    fn test_blank_credential_is_missing() {
        let err = credentials_from_lookup(
            AuthMode::Wallet,
            Chain::Bsc,
            env(&[("WALLET_PRIVATE_KEY", "   ")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(ENV_WALLET_PRIVATE_KEY)));
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = toml::to_string(&AppConfig::default()).unwrap();
        assert!(toml_str.contains("[trading]"));
        assert!(toml_str.contains("refresh_interval_secs"));
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let shipped = AppConfig::from_toml(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(
            shipped.resolve().unwrap(),
            AppConfig::default().resolve().unwrap()
        );
        assert_eq!(shipped.auth.mode, AuthMode::Wallet);
        assert_eq!(shipped.exchange.perps_url, default_perps_url());
    }
}
