//! StandX perpetuals market maker - entry point.
//!
//! Quotes one symbol on both sides of the mark price, refreshing every
//! interval. Ctrl+C (or SIGTERM) stops the loop and cancels every resting
//! order before exit.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rust_decimal::Decimal;
use sxmm_bot::config::DEFAULT_CONFIG_PATH;
use sxmm_bot::{connection_check, AppConfig, AuthMode, BotRunner, CliOverrides, EnvOverrides};
use sxmm_gateway::{Authenticator, StandxAuthClient, StandxClient};
use sxmm_telemetry::{init_logging, LogFormat};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// StandX perpetuals market maker
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "SXMM_CONFIG")]
    config: Option<String>,

    /// Credential source
    #[arg(long, value_enum)]
    auth_mode: Option<AuthMode>,

    /// Symbol to quote (e.g. BTC-USD)
    #[arg(long)]
    symbol: Option<String>,

    /// Order size per side, in base units
    #[arg(long)]
    order_size: Option<Decimal>,

    /// Half-spread around the mark price, in basis points
    #[arg(long)]
    spread_bps: Option<Decimal>,

    /// Verify credentials and print account state, then exit without trading
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let mut config = AppConfig::load(&config_path)?;
    config.apply_env(EnvOverrides::from_env());
    config.apply_cli(CliOverrides {
        auth_mode: args.auth_mode,
        symbol: args.symbol.clone(),
        order_size: args.order_size,
        spread_bps: args.spread_bps,
    });

    init_logging(LogFormat::resolve(config.logging.format))?;
    info!(version = env!("CARGO_PKG_VERSION"), config_path = %config_path, "Starting sxmm-bot");

    let run_config = config.resolve()?;
    let credentials = config.credentials()?;
    info!(
        symbol = %run_config.symbol,
        order_size = %run_config.order_size,
        spread_bps = %run_config.quote.spread_bps,
        auth_mode = credentials.mode(),
        refresh_secs = run_config.refresh_interval.as_secs(),
        "Configuration loaded"
    );

    let gateway = Arc::new(
        StandxClient::with_timeout(
            config.exchange.perps_url.clone(),
            Duration::from_secs(config.exchange.request_timeout_secs),
        )
        .context("failed to build exchange client")?,
    );
    let authenticator = Arc::new(
        StandxAuthClient::new(config.exchange.auth_url.clone())
            .context("failed to build auth client")?,
    );

    if args.check {
        let auth = authenticator.authenticate(&credentials).await?;
        info!(account = auth.account_label(), token = %auth.token_preview(), "Authenticated");
        let report = connection_check(gateway.as_ref(), &auth, &run_config.symbol).await?;
        info!(
            balance = %report.balance,
            open_orders = report.open_orders.len(),
            positions = report.positions.len(),
            "Connection check passed"
        );
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let runner = BotRunner::new(gateway, authenticator, run_config, shutdown);
    let outcome = runner.run(credentials).await;

    let code = outcome.exit_code();
    info!(
        state = %outcome.state,
        ticks = outcome.ticks,
        failed_ticks = outcome.failed_ticks,
        swept_orders = ?outcome.swept_orders,
        exit_code = code,
        "Bot stopped"
    );
    if let Some(error) = &outcome.error {
        warn!(error = %error, "Run ended with error");
    }
    std::process::exit(code);
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM.
async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C"),
                    _ = term.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl+C");
                }
            }
        }
    }
    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C");
        }
    }
    shutdown.cancel();
}
