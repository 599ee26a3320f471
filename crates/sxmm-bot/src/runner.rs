//! Bot lifecycle.
//!
//! ```text
//! Starting ──auth ok──> Running ──interrupt / failure budget──> Stopping ──> Stopped
//!    │
//!    └──auth failed──> Fatal
//! ```
//!
//! - Ticks run one at a time; the next tick starts only after the previous
//!   one finished and the refresh interval (or, after a failed tick, the
//!   shorter error backoff) elapsed.
//! - Each tick runs in its own task so a panic is contained and treated
//!   as a failed tick.
//! - An interrupt aborts the in-flight tick instead of waiting for it.
//! - Stopping performs exactly one cancel sweep, bounded by a timeout,
//!   whenever credentials were established.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sxmm_gateway::{Authenticator, CredentialStrategy, ExchangeGateway};
use sxmm_mm::{CycleReport, QuotingCycle};
use sxmm_telemetry::Metrics;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::error::RunnerError;

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    Running,
    Stopping,
    Stopped,
    /// Setup failed; no order was placed and no sweep ran.
    Fatal,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Summary of a finished run.
#[derive(Debug)]
pub struct RunOutcome {
    pub state: RunState,
    /// Ticks that ran to an outcome (including failed ones).
    pub ticks: u64,
    pub failed_ticks: u64,
    /// Orders cancelled by the shutdown sweep; `None` if the sweep did not
    /// run or timed out.
    pub swept_orders: Option<usize>,
    /// Number of shutdown sweeps started (0 or 1).
    pub sweeps: u32,
    pub error: Option<RunnerError>,
}

impl RunOutcome {
    /// Process exit code: 0 for a clean stop, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.state == RunState::Stopped && self.error.is_none() {
            0
        } else {
            1
        }
    }
}

/// How one tick ended.
enum TickResult {
    Completed(CycleReport),
    Failed(String),
    Interrupted,
}

/// Owns the run: credentials, tick scheduling and shutdown.
pub struct BotRunner<G: ?Sized, A: ?Sized> {
    gateway: Arc<G>,
    authenticator: Arc<A>,
    config: RunConfig,
    shutdown: CancellationToken,
    state: RunState,
}

impl<G, A> BotRunner<G, A>
where
    G: ExchangeGateway + ?Sized + 'static,
    A: Authenticator + ?Sized,
{
    pub fn new(
        gateway: Arc<G>,
        authenticator: Arc<A>,
        config: RunConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            authenticator,
            config,
            shutdown,
            state: RunState::Starting,
        }
    }

    /// Run until interrupted or stopped by an unrecoverable error.
    pub async fn run(mut self, credentials: CredentialStrategy) -> RunOutcome {
        let mut outcome = RunOutcome {
            state: RunState::Starting,
            ticks: 0,
            failed_ticks: 0,
            swept_orders: None,
            sweeps: 0,
            error: None,
        };

        info!(
            symbol = %self.config.symbol,
            mode = credentials.mode(),
            "Starting market maker"
        );

        let auth = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                info!("Interrupted before authentication completed");
                self.transition(RunState::Stopped);
                outcome.state = self.state;
                return outcome;
            }
            result = self.authenticator.authenticate(&credentials) => result,
        };

        let auth = match auth {
            Ok(auth) => Arc::new(auth),
            Err(e) => {
                error!(error = %e, "Authentication failed");
                self.transition(RunState::Fatal);
                outcome.state = self.state;
                outcome.error = Some(RunnerError::Setup(e));
                return outcome;
            }
        };
        drop(credentials);

        info!(
            account = %auth.account_label(),
            token = %auth.token_preview(),
            "Authenticated"
        );

        let cycle = QuotingCycle::new(
            Arc::clone(&self.gateway),
            Arc::clone(&auth),
            self.config.cycle_settings(),
        );

        self.transition(RunState::Running);
        let stop_error = self.tick_loop(&cycle, &mut outcome).await;
        outcome.error = stop_error;

        self.transition(RunState::Stopping);
        outcome.sweeps += 1;
        outcome.swept_orders = self.shutdown_sweep(&cycle).await;

        self.transition(RunState::Stopped);
        outcome.state = self.state;

        match Metrics::render() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => warn!(error = %e, "Failed to render metrics"),
        }
        info!(
            ticks = outcome.ticks,
            failed_ticks = outcome.failed_ticks,
            swept = ?outcome.swept_orders,
            "Market maker stopped"
        );
        outcome
    }

    /// Returns the error that ended the loop, or `None` on interrupt.
    async fn tick_loop(
        &self,
        cycle: &QuotingCycle<G>,
        outcome: &mut RunOutcome,
    ) -> Option<RunnerError> {
        let mut consecutive_failures: u32 = 0;

        loop {
            if self.shutdown.is_cancelled() {
                return None;
            }

            let delay = match self.run_tick(cycle).await {
                TickResult::Interrupted => return None,
                TickResult::Completed(report) => {
                    outcome.ticks += 1;
                    consecutive_failures = 0;
                    debug!(
                        tick = outcome.ticks,
                        cancelled = report.cancel.cancelled,
                        clean = report.is_clean(),
                        "Tick complete"
                    );
                    self.config.refresh_interval
                }
                TickResult::Failed(reason) => {
                    outcome.ticks += 1;
                    outcome.failed_ticks += 1;
                    consecutive_failures += 1;
                    warn!(
                        error = %reason,
                        consecutive_failures,
                        backoff_secs = self.config.error_backoff.as_secs(),
                        "Tick failed, backing off"
                    );

                    let budget = self.config.max_consecutive_failures;
                    if budget > 0 && consecutive_failures >= budget {
                        error!(consecutive_failures, "Failure budget exhausted, stopping");
                        return Some(RunnerError::Unrecoverable(format!(
                            "{consecutive_failures} consecutive failed ticks (last: {reason})"
                        )));
                    }
                    self.config.error_backoff
                }
            };

            if !self.sleep_or_shutdown(delay).await {
                return None;
            }
        }
    }

    async fn run_tick(&self, cycle: &QuotingCycle<G>) -> TickResult {
        let task_cycle = cycle.clone();
        let mut handle = tokio::spawn(async move { task_cycle.run_once().await });

        tokio::select! {
            _ = self.shutdown.cancelled() => {
                info!("Interrupt received, aborting in-flight tick");
                handle.abort();
                // Wait until the task is gone so nothing it sends can land
                // after the shutdown sweep.
                let _ = handle.await;
                TickResult::Interrupted
            }
            joined = &mut handle => match joined {
                Ok(Ok(report)) => TickResult::Completed(report),
                Ok(Err(e)) => TickResult::Failed(e.to_string()),
                Err(e) => TickResult::Failed(describe_join_error(e)),
            },
        }
    }

    /// Sleep for `delay`; returns false if shutdown was requested first.
    async fn sleep_or_shutdown(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn shutdown_sweep(&self, cycle: &QuotingCycle<G>) -> Option<usize> {
        let symbol = cycle.symbol();
        info!(%symbol, "Cancelling all open orders before exit");
        Metrics::shutdown_sweep();

        match tokio::time::timeout(
            self.config.shutdown_timeout,
            cycle.reconciler().cancel_all(symbol),
        )
        .await
        {
            Ok(report) => {
                info!(
                    %symbol,
                    cancelled = report.cancelled,
                    failed = report.failed.len(),
                    mode = %report.mode,
                    "Shutdown sweep complete"
                );
                Some(report.cancelled)
            }
            Err(_) => {
                error!(
                    %symbol,
                    timeout_secs = self.config.shutdown_timeout.as_secs(),
                    "Shutdown sweep timed out, orders may remain open"
                );
                None
            }
        }
    }

    fn transition(&mut self, next: RunState) {
        info!(from = %self.state, to = %next, "Run state");
        self.state = next;
    }
}

fn describe_join_error(e: JoinError) -> String {
    if e.is_panic() {
        Metrics::cycle_panicked();
        let payload = e.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!(panic = %message, "Tick panicked");
        format!("tick panicked: {message}")
    } else {
        format!("tick task failed: {e}")
    }
}
