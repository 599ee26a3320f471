//! Single-account StandX perpetuals market maker.
//!
//! - `config`: TOML file + environment + CLI resolved once into `RunConfig`
//! - `runner`: `BotRunner` state machine (tick scheduling, shutdown sweep)
//! - `check`: read-only connection check

pub mod check;
pub mod config;
pub mod error;
pub mod runner;

pub use check::{connection_check, CheckReport};
pub use config::{AppConfig, AuthMode, CliOverrides, EnvOverrides, RunConfig};
pub use error::{ConfigError, ConfigResult, RunnerError};
pub use runner::{BotRunner, RunOutcome, RunState};
