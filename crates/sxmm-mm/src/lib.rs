//! Quoting cycle for the StandX market maker.
//!
//! One tick of the bot:
//!
//! ```text
//! mark price ──> compute_quotes ──> OrderReconciler::cancel_all
//!                                      ──> InventoryGuard::flatten_if_needed
//!                                           ──> place bid, place ask
//! ```
//!
//! Only the mark price fetch can abort a tick. Every later step reports an
//! explicit outcome value and never stops the steps after it.

pub mod config;
pub mod cycle;
pub mod error;
pub mod inventory;
pub mod quote_engine;
pub mod reconciler;

pub use config::{CycleSettings, QuoteConfig};
pub use cycle::{CycleReport, PlacementOutcome, QuotingCycle};
pub use error::{CycleError, QuoteError};
pub use inventory::{FlattenOutcome, InventoryGuard};
pub use quote_engine::{compute_quotes, precision_for};
pub use reconciler::{CancelMode, CancelReport, OrderReconciler};
