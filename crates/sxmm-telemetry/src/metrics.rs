//! Prometheus metrics for the market maker.
//!
//! Covers the quoting cycle end to end:
//! - Cycle outcomes and duration
//! - Cancel sweeps (batch / per-order fallback) and cancel failures
//! - Inventory flatten attempts
//! - Order placements per side
//! - Last mark price per symbol
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    Encoder, GaugeVec, Histogram, IntCounter, IntCounterVec, TextEncoder,
};

use crate::error::TelemetryResult;

/// Completed quoting cycles.
/// Labels: outcome (ok/partial/aborted/panicked)
pub static CYCLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sxmm_cycles_total",
        "Total quoting cycles by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Cycle duration in milliseconds.
pub static CYCLE_DURATION_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "sxmm_cycle_duration_ms",
        "Quoting cycle duration in milliseconds",
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Orders cancelled.
/// Labels: mode (batch/individual)
pub static ORDERS_CANCELLED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sxmm_orders_cancelled_total",
        "Total orders cancelled by cancel mode",
        &["mode"]
    )
    .unwrap()
});

/// Individual cancel failures (after batch fallback).
pub static CANCEL_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "sxmm_cancel_failures_total",
        "Total orders that could not be cancelled"
    )
    .unwrap()
});

/// Reduce-only flatten attempts.
/// Labels: side (buy/sell), outcome (submitted/failed)
pub static FLATTEN_ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sxmm_flatten_attempts_total",
        "Total reduce-only flatten attempts",
        &["side", "outcome"]
    )
    .unwrap()
});

/// Resting order placements.
/// Labels: side (buy/sell), outcome (accepted/rejected)
pub static ORDERS_PLACED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sxmm_orders_placed_total",
        "Total resting order placements",
        &["side", "outcome"]
    )
    .unwrap()
});

/// Last fetched mark price.
pub static MARK_PRICE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("sxmm_mark_price", "Last fetched mark price", &["symbol"]).unwrap()
});

/// Shutdown cancel sweeps performed.
pub static SHUTDOWN_SWEEPS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "sxmm_shutdown_sweeps_total",
        "Total shutdown cancel sweeps"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a finished cycle.
    pub fn cycle_finished(outcome: &str, duration_ms: f64) {
        CYCLES_TOTAL.with_label_values(&[outcome]).inc();
        CYCLE_DURATION_MS.observe(duration_ms);
    }

    /// Record a tick that panicked before producing an outcome.
    pub fn cycle_panicked() {
        CYCLES_TOTAL.with_label_values(&["panicked"]).inc();
    }

    /// Record cancelled orders.
    pub fn orders_cancelled(mode: &str, count: usize) {
        ORDERS_CANCELLED_TOTAL
            .with_label_values(&[mode])
            .inc_by(count as u64);
    }

    /// Record orders left uncancelled.
    pub fn cancel_failures(count: usize) {
        CANCEL_FAILURES_TOTAL.inc_by(count as u64);
    }

    /// Record a flatten attempt.
    pub fn flatten_attempt(side: &str, outcome: &str) {
        FLATTEN_ATTEMPTS_TOTAL
            .with_label_values(&[side, outcome])
            .inc();
    }

    /// Record a resting order placement.
    pub fn order_placed(side: &str, outcome: &str) {
        ORDERS_PLACED_TOTAL
            .with_label_values(&[side, outcome])
            .inc();
    }

    /// Update mark price.
    pub fn mark_price(symbol: &str, price: f64) {
        MARK_PRICE.with_label_values(&[symbol]).set(price);
    }

    /// Record a shutdown sweep.
    pub fn shutdown_sweep() {
        SHUTDOWN_SWEEPS_TOTAL.inc();
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
