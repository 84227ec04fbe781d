//! Prometheus metrics collection for rankbot.
//!
//! Metrics are exposed on the `/metrics` HTTP endpoint (see [`crate::http`])
//! when a metrics port is configured.
//!
//! - `rankbot_messages_total{kind}` - Incoming messages by kind (text, prompt, command)
//! - `rankbot_command_total{command}` - Commands dispatched
//! - `rankbot_command_duration_seconds{command}` - End-to-end dispatch latency
//! - `rankbot_command_errors_total{command,error}` - Dispatch failures by error code
//! - `rankbot_xp_awarded_total` - XP granted across all users
//! - `rankbot_rank_changes_total{tier}` - Rank-ups by new tier

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::{Once, OnceLock};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Incoming messages by kind.
pub static MESSAGES: OnceLock<IntCounterVec> = OnceLock::new();

/// Commands dispatched, by canonical name.
pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Command errors by command and error code.
pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Total XP awarded.
pub static XP_AWARDED: OnceLock<IntCounter> = OnceLock::new();

/// Rank changes by new tier.
pub static RANK_CHANGES: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Dispatch latency by command.
pub static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Call at startup before any metrics are recorded; until then every
/// recording helper is a no-op. Later calls do nothing.
pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let r = registry();

        // Helper macro to register metric
        macro_rules! register {
            ($metric:ident, $init:expr) => {
                let m = $init.expect(concat!(stringify!($metric), " creation failed"));
                if let Err(e) = r.register(Box::new(m.clone())) {
                    tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                }
                let _ = $metric.set(m);
            };
        }

        register!(MESSAGES, IntCounterVec::new(Opts::new("rankbot_messages_total", "Incoming messages by kind"), &["kind"]));
        register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("rankbot_command_total", "Commands dispatched"), &["command"]));
        register!(COMMAND_LATENCY, HistogramVec::new(
            HistogramOpts::new("rankbot_command_duration_seconds", "Command dispatch latency")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["command"]));
        register!(COMMAND_ERRORS, IntCounterVec::new(Opts::new("rankbot_command_errors_total", "Command errors by code"), &["command", "error"]));
        register!(XP_AWARDED, IntCounter::new("rankbot_xp_awarded_total", "XP awarded"));
        register!(RANK_CHANGES, IntCounterVec::new(Opts::new("rankbot_rank_changes_total", "Rank changes by new tier"), &["tier"]));
    });
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

/// Record an incoming message.
#[inline]
pub fn record_message(kind: &str) {
    if let Some(c) = MESSAGES.get() {
        c.with_label_values(&[kind]).inc();
    }
}

/// Record a command execution with latency.
#[inline]
pub fn record_command(command: &str, duration_secs: f64) {
    if let Some(c) = COMMAND_COUNTER.get() {
        c.with_label_values(&[command]).inc();
    }
    if let Some(h) = COMMAND_LATENCY.get() {
        h.with_label_values(&[command]).observe(duration_secs);
    }
}

/// Record a command error.
#[inline]
pub fn record_command_error(command: &str, error: &str) {
    if let Some(c) = COMMAND_ERRORS.get() {
        c.with_label_values(&[command, error]).inc();
    }
}

/// Record awarded XP.
#[inline]
pub fn record_xp(amount: u64) {
    if let Some(c) = XP_AWARDED.get() {
        c.inc_by(amount);
    }
}

/// Record a rank change into `tier`.
#[inline]
pub fn record_rank_change(tier: &str) {
    if let Some(c) = RANK_CHANGES.get() {
        c.with_label_values(&[tier]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_lifecycle() {
        init();

        record_message("command");
        record_command("rank", 0.001);
        record_command_error("rank", "execution_failed");
        record_xp(3);
        record_rank_change("Apprentice");

        let output = gather_metrics();
        assert!(output.contains("rankbot_messages_total"));
        assert!(output.contains("rankbot_command_total"));
        assert!(output.contains("rankbot_command_duration_seconds"));
        assert!(output.contains("rankbot_command_errors_total"));
        assert!(output.contains("rankbot_xp_awarded_total"));
        assert!(output.contains("rankbot_rank_changes_total"));
    }
}
