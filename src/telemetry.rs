//! Bridges dispatcher events into Prometheus metrics.

use crate::metrics;
use rankbot_core::{DispatchError, DispatchObserver, RankChange};
use std::time::Duration;

/// Label used for every command name that did not resolve, so typos cannot
/// grow label cardinality.
const UNKNOWN_COMMAND: &str = "unknown";

/// [`DispatchObserver`] recording into the global metrics registry.
pub struct PrometheusObserver;

impl DispatchObserver for PrometheusObserver {
    fn message_received(&self, kind: &'static str) {
        metrics::record_message(kind);
    }

    fn command_finished(&self, command: &str, elapsed: Duration, error: Option<&DispatchError>) {
        let command = match error {
            Some(DispatchError::UnknownCommand(_)) => UNKNOWN_COMMAND,
            _ => command,
        };
        metrics::record_command(command, elapsed.as_secs_f64());
        if let Some(e) = error {
            metrics::record_command_error(command, e.error_code());
        }
    }

    fn xp_awarded(&self, amount: u64) {
        metrics::record_xp(amount);
    }

    fn rank_changed(&self, change: &RankChange) {
        metrics::record_rank_change(change.tier().name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_commands_share_a_label() {
        metrics::init();
        let observer = PrometheusObserver;

        observer.command_finished(
            "definitely-not-a-command",
            Duration::from_millis(1),
            Some(&DispatchError::UnknownCommand("definitely-not-a-command".into())),
        );
        observer.command_finished("hi", Duration::from_millis(2), None);

        let output = metrics::gather_metrics();
        assert!(!output.contains("definitely-not-a-command"));
        assert!(output.contains(r#"command="unknown",error="unknown_command""#));
        assert!(output.contains(r#"rankbot_command_total{command="hi"}"#));
    }
}
