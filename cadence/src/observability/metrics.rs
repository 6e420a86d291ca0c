//! Metrics collection for `Cadence`.
//!
//! Prometheus-compatible counters and gauges for sequencer activity, with
//! typed convenience functions so call sites never spell metric names.
//! Every function is a no-op until [`init_metrics`] installs a recorder.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::CadenceError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Maximum length for phase name labels.
const MAX_PHASE_LABEL_LEN: usize = 64;

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `CadenceError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), CadenceError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| CadenceError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "cadence_phases_applied_total",
        "Phase effects applied to a display state"
    );
    describe_counter!(
        "cadence_cycles_total",
        "Passes that completed their hold"
    );
    describe_counter!(
        "cadence_resets_total",
        "Display states restored to their initial value"
    );
    describe_counter!(
        "cadence_effect_failures_total",
        "Phase effects that failed"
    );
    describe_counter!(
        "cadence_stale_fires_total",
        "Transitions dropped after their instance or epoch ended"
    );
    describe_counter!(
        "cadence_timers_cancelled_total",
        "Pending transitions cancelled"
    );
    describe_gauge!(
        "cadence_active_instances",
        "Mounted sequencer instances"
    );
}

/// Records one applied phase effect.
pub fn record_phase_applied(phase: &str) {
    counter!("cadence_phases_applied_total", "phase" => sanitize_phase_label(phase)).increment(1);
}

/// Records a completed pass.
pub fn record_cycle_completed() {
    counter!("cadence_cycles_total").increment(1);
}

/// Records a display reset.
pub fn record_reset() {
    counter!("cadence_resets_total").increment(1);
}

/// Records a failed effect.
pub fn record_effect_failure() {
    counter!("cadence_effect_failures_total").increment(1);
}

/// Records a dropped stale transition.
pub fn record_stale_fire() {
    counter!("cadence_stale_fires_total").increment(1);
}

/// Records cancelled pending transitions.
pub fn record_timers_cancelled(count: usize) {
    counter!("cadence_timers_cancelled_total").increment(count as u64);
}

/// Increments the mounted-instance gauge.
pub fn record_instance_mounted() {
    gauge!("cadence_active_instances").increment(1.0);
}

/// Decrements the mounted-instance gauge.
pub fn record_instance_unmounted() {
    gauge!("cadence_active_instances").decrement(1.0);
}

/// Truncates and replaces characters invalid in Prometheus labels.
///
/// Phase names come from sequence files.
fn sanitize_phase_label(name: &str) -> String {
    name.chars()
        .take(MAX_PHASE_LABEL_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
