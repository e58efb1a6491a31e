//! Metrics registration, following the teacher's `performance` module's
//! use of `metrics` + `metrics-exporter-prometheus`. Ambient observability
//! (not one of spec.md's Non-goals, which exclude account management and
//! a backtesting UI, not counters).

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Installs the recorder and hands back the render handle instead of
/// letting the builder self-host its own exporter socket: `api.rs` wants
/// `/metrics` to live on the same axum router as `/healthz`.
pub fn install() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install prometheus recorder: {e}"))?;

    metrics::describe_counter!("feed_frames_received_total", "Inbound frames received by kind");
    metrics::describe_counter!("feed_frames_discarded_total", "Malformed inbound frames discarded");
    metrics::describe_counter!("candles_completed_total", "Completed candles per timeframe");
    metrics::describe_counter!("detector_fires_total", "Detector emissions per pattern");
    metrics::describe_counter!("scores_rejected_total", "Scoring rejections per reason");
    metrics::describe_counter!("commands_sent_total", "Commands sent per type");
    metrics::describe_counter!("commands_retried_total", "Command retries per type");
    metrics::describe_counter!("commands_dropped_total", "Commands dropped after exhausting retries");
    metrics::describe_counter!("sentry_violations_total", "Sentry safety violations per type");
    metrics::describe_gauge!("sentry_bad_exit_streak", "Current consecutive bad-exit streak");
    metrics::describe_counter!("auto_disable_flips_total", "Hybrid feature auto-disable flips");

    Ok(handle)
}
