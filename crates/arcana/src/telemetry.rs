// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracing and metrics setup for the serve loop.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Collected
//! metrics are rendered in Prometheus text format by the gateway's
//! `/metrics` endpoint.

use std::sync::Arc;

use arcana_core::ArcanaError;
use arcana_gateway::PrometheusRender;
use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("arcana={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

/// Installs the Prometheus recorder and registers metric descriptions.
///
/// Only one recorder can be installed per process. Returns the render
/// function handed to the gateway state.
pub fn install_prometheus() -> Result<PrometheusRender, ArcanaError> {
    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        ArcanaError::Internal(format!("failed to install Prometheus recorder: {e}"))
    })?;

    register_metrics();
    info!("prometheus metrics recorder installed");

    Ok(Arc::new(move || handle.render()) as PrometheusRender)
}

/// Register all Arcana metric descriptions.
///
/// Called once at startup after the recorder is installed.
fn register_metrics() {
    describe_counter!(
        "arcana_readings_submitted_total",
        "Readings accepted for processing"
    );
    describe_counter!(
        "arcana_readings_claimed_total",
        "Readings claimed by the batch processor"
    );
    describe_counter!(
        "arcana_readings_completed_total",
        "Readings completed successfully"
    );
    describe_counter!("arcana_readings_failed_total", "Readings that failed");
    describe_counter!("arcana_readings_retried_total", "Failed readings requeued");
    describe_counter!(
        "arcana_provider_calls_total",
        "Provider invocations by provider and outcome"
    );
    describe_counter!("arcana_gate_screened_total", "Questions screened");
    describe_counter!(
        "arcana_gate_blocked_total",
        "Questions blocked by risk level"
    );
}
