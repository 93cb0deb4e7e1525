// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `arcana serve` command implementation.
//!
//! Wires storage, security gate, provider chain, batch poller, and HTTP
//! gateway together, then runs until SIGINT/SIGTERM. Shutdown order:
//! stop accepting requests, drain the poller, checkpoint and close the
//! database.

use std::sync::Arc;
use std::time::Instant;

use arcana_config::ArcanaConfig;
use arcana_core::ArcanaError;
use arcana_engine::{build_chain, install_signal_handler, ProgressBroker, ProviderHealth, ReadingProcessor};
use arcana_gate::SecurityGate;
use arcana_gateway::GatewayState;
use arcana_storage::{CreditLedger, Database, ReadingStore};
use tracing::{error, info, warn};

use crate::telemetry;

/// Runs the `arcana serve` command.
pub async fn run_serve(config: ArcanaConfig) -> Result<(), ArcanaError> {
    telemetry::init_tracing(&config.agent.log_level);
    info!(name = %config.agent.name, "starting arcana serve");

    // Metrics are optional; the service runs without a recorder.
    let prometheus_render = match telemetry::install_prometheus() {
        Ok(render) => Some(render),
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    };

    let db = Database::open(&config.storage).await?;

    let store = ReadingStore::new(db.clone());
    let ledger = CreditLedger::new(db.clone());

    // Crash recovery must run before the poller can claim anything.
    store.recover_stalled().await?;

    let gate = Arc::new(SecurityGate::new(config.security.clone()));

    let chain = build_chain(&config.providers)?;
    let providers: Vec<&'static str> = chain.iter().map(|p| p.name()).collect();

    let broker = ProgressBroker::new();
    let health = ProviderHealth::new();
    let processor = ReadingProcessor::new(
        store.clone(),
        ledger.clone(),
        chain,
        broker.clone(),
        health.clone(),
        config.engine.clone(),
    );

    let cancel = install_signal_handler();

    let poller = {
        let processor = processor.clone();
        let poll_cancel = cancel.clone();
        tokio::spawn(async move {
            processor.run(poll_cancel).await;
        })
    };
    info!(
        batch_size = config.engine.batch_size,
        poll_interval_ms = config.engine.poll_interval_ms,
        concurrency = config.engine.concurrency,
        "batch poller started"
    );

    let state = GatewayState {
        db: db.clone(),
        store,
        ledger,
        gate,
        broker,
        health,
        providers,
        running: processor.running_flag(),
        credits: config.credits.clone(),
        engine: config.engine.clone(),
        start_time: Instant::now(),
        prometheus_render,
    };

    let served = arcana_gateway::serve(&config.gateway, state, cancel.clone()).await;

    // Stop the poller whether the gateway exited cleanly or not, and let
    // in-flight readings finish before storage goes away.
    cancel.cancel();
    if let Err(e) = poller.await {
        error!(error = %e, "poller task panicked");
    }

    db.close().await?;
    served?;

    info!("arcana serve shutdown complete");
    Ok(())
}
