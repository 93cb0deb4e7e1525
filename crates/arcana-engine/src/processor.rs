// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch reading processor.
//!
//! The processor polls the store for pending readings, claims each one,
//! and drives it through the generation pipeline: draw a spread, build
//! the prompt, call the provider chain, persist the result. Every claimed
//! reading ends terminal within the same cycle; failures refund the
//! submit-time debit. Errors never escape a cycle, so one poisoned
//! reading cannot stop the poller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use arcana_config::model::EngineConfig;
use arcana_core::{
    ArcanaError, Provider, ProviderRequest, ProviderResponse, Reading, ReadingStep, TokenUsage,
};
use arcana_deck::DrawnCard;
use arcana_storage::{CreditLedger, ReadingStore};

use crate::health::ProviderHealth;
use crate::progress::ProgressBroker;
use crate::prompt;

/// Error message stored on the reading row and surfaced to the client.
/// Provider and infrastructure detail stays in the logs.
const FAILURE_MESSAGE: &str = "The reading could not be completed. Your credits have been refunded.";

/// Counts for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Stored result payload, serialized into `readings.result_payload`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadingResult<'a> {
    cards: &'a [DrawnCard],
    interpretation: &'a str,
    provider: &'a str,
    model: &'a str,
    usage: TokenUsage,
}

struct GenerationOutcome {
    provider: &'static str,
    response: ProviderResponse,
}

/// Queue wait estimate for a freshly accepted reading.
///
/// `position` is 1-based; the reading drains after `ceil(position /
/// batch_size)` poll cycles plus its own generation time.
pub fn estimate_wait_secs(position: u64, config: &EngineConfig) -> u64 {
    let batch = config.batch_size.max(1) as u64;
    let cycles = position.div_ceil(batch);
    cycles * (config.poll_interval_ms / 1000) + config.per_reading_secs
}

#[derive(Clone)]
pub struct ReadingProcessor {
    store: ReadingStore,
    ledger: CreditLedger,
    chain: Vec<Arc<dyn Provider>>,
    broker: ProgressBroker,
    health: ProviderHealth,
    config: EngineConfig,
    running: Arc<AtomicBool>,
}

impl ReadingProcessor {
    pub fn new(
        store: ReadingStore,
        ledger: CreditLedger,
        chain: Vec<Arc<dyn Provider>>,
        broker: ProgressBroker,
        health: ProviderHealth,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            chain,
            broker,
            health,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag that is true while [`run`](Self::run) is polling.
    /// The stats endpoint reports its inverse as `paused`.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Poll loop. Runs until `cancel` fires; the current batch always
    /// finishes before the loop exits, so no reading is left mid-flight.
    pub async fn run(&self, cancel: CancellationToken) {
        self.running.store(true, Ordering::SeqCst);
        info!(
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval_ms,
            concurrency = self.config.concurrency,
            "reading processor started"
        );

        loop {
            let summary = self.process_pending().await;
            if summary.processed > 0 {
                info!(
                    processed = summary.processed,
                    successful = summary.successful,
                    failed = summary.failed,
                    "poll cycle complete"
                );
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutdown requested, stopping reading processor");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)) => {}
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("reading processor stopped");
    }

    /// Processes one batch of pending readings.
    ///
    /// Fetches up to `batch_size` rows in submission order and drives them
    /// with at most `concurrency` in flight. At concurrency 1 this
    /// preserves strict FIFO. Fetch errors produce an empty summary.
    pub async fn process_pending(&self) -> BatchSummary {
        let pending = match self.store.fetch_pending(self.config.batch_size as u32).await {
            Ok(rows) => rows,
            Err(err) => {
                error!(error = %err, "failed to fetch pending readings");
                return BatchSummary::default();
            }
        };
        if pending.is_empty() {
            return BatchSummary::default();
        }
        debug!(count = pending.len(), "claimed batch of pending readings");

        let concurrency = self.config.concurrency.max(1);
        let results: Vec<bool> = futures::stream::iter(pending.into_iter().map(|reading| {
            let processor = self.clone();
            async move { processor.process_reading(&reading.id).await }
        }))
        .buffer_unordered(concurrency)
        .collect()
        .await;

        let successful = results.iter().filter(|ok| **ok).count();
        BatchSummary {
            processed: results.len(),
            successful,
            failed: results.len() - successful,
        }
    }

    /// Drives one reading to a terminal state. Returns whether it
    /// completed successfully. Never propagates an error; a lost claim
    /// (another worker got there first) is logged and skipped.
    pub async fn process_reading(&self, reading_id: &str) -> bool {
        let reading = match self.store.claim(reading_id).await {
            Ok(reading) => reading,
            Err(ArcanaError::ClaimConflict { .. }) => {
                debug!(reading_id, "claim lost, skipping");
                return false;
            }
            Err(err) => {
                error!(reading_id, error = %err, "failed to claim reading");
                return false;
            }
        };
        metrics::counter!("arcana_readings_claimed_total").increment(1);

        let completed = match self.generate(&reading).await {
            Ok((spread, outcome)) => self.finish_success(&reading, &spread, outcome).await,
            Err((step, err)) => {
                self.finish_failure(&reading, step, &err).await;
                false
            }
        };

        self.broker.finish(reading_id);
        completed
    }

    /// Runs the pipeline up to and including generation, emitting a
    /// progress frame per step. On error, reports the step that failed.
    async fn generate(
        &self,
        reading: &Reading,
    ) -> Result<(Vec<DrawnCard>, GenerationOutcome), (ReadingStep, ArcanaError)> {
        let id = reading.id.as_str();

        self.broker
            .emit_step(id, ReadingStep::Validating, "validating reading request");

        self.broker.emit_step(
            id,
            ReadingStep::SelectingCards,
            format!("drawing {} cards", reading.card_count),
        );
        let spread = {
            let mut rng = rand::thread_rng();
            arcana_deck::draw(reading.card_count, &mut rng)
        };

        self.broker
            .emit_step(id, ReadingStep::Analyzing, "studying the spread");
        let request = prompt::build_prompt(&reading.question, &spread);

        self.broker
            .emit_step(id, ReadingStep::Generating, "consulting the cards");
        let outcome = self
            .invoke_chain(id, &request)
            .await
            .map_err(|err| (ReadingStep::Generating, err))?;

        Ok((spread, outcome))
    }

    /// Tries each provider in chain order, once, with the configured
    /// timeout per call. The first success wins; each failure or timeout
    /// falls through to the next entry.
    async fn invoke_chain(
        &self,
        reading_id: &str,
        request: &ProviderRequest,
    ) -> Result<GenerationOutcome, ArcanaError> {
        let timeout = Duration::from_secs(self.config.provider_timeout_secs);
        let mut attempts = 0usize;

        for provider in &self.chain {
            attempts += 1;
            let name = provider.name();
            debug!(reading_id, provider = name, "invoking provider");

            match tokio::time::timeout(timeout, provider.invoke(request.clone())).await {
                Ok(Ok(response)) => {
                    self.health.mark(name, true);
                    metrics::counter!(
                        "arcana_provider_calls_total",
                        "provider" => name,
                        "outcome" => "ok"
                    )
                    .increment(1);
                    return Ok(GenerationOutcome {
                        provider: name,
                        response,
                    });
                }
                Ok(Err(err)) => {
                    self.health.mark(name, false);
                    metrics::counter!(
                        "arcana_provider_calls_total",
                        "provider" => name,
                        "outcome" => "error"
                    )
                    .increment(1);
                    warn!(reading_id, provider = name, error = %err, "provider call failed");
                }
                Err(_) => {
                    self.health.mark(name, false);
                    metrics::counter!(
                        "arcana_provider_calls_total",
                        "provider" => name,
                        "outcome" => "timeout"
                    )
                    .increment(1);
                    warn!(
                        reading_id,
                        provider = name,
                        timeout_secs = self.config.provider_timeout_secs,
                        "provider call timed out"
                    );
                }
            }
        }

        Err(ArcanaError::ProvidersExhausted { attempts })
    }

    /// Persists the result and emits the final two steps. A serialization
    /// failure at this point is treated like any other generation failure
    /// so the client still gets a refund.
    async fn finish_success(
        &self,
        reading: &Reading,
        spread: &[DrawnCard],
        outcome: GenerationOutcome,
    ) -> bool {
        let id = reading.id.as_str();
        self.broker
            .emit_step(id, ReadingStep::Finalizing, "recording the reading");

        let result = ReadingResult {
            cards: spread,
            interpretation: &outcome.response.content,
            provider: outcome.provider,
            model: &outcome.response.model,
            usage: outcome.response.usage,
        };
        let payload = match serde_json::to_string(&result) {
            Ok(payload) => payload,
            Err(err) => {
                let err = ArcanaError::Internal(format!("result serialization failed: {err}"));
                self.finish_failure(reading, ReadingStep::Finalizing, &err).await;
                return false;
            }
        };

        match self.store.complete(id, &payload).await {
            Ok(applied) => {
                if !applied {
                    warn!(reading_id = id, "reading already terminal, keeping first result");
                    return false;
                }
                metrics::counter!("arcana_readings_completed_total").increment(1);
                info!(
                    reading_id = id,
                    provider = outcome.provider,
                    model = %outcome.response.model,
                    total_tokens = outcome.response.usage.total_tokens,
                    "reading completed"
                );
                self.broker
                    .emit_step(id, ReadingStep::Completed, "reading complete");
                true
            }
            Err(err) => {
                // The row stays in processing; startup recovery resets it.
                error!(reading_id = id, error = %err, "failed to record completion");
                self.broker
                    .emit_error(id, ReadingStep::Finalizing, FAILURE_MESSAGE);
                false
            }
        }
    }

    /// Marks the reading failed, refunds the attempt's debit, and emits
    /// the terminal error frame. A refund that was already applied for
    /// this attempt is logged and tolerated.
    async fn finish_failure(&self, reading: &Reading, step: ReadingStep, err: &ArcanaError) {
        let id = reading.id.as_str();
        warn!(reading_id = id, step = ?step, error = %err, "reading failed");
        metrics::counter!("arcana_readings_failed_total").increment(1);

        match self.store.fail(id, FAILURE_MESSAGE).await {
            Ok(true) => {
                let reason = format!("refund:attempt-{}", reading.retry_count);
                match self.ledger.refund(&reading.user_id, id, &reason).await {
                    Ok(amount) => {
                        info!(reading_id = id, user_id = %reading.user_id, amount, "credits refunded")
                    }
                    Err(ArcanaError::RefundConflict { .. }) => {
                        warn!(reading_id = id, %reason, "refund already applied for this attempt")
                    }
                    Err(refund_err) => {
                        error!(reading_id = id, error = %refund_err, "refund failed")
                    }
                }
            }
            Ok(false) => {
                warn!(reading_id = id, "reading already terminal, first outcome stands")
            }
            Err(store_err) => {
                error!(reading_id = id, error = %store_err, "failed to record failure")
            }
        }

        self.broker.emit_error(id, step, FAILURE_MESSAGE);
    }
}
