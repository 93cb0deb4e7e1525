// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Arcana reading service.

use thiserror::Error;

use crate::types::RiskLevel;

/// The primary error type used across all Arcana crates.
#[derive(Debug, Error)]
pub enum ArcanaError {
    /// Configuration errors (invalid TOML, missing required fields, unknown provider names).
    #[error("configuration error: {0}")]
    Config(String),

    /// Structural input validation failures (empty, too long, non-question content).
    /// Rejected before any debit, so there is never ledger impact.
    #[error("validation error: {0}")]
    Validation(String),

    /// The security gate classified the input as blocked.
    /// Rejected before any debit; logged as a security event.
    #[error("request blocked by security gate ({risk} risk)")]
    SecurityBlocked {
        risk: RiskLevel,
        reasons: Vec<String>,
    },

    /// The user's balance cannot cover the reading cost.
    #[error("insufficient credits: need {required}, have {available}")]
    InsufficientCredits { required: i64, available: i64 },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A single generative backend call failed (API error, quota, malformed response).
    /// Triggers failover to the next provider in the chain.
    #[error("provider {provider} error: {message}")]
    Provider {
        provider: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Every provider in the chain failed; the job fails and the debit is refunded.
    #[error("all {attempts} providers exhausted")]
    ProvidersExhausted { attempts: usize },

    /// A conditional claim lost the race: the reading was no longer PENDING.
    /// Not a failure; the worker skips the job and continues the batch.
    #[error("claim conflict: reading {reading_id} is no longer pending")]
    ClaimConflict { reading_id: String },

    /// A refund was attempted for a reading with no outstanding debit.
    /// The original refund stands; the duplicate is rejected.
    #[error("refund conflict: reading {reading_id} has no outstanding debit")]
    RefundConflict { reading_id: String },

    /// No reading exists with the given id.
    #[error("reading {reading_id} not found")]
    NotFound { reading_id: String },

    /// The reading has been retried as many times as the configuration allows.
    #[error("reading {reading_id} reached its retry limit ({retry_count} attempts)")]
    RetryLimit {
        reading_id: String,
        retry_count: u32,
    },

    /// A retry was requested before the cooldown elapsed.
    #[error("retry not allowed yet: {remaining_secs}s of cooldown remaining")]
    RetryCooldown { remaining_secs: u64 },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
