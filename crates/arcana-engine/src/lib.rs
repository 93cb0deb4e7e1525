// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading generation engine for the Arcana service.
//!
//! The [`ReadingProcessor`] is the central coordinator that:
//! - Polls the store for pending readings in submission order
//! - Claims each reading and drives it through the pipeline steps
//! - Calls the provider chain with per-call timeouts and one-shot failover
//! - Persists the terminal outcome and refunds failed attempts
//! - Fans progress frames out to SSE subscribers via the [`ProgressBroker`]

pub mod chain;
pub mod health;
pub mod processor;
pub mod progress;
pub mod prompt;
pub mod shutdown;

pub use chain::{build_chain, build_provider};
pub use health::ProviderHealth;
pub use processor::{estimate_wait_secs, BatchSummary, ReadingProcessor};
pub use progress::ProgressBroker;
pub use shutdown::install_signal_handler;
