// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Arcana reading service.
//!
//! This crate provides the shared error type, the domain types for reading
//! jobs, progress events, and security verdicts, and the `Provider` trait
//! implemented by the generative backend crates.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ArcanaError;
pub use traits::Provider;
pub use types::{
    ChatMessage, ProgressErrorEvent, ProgressEvent, ProgressFrame, ProviderRequest,
    ProviderResponse, Reading, ReadingStatus, ReadingStep, RiskLevel, Role, TokenUsage,
};
