// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider trait for generative backend integrations (Anthropic, Gemini).

use async_trait::async_trait;

use crate::error::ArcanaError;
use crate::types::{ProviderRequest, ProviderResponse};

/// A generative backend capable of producing reading interpretations.
///
/// Variants are interchangeable: the engine builds an ordered chain from
/// configuration and falls back exactly once when the primary fails.
/// Implementations must not retry unboundedly; latency and cost stay bounded
/// because the engine wraps every call in a timeout.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable name used by the factory and by configuration ("anthropic", "gemini").
    fn name(&self) -> &'static str;

    /// Sends one completion request and returns the full response.
    async fn invoke(&self, request: ProviderRequest) -> Result<ProviderResponse, ArcanaError>;
}

impl std::fmt::Debug for dyn Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider").field("name", &self.name()).finish()
    }
}
