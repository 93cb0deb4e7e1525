// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude backend for reading generation.
//!
//! Implements [`Provider`] over the Messages API. Model, temperature, and
//! token limit come from configuration at construction time, so the engine
//! can replay the same request against another backend on failover.

pub mod client;
pub mod types;

use async_trait::async_trait;
use tracing::info;

use arcana_config::model::AnthropicConfig;
use arcana_core::{ArcanaError, Provider, ProviderRequest, ProviderResponse, Role, TokenUsage};

use crate::client::AnthropicClient;
use crate::types::{ApiMessage, MessageRequest, ResponseContentBlock};

/// Anthropic Claude provider.
///
/// API key resolution order: config, then `ANTHROPIC_API_KEY`, then error.
pub struct AnthropicProvider {
    client: AnthropicClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Creates a provider from its configuration section.
    pub fn from_config(config: &AnthropicConfig) -> Result<Self, ArcanaError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let client = AnthropicClient::new(&api_key, &config.api_version)?;

        info!(model = %config.model, "anthropic provider initialized");

        Ok(Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    #[cfg(test)]
    fn with_client(client: AnthropicClient, model: &str) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.8,
            max_tokens: 1024,
        }
    }

    fn to_message_request(&self, request: &ProviderRequest) -> MessageRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| ApiMessage {
                role: role_str(m.role).into(),
                content: m.content.clone(),
            })
            .collect();

        MessageRequest {
            model: self.model.clone(),
            messages,
            system: request.system_prompt.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn invoke(&self, request: ProviderRequest) -> Result<ProviderResponse, ArcanaError> {
        let api_request = self.to_message_request(&request);
        let response = self.client.complete_message(&api_request).await?;

        let content = response
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text.as_str()),
                ResponseContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        // An empty interpretation is a failed generation; let the chain
        // fall back instead of completing the reading with nothing.
        if content.is_empty() {
            return Err(ArcanaError::Provider {
                provider: self.name().into(),
                message: "response contained no text content".into(),
                source: None,
            });
        }

        Ok(ProviderResponse {
            content,
            model: response.model,
            usage: TokenUsage::new(response.usage.input_tokens, response.usage.output_tokens),
        })
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Resolves the API key from config or environment.
fn resolve_api_key(config_key: Option<&str>) -> Result<String, ArcanaError> {
    if let Some(key) = config_key {
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }

    std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
        ArcanaError::Config(
            "Anthropic API key not found. Set providers.anthropic.api_key in config or ANTHROPIC_API_KEY environment variable.".into(),
        )
    })
}
