// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Gemini backend for reading generation.
//!
//! Implements [`Provider`] over the generateContent API. Like the Anthropic
//! backend, generation parameters are captured from configuration at
//! construction; the conversation maps onto Gemini roles ("assistant"
//! becomes "model").

pub mod client;
pub mod types;

use async_trait::async_trait;
use tracing::info;

use arcana_config::model::GeminiConfig;
use arcana_core::{ArcanaError, Provider, ProviderRequest, ProviderResponse, Role, TokenUsage};

use crate::client::GeminiClient;
use crate::types::{Content, GenerateContentRequest, GenerationConfig};

/// Google Gemini provider.
///
/// API key resolution order: config, then `GEMINI_API_KEY`, then error.
pub struct GeminiProvider {
    client: GeminiClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GeminiProvider {
    /// Creates a provider from its configuration section.
    pub fn from_config(config: &GeminiConfig) -> Result<Self, ArcanaError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let client = GeminiClient::new(&api_key)?;

        info!(model = %config.model, "gemini provider initialized");

        Ok(Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    #[cfg(test)]
    fn with_client(client: GeminiClient, model: &str) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    fn to_generate_request(&self, request: &ProviderRequest) -> GenerateContentRequest {
        let contents = request
            .messages
            .iter()
            .map(|m| Content::text(Some(role_str(m.role)), m.content.clone()))
            .collect();

        GenerateContentRequest {
            system_instruction: request
                .system_prompt
                .as_ref()
                .map(|prompt| Content::text(None, prompt.clone())),
            contents,
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn invoke(&self, request: ProviderRequest) -> Result<ProviderResponse, ArcanaError> {
        let api_request = self.to_generate_request(&request);
        let response = self.client.generate_content(&self.model, &api_request).await?;

        let content = response
            .candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        // No candidate or an empty candidate means the generation was
        // blocked or produced nothing; let the chain fall back.
        if content.is_empty() {
            return Err(ArcanaError::Provider {
                provider: self.name().into(),
                message: "response contained no text content".into(),
                source: None,
            });
        }

        Ok(ProviderResponse {
            content,
            model: response
                .model_version
                .unwrap_or_else(|| self.model.clone()),
            usage: TokenUsage::new(
                response.usage_metadata.prompt_token_count,
                response.usage_metadata.candidates_token_count,
            ),
        })
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

/// Resolves the API key from config or environment.
fn resolve_api_key(config_key: Option<&str>) -> Result<String, ArcanaError> {
    if let Some(key) = config_key {
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }

    std::env::var("GEMINI_API_KEY").map_err(|_| {
        ArcanaError::Config(
            "Gemini API key not found. Set providers.gemini.api_key in config or GEMINI_API_KEY environment variable.".into(),
        )
    })
}
