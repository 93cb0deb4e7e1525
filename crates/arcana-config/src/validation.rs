// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as provider name references, bounded ratios, and
//! non-zero batch settings.

use crate::diagnostic::ConfigError;
use crate::model::ArcanaConfig;

const KNOWN_PROVIDERS: &[&str] = &["anthropic", "gemini"];
const KNOWN_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ArcanaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !KNOWN_LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "agent.log_level `{}` is not one of {}",
                config.agent.log_level,
                KNOWN_LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.gateway.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    } else {
        let host = config.gateway.host.trim();
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("gateway.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.credits.base_cost < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "credits.base_cost must be non-negative, got {}",
                config.credits.base_cost
            ),
        });
    }

    if config.credits.per_card_cost < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "credits.per_card_cost must be non-negative, got {}",
                config.credits.per_card_cost
            ),
        });
    }

    if config.credits.base_cost == 0 && config.credits.per_card_cost == 0 {
        errors.push(ConfigError::Validation {
            message: "credits pricing must charge something: base_cost and per_card_cost are both 0"
                .to_string(),
        });
    }

    if config.security.min_question_length == 0 {
        errors.push(ConfigError::Validation {
            message: "security.min_question_length must be at least 1".to_string(),
        });
    }

    if config.security.max_question_length <= config.security.min_question_length {
        errors.push(ConfigError::Validation {
            message: format!(
                "security.max_question_length ({}) must exceed min_question_length ({})",
                config.security.max_question_length, config.security.min_question_length
            ),
        });
    }

    if !(0.0..=1.0).contains(&config.security.min_alpha_ratio) {
        errors.push(ConfigError::Validation {
            message: format!(
                "security.min_alpha_ratio must be within 0.0..=1.0, got {}",
                config.security.min_alpha_ratio
            ),
        });
    }

    if config.engine.batch_size == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.batch_size must be at least 1".to_string(),
        });
    }

    if config.engine.concurrency == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.concurrency must be at least 1".to_string(),
        });
    }

    if config.engine.poll_interval_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.poll_interval_ms must be at least 1".to_string(),
        });
    }

    if config.engine.provider_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.provider_timeout_secs must be at least 1".to_string(),
        });
    }

    validate_providers(config, &mut errors);

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn validate_providers(config: &ArcanaConfig, errors: &mut Vec<ConfigError>) {
    let providers = &config.providers;

    if !KNOWN_PROVIDERS.contains(&providers.default.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "providers.default `{}` is not a known provider ({})",
                providers.default,
                KNOWN_PROVIDERS.join(", ")
            ),
        });
    }

    if let Some(fallback) = &providers.fallback {
        if !KNOWN_PROVIDERS.contains(&fallback.as_str()) {
            errors.push(ConfigError::Validation {
                message: format!(
                    "providers.fallback `{fallback}` is not a known provider ({})",
                    KNOWN_PROVIDERS.join(", ")
                ),
            });
        } else if *fallback == providers.default {
            errors.push(ConfigError::Validation {
                message: "providers.fallback must differ from providers.default".to_string(),
            });
        }
    }

    if providers.anthropic.model.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "providers.anthropic.model must not be empty".to_string(),
        });
    }

    if providers.gemini.model.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "providers.gemini.model must not be empty".to_string(),
        });
    }

    if !(0.0..=1.0).contains(&providers.anthropic.temperature) {
        errors.push(ConfigError::Validation {
            message: format!(
                "providers.anthropic.temperature must be within 0.0..=1.0, got {}",
                providers.anthropic.temperature
            ),
        });
    }

    if !(0.0..=2.0).contains(&providers.gemini.temperature) {
        errors.push(ConfigError::Validation {
            message: format!(
                "providers.gemini.temperature must be within 0.0..=2.0, got {}",
                providers.gemini.temperature
            ),
        });
    }

    if providers.anthropic.max_tokens == 0 {
        errors.push(ConfigError::Validation {
            message: "providers.anthropic.max_tokens must be at least 1".to_string(),
        });
    }

    if providers.gemini.max_tokens == 0 {
        errors.push(ConfigError::Validation {
            message: "providers.gemini.max_tokens must be at least 1".to_string(),
        });
    }
}
