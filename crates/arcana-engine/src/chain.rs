// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider chain construction.
//!
//! The chain is an ordered list: the configured default backend first, the
//! fallback (if any) second. The processor tries each in order, once, so a
//! reading makes at most `chain.len()` generation attempts per cycle.

use std::sync::Arc;

use tracing::info;

use arcana_anthropic::AnthropicProvider;
use arcana_config::model::ProvidersConfig;
use arcana_core::{ArcanaError, Provider};
use arcana_gemini::GeminiProvider;

/// Instantiates a single backend by its configured name.
pub fn build_provider(
    name: &str,
    config: &ProvidersConfig,
) -> Result<Arc<dyn Provider>, ArcanaError> {
    match name {
        "anthropic" => Ok(Arc::new(AnthropicProvider::from_config(&config.anthropic)?)),
        "gemini" => Ok(Arc::new(GeminiProvider::from_config(&config.gemini)?)),
        other => Err(ArcanaError::Config(format!(
            "unknown provider \"{other}\"; expected \"anthropic\" or \"gemini\""
        ))),
    }
}

/// Builds the failover chain from [`ProvidersConfig`].
///
/// Disabled backends are skipped; a fallback equal to the default is
/// ignored. An empty chain is a configuration error since the service
/// could never complete a reading.
pub fn build_chain(config: &ProvidersConfig) -> Result<Vec<Arc<dyn Provider>>, ArcanaError> {
    let mut names: Vec<&str> = vec![config.default.as_str()];
    if let Some(fallback) = config.fallback.as_deref() {
        if fallback != config.default {
            names.push(fallback);
        }
    }

    let mut chain: Vec<Arc<dyn Provider>> = Vec::with_capacity(names.len());
    for name in names {
        if !provider_enabled(name, config) {
            info!(provider = name, "provider disabled, skipping");
            continue;
        }
        chain.push(build_provider(name, config)?);
    }

    if chain.is_empty() {
        return Err(ArcanaError::Config(
            "provider chain is empty; enable at least one provider".to_string(),
        ));
    }

    let names: Vec<&str> = chain.iter().map(|p| p.name()).collect();
    info!(chain = %names.join(" -> "), "provider chain built");
    Ok(chain)
}

fn provider_enabled(name: &str, config: &ProvidersConfig) -> bool {
    match name {
        "anthropic" => config.anthropic.enabled,
        "gemini" => config.gemini.enabled,
        // Unknown names fall through to build_provider, which rejects them.
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed_config() -> ProvidersConfig {
        let mut config = ProvidersConfig::default();
        config.anthropic.api_key = Some("test-key".to_string());
        config.gemini.api_key = Some("test-key".to_string());
        config
    }

    #[test]
    fn chain_orders_default_then_fallback() {
        let chain = build_chain(&keyed_config()).unwrap();
        let names: Vec<&str> = chain.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["anthropic", "gemini"]);
    }

    #[test]
    fn disabled_fallback_is_skipped() {
        let mut config = keyed_config();
        config.gemini.enabled = false;
        let chain = build_chain(&config).unwrap();
        let names: Vec<&str> = chain.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["anthropic"]);
    }

    #[test]
    fn fallback_equal_to_default_is_ignored() {
        let mut config = keyed_config();
        config.fallback = Some("anthropic".to_string());
        let chain = build_chain(&config).unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn no_fallback_yields_single_entry() {
        let mut config = keyed_config();
        config.fallback = None;
        let chain = build_chain(&config).unwrap();
        let names: Vec<&str> = chain.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["anthropic"]);
    }

    #[test]
    fn gemini_can_lead_the_chain() {
        let mut config = keyed_config();
        config.default = "gemini".to_string();
        config.fallback = Some("anthropic".to_string());
        let chain = build_chain(&config).unwrap();
        let names: Vec<&str> = chain.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["gemini", "anthropic"]);
    }

    #[test]
    fn unknown_provider_name_is_rejected() {
        let mut config = keyed_config();
        config.default = "oracle".to_string();
        let err = build_chain(&config).unwrap_err();
        assert!(matches!(err, ArcanaError::Config(_)));
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn all_disabled_is_a_config_error() {
        let mut config = keyed_config();
        config.anthropic.enabled = false;
        config.gemini.enabled = false;
        let err = build_chain(&config).unwrap_err();
        assert!(matches!(err, ArcanaError::Config(_)));
    }
}
