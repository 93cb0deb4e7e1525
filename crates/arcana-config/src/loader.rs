// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./arcana.toml` > `~/.config/arcana/arcana.toml` > `/etc/arcana/arcana.toml`
//! with environment variable overrides via `ARCANA_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ArcanaConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/arcana/arcana.toml` (system-wide)
/// 3. `~/.config/arcana/arcana.toml` (user XDG config)
/// 4. `./arcana.toml` (local directory)
/// 5. `ARCANA_*` environment variables
pub fn load_config() -> Result<ArcanaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ArcanaConfig::default()))
        .merge(Toml::file("/etc/arcana/arcana.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("arcana/arcana.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("arcana.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<ArcanaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ArcanaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ArcanaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ArcanaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `ARCANA_SECURITY_MAX_QUESTION_LENGTH`
/// must map to `security.max_question_length`, not `security.max.question.length`.
fn env_provider() -> Env {
    Env::prefixed("ARCANA_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: ARCANA_GATEWAY_AUTH_TOKEN -> "gateway_auth_token"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("credits_", "credits.", 1)
            .replacen("security_", "security.", 1)
            .replacen("engine_", "engine.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("providers_anthropic_", "providers.anthropic.", 1)
            .replacen("providers_gemini_", "providers.gemini.", 1)
            .replacen("providers_", "providers.", 1);
        mapped.into()
    })
}
