// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Arcana reading service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Arcana configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ArcanaConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Credit pricing settings.
    #[serde(default)]
    pub credits: CreditsConfig,

    /// Security gate settings.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Batch processor settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Generative backend settings.
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the service instance.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "arcana".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("arcana").join("arcana.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("arcana.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Credit pricing configuration.
///
/// The reading cost is deterministic and auditable:
/// `base_cost + per_card_cost * card_count`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreditsConfig {
    /// Flat cost charged for every reading.
    #[serde(default = "default_base_cost")]
    pub base_cost: i64,

    /// Additional cost per drawn card.
    #[serde(default = "default_per_card_cost")]
    pub per_card_cost: i64,
}

impl CreditsConfig {
    /// Cost of a reading with the given card count.
    pub fn cost_for(&self, card_count: u32) -> i64 {
        self.base_cost + self.per_card_cost * i64::from(card_count)
    }
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self {
            base_cost: default_base_cost(),
            per_card_cost: default_per_card_cost(),
        }
    }
}

fn default_base_cost() -> i64 {
    10
}

fn default_per_card_cost() -> i64 {
    5
}

/// Security gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// Minimum accepted question length in characters (after trimming).
    #[serde(default = "default_min_question_length")]
    pub min_question_length: usize,

    /// Maximum accepted question length in characters.
    #[serde(default = "default_max_question_length")]
    pub max_question_length: usize,

    /// Minimum share of alphabetic characters among the non-whitespace
    /// content of a question. Rejects pure symbol/number noise.
    #[serde(default = "default_min_alpha_ratio")]
    pub min_alpha_ratio: f64,

    /// How long a user's flagged submissions stay in the suspicion window.
    #[serde(default = "default_history_window_secs")]
    pub history_window_secs: u64,

    /// Accumulated suspicion score at which a clean-looking message from a
    /// recently flagged user is escalated one risk level.
    #[serde(default = "default_history_escalation_threshold")]
    pub history_escalation_threshold: f64,

    /// Maximum flagged entries retained per user in the window.
    #[serde(default = "default_history_max_entries")]
    pub history_max_entries: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            min_question_length: default_min_question_length(),
            max_question_length: default_max_question_length(),
            min_alpha_ratio: default_min_alpha_ratio(),
            history_window_secs: default_history_window_secs(),
            history_escalation_threshold: default_history_escalation_threshold(),
            history_max_entries: default_history_max_entries(),
        }
    }
}

fn default_min_question_length() -> usize {
    3
}

fn default_max_question_length() -> usize {
    500
}

fn default_min_alpha_ratio() -> f64 {
    0.5
}

fn default_history_window_secs() -> u64 {
    600
}

fn default_history_escalation_threshold() -> f64 {
    2.0
}

fn default_history_max_entries() -> usize {
    20
}

/// Batch processor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum pending readings claimed per poll cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Sleep between poll cycles in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Readings processed in parallel within one batch. At 1, processing
    /// order matches submission order exactly.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Timeout applied to every single provider call.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// How many times a failed reading may be explicitly retried before it
    /// is permanently abandoned.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Minimum wait between a failure and a retry request for the same reading.
    #[serde(default = "default_retry_cooldown_secs")]
    pub retry_cooldown_secs: u64,

    /// Estimated wall-clock seconds one reading spends in generation; used
    /// for the wait estimate returned at submit time.
    #[serde(default = "default_per_reading_secs")]
    pub per_reading_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
            concurrency: default_concurrency(),
            provider_timeout_secs: default_provider_timeout_secs(),
            max_retries: default_max_retries(),
            retry_cooldown_secs: default_retry_cooldown_secs(),
            per_reading_secs: default_per_reading_secs(),
        }
    }
}

fn default_batch_size() -> usize {
    5
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_concurrency() -> usize {
    2
}

fn default_provider_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_cooldown_secs() -> u64 {
    300
}

fn default_per_reading_secs() -> u64 {
    8
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on `/api/*` routes. `None` disables auth.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Allowed CORS origins. Empty means same-origin only.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            auth_token: None,
            cors_origins: Vec::new(),
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    7878
}

/// Generative backend configuration.
///
/// Selection order is `[default, fallback]`, skipping disabled entries.
/// These values are loaded once and are immutable for the process lifetime.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    /// Name of the primary provider ("anthropic" or "gemini").
    #[serde(default = "default_primary_provider")]
    pub default: String,

    /// Name of the fallback provider. `None` disables failover.
    #[serde(default = "default_fallback_provider")]
    pub fallback: Option<String>,

    /// Anthropic backend settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Gemini backend settings.
    #[serde(default)]
    pub gemini: GeminiConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default: default_primary_provider(),
            fallback: default_fallback_provider(),
            anthropic: AnthropicConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

fn default_primary_provider() -> String {
    "anthropic".to_string()
}

fn default_fallback_provider() -> Option<String> {
    Some("gemini".to_string())
}

/// Anthropic backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Whether this backend participates in the provider chain.
    #[serde(default = "default_provider_enabled")]
    pub enabled: bool,

    /// Anthropic API key. `None` requires an environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for reading interpretations.
    #[serde(default = "default_anthropic_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            enabled: default_provider_enabled(),
            api_key: None,
            model: default_anthropic_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
        }
    }
}

/// Gemini backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeminiConfig {
    /// Whether this backend participates in the provider chain.
    #[serde(default = "default_provider_enabled")]
    pub enabled: bool,

    /// Google AI API key. `None` requires an environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for reading interpretations.
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            enabled: default_provider_enabled(),
            api_key: None,
            model: default_gemini_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_provider_enabled() -> bool {
    true
}

fn default_anthropic_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}
