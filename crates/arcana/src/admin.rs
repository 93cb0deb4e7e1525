// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `arcana config` and `arcana grant` command implementations.

use arcana_config::ArcanaConfig;
use arcana_core::ArcanaError;
use arcana_storage::{CreditLedger, Database};

/// Runs `arcana config validate`.
///
/// Validation already happened during startup loading; reaching this
/// point means the configuration is sound.
pub fn run_config_validate(config: &ArcanaConfig) -> Result<(), ArcanaError> {
    println!("configuration valid");
    println!("  agent.name   = {}", config.agent.name);
    println!("  storage.path = {}", config.storage.database_path);
    match config.providers.fallback {
        Some(ref fallback) => {
            println!("  providers    = {} -> {fallback}", config.providers.default)
        }
        None => println!("  providers    = {}", config.providers.default),
    }
    Ok(())
}

/// Runs `arcana config show`: prints the resolved configuration as TOML.
pub fn run_config_show(config: &ArcanaConfig) -> Result<(), ArcanaError> {
    let rendered = toml::to_string_pretty(&redacted(config))
        .map_err(|e| ArcanaError::Internal(format!("failed to render config: {e}")))?;
    print!("{rendered}");
    Ok(())
}

/// Copy of the configuration with secrets blanked, safe to print.
fn redacted(config: &ArcanaConfig) -> ArcanaConfig {
    let mut shown = config.clone();
    if shown.providers.anthropic.api_key.is_some() {
        shown.providers.anthropic.api_key = Some("[redacted]".to_string());
    }
    if shown.providers.gemini.api_key.is_some() {
        shown.providers.gemini.api_key = Some("[redacted]".to_string());
    }
    if shown.gateway.auth_token.is_some() {
        shown.gateway.auth_token = Some("[redacted]".to_string());
    }
    shown
}

/// Runs `arcana grant`: credits a user's account directly in storage.
pub async fn run_grant(
    config: &ArcanaConfig,
    user: &str,
    amount: i64,
    note: Option<&str>,
) -> Result<(), ArcanaError> {
    let db = Database::open(&config.storage).await?;
    let ledger = CreditLedger::new(db.clone());
    let balance = ledger.grant(user, amount, note).await?;
    db.close().await?;
    println!("granted {amount} credits to {user} (balance: {balance})");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_show_redacts_secrets() {
        let mut config = ArcanaConfig::default();
        config.providers.anthropic.api_key = Some("sk-ant-secret".to_string());
        config.gateway.auth_token = Some("gateway-secret".to_string());

        let rendered = toml::to_string_pretty(&redacted(&config)).unwrap();

        assert!(!rendered.contains("sk-ant-secret"));
        assert!(!rendered.contains("gateway-secret"));
        assert!(rendered.contains("[redacted]"));
        // Non-secret values pass through untouched.
        assert!(rendered.contains("arcana"));
    }

    #[test]
    fn redaction_leaves_unset_secrets_unset() {
        let config = ArcanaConfig::default();
        let shown = redacted(&config);
        assert!(shown.providers.anthropic.api_key.is_none());
        assert!(shown.gateway.auth_token.is_none());
    }

    #[tokio::test]
    async fn grant_writes_through_to_the_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ArcanaConfig::default();
        config.storage.database_path = dir
            .path()
            .join("arcana.db")
            .to_string_lossy()
            .into_owned();

        run_grant(&config, "user-1", 50, Some("promo")).await.unwrap();

        let db = Database::open(&config.storage).await.unwrap();
        let ledger = CreditLedger::new(db.clone());
        assert_eq!(ledger.balance("user-1").await.unwrap(), 50);
        db.close().await.unwrap();
    }
}
