// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Threat analysis and structural question validation.

use arcana_config::model::SecurityConfig;
use arcana_core::{ArcanaError, RiskLevel};
use unicode_normalization::UnicodeNormalization;

use crate::catalogue::SIGNATURES;

/// Verdict of one threat screen.
#[derive(Debug, Clone)]
pub struct SecurityAnalysis {
    pub risk_level: RiskLevel,
    pub is_blocked: bool,
    /// Labels of the matched catalogue signatures, deduplicated.
    pub detected_patterns: Vec<&'static str>,
    /// Normalised, whitespace-collapsed, length-clamped text. This is what
    /// gets persisted and sent to providers.
    pub sanitized_content: String,
    /// Confidence in the verdict (0.0-1.0).
    pub confidence: f64,
    pub reasons: Vec<String>,
    /// Aggregate signature weight; feeds the per-user suspicion history.
    pub score: f64,
}

/// Zero-width and directional-control characters stripped before matching
/// and persistence.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
    ) || (c.is_control() && !c.is_whitespace())
}

/// NFKC-normalise, strip invisible characters, collapse whitespace, and
/// clamp to `max_chars`.
pub fn sanitize(text: &str, max_chars: usize) -> String {
    let normalized: String = text.nfkc().filter(|c| !is_invisible(*c)).collect();
    let collapsed = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_chars).collect()
}

fn risk_for_score(score: f64) -> RiskLevel {
    if score >= 2.0 {
        RiskLevel::Critical
    } else if score >= 1.0 {
        RiskLevel::High
    } else if score > 0.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Screen a question against the signature catalogue.
///
/// Pure and synchronous; no I/O. History-based escalation lives in
/// [`SecurityGate::screen`].
///
/// [`SecurityGate::screen`]: crate::SecurityGate::screen
pub fn analyze(text: &str, config: &SecurityConfig) -> SecurityAnalysis {
    let sanitized = sanitize(text, config.max_question_length);

    let mut score = 0.0;
    let mut detected: Vec<&'static str> = Vec::new();
    let mut reasons: Vec<String> = Vec::new();

    for signature in SIGNATURES.iter() {
        if signature.pattern.is_match(&sanitized) {
            score += signature.weight;
            if !detected.contains(&signature.label) {
                detected.push(signature.label);
            }
            reasons.push(format!("matched {} signature", signature.label));
        }
    }

    // Structural abuse: one token dominating a long message.
    let tokens: Vec<String> = sanitized
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();
    if tokens.len() >= 20 {
        let mut counts = std::collections::HashMap::new();
        for token in &tokens {
            *counts.entry(token.as_str()).or_insert(0usize) += 1;
        }
        let max_count = counts.values().copied().max().unwrap_or(0);
        if max_count as f64 / tokens.len() as f64 > 0.4 {
            score += 0.8;
            detected.push("abusive_repetition");
            reasons.push("single token dominates the message".to_string());
        }
    }

    let risk_level = risk_for_score(score);
    let confidence = if detected.is_empty() {
        0.95
    } else {
        (0.55 + 0.12 * score).min(0.99)
    };

    SecurityAnalysis {
        risk_level,
        is_blocked: risk_level == RiskLevel::Critical,
        detected_patterns: detected,
        sanitized_content: sanitized,
        confidence,
        reasons,
        score,
    }
}

/// Structural validation, independent of the threat screen.
///
/// Runs on the raw text so an over-long question is rejected rather than
/// silently clamped. Both this and [`analyze`] must pass before a job is
/// created or credits are touched.
pub fn validate_tarot_question(text: &str, config: &SecurityConfig) -> Result<(), ArcanaError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ArcanaError::Validation(
            "question must not be empty".to_string(),
        ));
    }

    let chars = trimmed.chars().count();
    if chars < config.min_question_length {
        return Err(ArcanaError::Validation(format!(
            "question too short: {chars} characters, minimum is {}",
            config.min_question_length
        )));
    }
    if chars > config.max_question_length {
        return Err(ArcanaError::Validation(format!(
            "question too long: {chars} characters, maximum is {}",
            config.max_question_length
        )));
    }

    let non_ws = trimmed.chars().filter(|c| !c.is_whitespace()).count();
    let alpha = trimmed.chars().filter(|c| c.is_alphabetic()).count();
    if non_ws > 0 && (alpha as f64 / non_ws as f64) < config.min_alpha_ratio {
        return Err(ArcanaError::Validation(
            "question must be mostly text, not symbols".to_string(),
        ));
    }

    Ok(())
}
