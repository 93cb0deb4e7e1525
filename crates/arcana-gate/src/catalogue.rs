// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed catalogue of prompt-injection and jailbreak signatures.
//!
//! Patterns run against NFKC-normalised text with invisible characters
//! stripped, so homoglyph and zero-width tricks do not slip past them.
//! Weights aggregate into the risk score: a single 2.0 signature is enough
//! to block, 1.x signatures flag HIGH on their own, sub-1.0 signatures need
//! company.

use std::sync::LazyLock;

use regex::Regex;

/// One weighted threat signature.
pub struct ThreatSignature {
    pub label: &'static str,
    pub weight: f64,
    pub pattern: Regex,
}

fn sig(label: &'static str, weight: f64, pattern: &str) -> ThreatSignature {
    ThreatSignature {
        label,
        weight,
        pattern: Regex::new(pattern).expect("invalid threat signature pattern"),
    }
}

pub(crate) static SIGNATURES: LazyLock<Vec<ThreatSignature>> = LazyLock::new(|| {
    vec![
        // "ignore/disregard ... previous/all ... instructions/rules"
        sig(
            "instruction_override",
            2.0,
            r"(?i)\b(ignore|disregard|forget|override|bypass)\b[\s\S]{0,40}\b(previous|prior|above|earlier|all|your)\b[\s\S]{0,40}\b(instruction|prompt|rule|directive|guideline)",
        ),
        // "reveal/show ... system/hidden ... prompt/instructions"
        sig(
            "system_prompt_probe",
            2.0,
            r"(?i)\b(reveal|show|print|repeat|display|leak|output|tell me)\b[\s\S]{0,40}\b(system|initial|hidden|original|secret)\b[\s\S]{0,20}\b(prompt|instruction|message|rule)",
        ),
        sig(
            "system_prompt_probe",
            2.0,
            r"(?i)\bwhat (is|are|were) your (system prompt|instructions|initial rules)\b",
        ),
        // "pretend you are ... unrestricted/DAN/with no rules"
        sig(
            "role_play_escape",
            1.6,
            r"(?i)\b(pretend|act as|you are now|roleplay|role-play|simulate)\b[\s\S]{0,60}\b(dan\b|unrestricted|unfiltered|uncensored|jailbroken|no (rules|limits|restrictions|filters))",
        ),
        sig(
            "role_play_escape",
            1.6,
            r"(?i)\b(jailbreak|developer mode|dan mode)\b",
        ),
        // Chat-template delimiters smuggled into the question body.
        sig(
            "delimiter_smuggling",
            1.8,
            r"(?i)(\[/?(system|inst)\]|<\|im_(start|end)\|>|<<sys>>|###\s*(system|instruction))",
        ),
        // Long base64-looking runs or \uXXXX escape chains.
        sig("encoded_payload", 0.9, r"[A-Za-z0-9+/]{80,}={0,2}"),
        sig("encoded_payload", 0.9, r"(?:\\u[0-9a-fA-F]{4}){6,}"),
    ]
});
