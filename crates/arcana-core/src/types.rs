// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the Arcana workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle state of a reading job.
///
/// Transitions are monotonic: `Pending` → `Processing` → {`Completed` | `Failed`}.
/// A reading never returns to `Pending` automatically; the explicit retry
/// operation and startup stall recovery are the only paths back.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ReadingStatus {
    /// Whether this state accepts no further automatic transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReadingStatus::Completed | ReadingStatus::Failed)
    }
}

/// A reading job row: the single source of truth for one submitted request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: String,
    pub user_id: String,
    /// Sanitized question text as produced by the security gate.
    pub question: String,
    pub card_count: u32,
    pub status: ReadingStatus,
    pub retry_count: u32,
    pub error_message: Option<String>,
    /// Completed result as stored JSON (cards + interpretation + usage).
    pub result_payload: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
}

impl Reading {
    /// Most recent lifecycle timestamp, for the status endpoint's `updatedAt`.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.processing_completed_at
            .or(self.processing_started_at)
            .unwrap_or(self.created_at)
    }

    /// Coarse progress derived from status alone. Step-level progress comes
    /// from the live event stream; this is what the polling endpoint reports.
    pub fn progress(&self) -> u8 {
        match self.status {
            ReadingStatus::Pending => 0,
            ReadingStatus::Processing => 50,
            ReadingStatus::Completed | ReadingStatus::Failed => 100,
        }
    }
}

/// Pipeline step vocabulary for the progress stream.
///
/// Steps are emitted in declaration order with fixed progress values, so a
/// client always observes a monotonically non-decreasing progress sequence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadingStep {
    Validating,
    SelectingCards,
    Analyzing,
    Generating,
    Finalizing,
    Completed,
}

impl ReadingStep {
    /// Fixed progress percentage for this step.
    pub fn progress(&self) -> u8 {
        match self {
            ReadingStep::Validating => 5,
            ReadingStep::SelectingCards => 20,
            ReadingStep::Analyzing => 40,
            ReadingStep::Generating => 60,
            ReadingStep::Finalizing => 85,
            ReadingStep::Completed => 100,
        }
    }
}

/// One progress update pushed to the submitting client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub step: ReadingStep,
    pub message: String,
    pub progress: u8,
}

/// Terminal error frame; short-circuits the step sequence and the channel
/// closes immediately after it is delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressErrorEvent {
    pub step: ReadingStep,
    pub error: String,
    pub progress: u8,
}

/// A frame on a reading's progress channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressFrame {
    Step(ProgressEvent),
    Error(ProgressErrorEvent),
}

/// Risk classification produced by the security gate.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// The next level up; `Critical` saturates.
    pub fn escalate(&self) -> RiskLevel {
        match self {
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium => RiskLevel::High,
            RiskLevel::High | RiskLevel::Critical => RiskLevel::Critical,
        }
    }
}

/// Role of a chat message sent to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// An ordered, role-tagged message in a provider request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A completion request to a generative backend.
///
/// Carries only the conversation content. Model, temperature, and token
/// limits are per-backend configuration owned by each `Provider`
/// implementation, so the same request can be replayed against the
/// fallback when the primary fails.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
}

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A completed response from a generative backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
}
