// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock generative backend for deterministic testing.
//!
//! `MockProvider` implements `Provider` with scripted outcomes, enabling
//! fast, CI-runnable engine and gateway tests without external API calls.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use arcana_core::{ArcanaError, Provider, ProviderRequest, ProviderResponse, TokenUsage};

/// Scripted outcome for one invocation: generated text or an error message.
pub type MockOutcome = Result<String, String>;

/// A mock provider that answers from a FIFO queue of scripted outcomes.
///
/// When the queue is empty it falls back to a default: a fixed mock
/// interpretation, or a scripted failure for providers built with
/// [`MockProvider::failing`]. Every received request is recorded so tests
/// can assert on ordering and content.
pub struct MockProvider {
    name: &'static str,
    outcomes: Arc<Mutex<VecDeque<MockOutcome>>>,
    fail_by_default: bool,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
}

impl MockProvider {
    /// Creates a provider that answers every call with a default mock
    /// interpretation.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            fail_by_default: false,
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a provider pre-loaded with the given outcomes.
    pub fn with_outcomes(name: &'static str, outcomes: Vec<MockOutcome>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(VecDeque::from(outcomes))),
            ..Self::new(name)
        }
    }

    /// Creates a provider that fails every call.
    pub fn failing(name: &'static str) -> Self {
        Self {
            fail_by_default: true,
            ..Self::new(name)
        }
    }

    /// Delays every answer, for timeout tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Appends an outcome to the queue.
    pub async fn push_ok(&self, text: impl Into<String>) {
        self.outcomes.lock().await.push_back(Ok(text.into()));
    }

    /// Appends a failure to the queue.
    pub async fn push_err(&self, message: impl Into<String>) {
        self.outcomes.lock().await.push_back(Err(message.into()));
    }

    /// Requests received so far, in arrival order.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of requests received so far.
    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn next_outcome(&self) -> MockOutcome {
        self.outcomes.lock().await.pop_front().unwrap_or_else(|| {
            if self.fail_by_default {
                Err("scripted failure".to_string())
            } else {
                Ok("mock interpretation".to_string())
            }
        })
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn invoke(&self, request: ProviderRequest) -> Result<ProviderResponse, ArcanaError> {
        self.requests.lock().await.push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_outcome().await {
            Ok(content) => Ok(ProviderResponse {
                content,
                model: format!("{}-mock", self.name),
                usage: TokenUsage::new(10, 20),
            }),
            Err(message) => Err(ArcanaError::Provider {
                provider: self.name.into(),
                message,
                source: None,
            }),
        }
    }
}
