// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! All `/api` handlers resolve the caller from the `x-user-id` header set
//! by the upstream auth proxy. Submission runs the security gate before
//! any debit; the stored question is the gate's sanitized text.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use arcana_core::{ArcanaError, Reading, ReadingStatus};
use arcana_engine::estimate_wait_secs;
use arcana_storage::CreditTransaction;

use crate::error::ApiError;
use crate::server::GatewayState;

/// Largest spread a single reading may request (a full Celtic Cross).
const MAX_CARD_COUNT: u32 = 10;

/// Transactions returned by the credits endpoint.
const TRANSACTION_HISTORY_LIMIT: u32 = 20;

/// Request body for `POST /api/readings`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub question: String,
    /// Number of cards to draw; defaults to a three-card spread.
    #[serde(default = "default_card_count")]
    pub card_count: u32,
}

fn default_card_count() -> u32 {
    3
}

/// Response body for `POST /api/readings` and the retry endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub reading_id: String,
    pub status: ReadingStatus,
    pub cost: i64,
    pub estimated_wait_seconds: u64,
}

/// Response body for `GET /api/readings/{id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub reading_id: String,
    pub status: ReadingStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response body for `GET /api/credits`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsResponse {
    pub user_id: String,
    pub balance: i64,
    pub transactions: Vec<CreditTransaction>,
}

/// Request body for `POST /api/credits/grant`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    /// Account to fund; grants are made on behalf of other users.
    pub user_id: String,
    pub amount: i64,
    #[serde(default)]
    pub note: Option<String>,
}

/// Response body for `POST /api/credits/grant`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantResponse {
    pub user_id: String,
    pub balance: i64,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Per-dependency `up`/`down`, sorted by name.
    pub dependencies: BTreeMap<String, &'static str>,
}

/// Response body for `GET /stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Pending readings.
    pub waiting: i64,
    /// Claimed readings currently in generation.
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    /// Always zero; there is no delayed scheduling.
    pub delayed: i64,
    /// True when the poller is not running.
    pub paused: bool,
    pub providers: BTreeMap<String, &'static str>,
}

/// Resolves the caller identity from the `x-user-id` header.
pub(crate) fn require_user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError(ArcanaError::Validation(
                "x-user-id header is required".to_string(),
            ))
        })
}

pub(crate) fn status_response(reading: Reading) -> StatusResponse {
    let result = reading
        .result_payload
        .as_deref()
        .and_then(|payload| match serde_json::from_str(payload) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(reading_id = %reading.id, error = %err, "stored result payload is not valid JSON");
                None
            }
        });
    StatusResponse {
        progress: reading.progress(),
        updated_at: reading.updated_at(),
        reading_id: reading.id,
        status: reading.status,
        result,
        error: reading.error_message,
        created_at: reading.created_at,
    }
}

/// POST /api/readings
///
/// Screens the question, charges the reading cost, and queues the job.
/// Returns 202 with the id and a deterministic wait estimate; the reading
/// is not yet complete.
pub async fn post_reading(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<SubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user_id(&headers)?;

    if !(1..=MAX_CARD_COUNT).contains(&body.card_count) {
        return Err(ApiError(ArcanaError::Validation(format!(
            "cardCount must be between 1 and {MAX_CARD_COUNT}, got {}",
            body.card_count
        ))));
    }

    let analysis = state.gate.screen(&user_id, &body.question)?;
    let cost = state.credits.cost_for(body.card_count);
    let receipt = state
        .store
        .submit(&user_id, &analysis.sanitized_content, body.card_count, cost)
        .await?;
    state.broker.register(&receipt.reading.id);
    metrics::counter!("arcana_readings_submitted_total").increment(1);

    info!(
        reading_id = %receipt.reading.id,
        user_id = %user_id,
        card_count = body.card_count,
        cost,
        queue_position = receipt.queue_position,
        "reading accepted"
    );

    let response = SubmitResponse {
        reading_id: receipt.reading.id,
        status: receipt.reading.status,
        cost,
        estimated_wait_seconds: estimate_wait_secs(receipt.queue_position, &state.engine),
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /api/readings/{id}
///
/// Always returns a well-formed status object; internal failure detail
/// never appears here.
pub async fn get_reading(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    require_user_id(&headers)?;
    let reading = state
        .store
        .get(&id)
        .await?
        .ok_or(ArcanaError::NotFound { reading_id: id })?;
    Ok(Json(status_response(reading)))
}

/// POST /api/readings/{id}/retry
///
/// Re-queues a failed reading for the same user: charges the cost again,
/// resets the row to pending, and lets the next poll cycle pick it up.
pub async fn post_retry(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user_id(&headers)?;

    // Cost depends on the original card count. The row is re-validated
    // inside the retry transaction; card_count is immutable so this read
    // cannot go stale.
    let reading = state
        .store
        .get(&id)
        .await?
        .ok_or_else(|| ArcanaError::NotFound {
            reading_id: id.clone(),
        })?;
    let cost = state.credits.cost_for(reading.card_count);

    let receipt = state
        .store
        .retry(
            &id,
            &user_id,
            cost,
            state.engine.max_retries,
            state.engine.retry_cooldown_secs,
        )
        .await?;
    state.broker.register(&receipt.reading.id);
    metrics::counter!("arcana_readings_retried_total").increment(1);

    let response = SubmitResponse {
        reading_id: receipt.reading.id,
        status: receipt.reading.status,
        cost,
        estimated_wait_seconds: estimate_wait_secs(receipt.queue_position, &state.engine),
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /api/credits
pub async fn get_credits(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Json<CreditsResponse>, ApiError> {
    let user_id = require_user_id(&headers)?;
    let balance = state.ledger.balance(&user_id).await?;
    let transactions = state
        .ledger
        .transactions(&user_id, TRANSACTION_HISTORY_LIMIT)
        .await?;
    Ok(Json(CreditsResponse {
        user_id,
        balance,
        transactions,
    }))
}

/// POST /api/credits/grant
///
/// Operator or payment-webhook funding. The caller identity goes to the
/// logs; the grant lands on the account named in the body.
pub async fn post_grant(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<GrantRequest>,
) -> Result<Json<GrantResponse>, ApiError> {
    let granted_by = require_user_id(&headers)?;
    let balance = state
        .ledger
        .grant(&body.user_id, body.amount, body.note.as_deref())
        .await?;
    info!(
        user_id = %body.user_id,
        amount = body.amount,
        granted_by = %granted_by,
        "credits granted"
    );
    Ok(Json(GrantResponse {
        user_id: body.user_id,
        balance,
    }))
}

/// GET /health
///
/// 503 when the store is unreachable; provider entries report the last
/// observed call outcome and degrade the status without failing the probe.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let store_up = state.db.ping().await.is_ok();

    let mut dependencies = BTreeMap::new();
    dependencies.insert("store".to_string(), up_down(store_up));
    for name in &state.providers {
        // A provider with no observed calls yet counts as up.
        let up = state.health.status(name).unwrap_or(true);
        dependencies.insert((*name).to_string(), up_down(up));
    }

    let all_up = dependencies.values().all(|s| *s == "up");
    let body = HealthResponse {
        status: if all_up { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        dependencies,
    };
    let status = if store_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

/// GET /stats
pub async fn get_stats(
    State(state): State<GatewayState>,
) -> Result<Json<StatsResponse>, ApiError> {
    let counts = state.store.status_counts().await?;

    let mut providers = BTreeMap::new();
    for name in &state.providers {
        let up = state.health.status(name).unwrap_or(true);
        providers.insert((*name).to_string(), up_down(up));
    }

    Ok(Json(StatsResponse {
        waiting: counts.pending,
        active: counts.processing,
        completed: counts.completed,
        failed: counts.failed,
        delayed: 0,
        paused: !state.running.load(Ordering::SeqCst),
        providers,
    }))
}

/// GET /metrics
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.prometheus_render {
        Some(render) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

fn up_down(up: bool) -> &'static str {
    if up {
        "up"
    } else {
        "down"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_request_defaults_to_three_cards() {
        let json = r#"{"question": "What awaits me?"}"#;
        let req: SubmitRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.question, "What awaits me?");
        assert_eq!(req.card_count, 3);
    }

    #[test]
    fn submit_request_accepts_camel_case_card_count() {
        let json = r#"{"question": "q", "cardCount": 5}"#;
        let req: SubmitRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.card_count, 5);
    }

    #[test]
    fn submit_response_serializes_camel_case() {
        let response = SubmitResponse {
            reading_id: "r-1".to_string(),
            status: ReadingStatus::Pending,
            cost: 25,
            estimated_wait_seconds: 13,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"readingId\":\"r-1\""));
        assert!(json.contains("\"status\":\"pending\""));
        assert!(json.contains("\"estimatedWaitSeconds\":13"));
    }

    #[test]
    fn missing_user_header_is_a_validation_error() {
        let headers = HeaderMap::new();
        let err = require_user_id(&headers).unwrap_err();
        assert!(matches!(err.0, ArcanaError::Validation(_)));
    }

    #[test]
    fn blank_user_header_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", "   ".parse().unwrap());
        assert!(require_user_id(&headers).is_err());
    }

    #[test]
    fn status_response_embeds_result_as_json() {
        let reading = Reading {
            id: "r-1".to_string(),
            user_id: "u-1".to_string(),
            question: "q".to_string(),
            card_count: 3,
            status: ReadingStatus::Completed,
            retry_count: 0,
            error_message: None,
            result_payload: Some(r#"{"interpretation":"all is well"}"#.to_string()),
            created_at: Utc::now(),
            processing_started_at: Some(Utc::now()),
            processing_completed_at: Some(Utc::now()),
        };
        let response = status_response(reading);
        assert_eq!(response.progress, 100);
        assert_eq!(
            response.result.unwrap()["interpretation"],
            "all is well"
        );
        let json = serde_json::to_string(&StatusResponse {
            reading_id: "r".to_string(),
            status: ReadingStatus::Pending,
            progress: 0,
            result: None,
            error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .unwrap();
        // Absent result and error are omitted, not null.
        assert!(!json.contains("\"result\""));
        assert!(!json.contains("\"error\""));
    }
}
