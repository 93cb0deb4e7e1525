// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP error mapping for the gateway.
//!
//! Converts [`ArcanaError`] into a JSON error response with a stable
//! `{error: {code, message}}` body. Messages stay generic and categorized;
//! internal detail goes to the logs, never to the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use arcana_core::ArcanaError;

/// Wrapper making [`ArcanaError`] usable as an axum handler error.
#[derive(Debug)]
pub struct ApiError(pub ArcanaError);

impl From<ArcanaError> for ApiError {
    fn from(err: ArcanaError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.0 {
            ArcanaError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation", msg.clone()),
            ArcanaError::SecurityBlocked { risk, .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "security_blocked",
                format!("question rejected by content screening ({risk} risk)"),
            ),
            ArcanaError::InsufficientCredits {
                required,
                available,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_credits",
                format!("reading costs {required} credits, balance is {available}"),
            ),
            ArcanaError::NotFound { .. } => (
                StatusCode::NOT_FOUND,
                "not_found",
                "reading not found".to_string(),
            ),
            ArcanaError::RefundConflict { .. } => (
                StatusCode::CONFLICT,
                "refund_conflict",
                "credits for this reading were already refunded".to_string(),
            ),
            ArcanaError::RetryLimit { retry_count, .. } => (
                StatusCode::CONFLICT,
                "retry_limit",
                format!("reading reached its retry limit ({retry_count} attempts)"),
            ),
            ArcanaError::RetryCooldown { remaining_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "retry_cooldown",
                format!("retry available in {remaining_secs}s"),
            ),
            ArcanaError::Storage { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "storage_unavailable",
                "storage temporarily unavailable".to_string(),
            ),
            ArcanaError::Config(_)
            | ArcanaError::Provider { .. }
            | ArcanaError::ProvidersExhausted { .. }
            | ArcanaError::ClaimConflict { .. }
            | ArcanaError::Timeout { .. }
            | ArcanaError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "internal error".to_string(),
            ),
        };

        if status.is_server_error() {
            error!(status = %status, error = %self.0, "request failed");
        } else {
            warn!(status = %status, code, error = %self.0, "request rejected");
        }

        (
            status,
            Json(ErrorBody {
                error: ErrorDetail { code, message },
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcana_core::RiskLevel;

    fn status_of(err: ArcanaError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(
            status_of(ArcanaError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ArcanaError::SecurityBlocked {
                risk: RiskLevel::Critical,
                reasons: vec![],
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(ArcanaError::InsufficientCredits {
                required: 25,
                available: 10,
            }),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status_of(ArcanaError::NotFound {
                reading_id: "r".into(),
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ArcanaError::RetryLimit {
                reading_id: "r".into(),
                retry_count: 3,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ArcanaError::RetryCooldown { remaining_secs: 60 }),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn infrastructure_errors_map_to_5xx() {
        assert_eq!(
            status_of(ArcanaError::Storage {
                source: "db gone".into(),
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ArcanaError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ArcanaError::ProvidersExhausted { attempts: 2 }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn body_carries_code_and_generic_message() {
        let response = ApiError(ArcanaError::Storage {
            source: "connection refused to 10.0.0.5".into(),
        })
        .into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "storage_unavailable");
        // Internal detail must not leak.
        let message = body["error"]["message"].as_str().unwrap();
        assert!(!message.contains("10.0.0.5"));
    }
}
