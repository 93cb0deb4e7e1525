// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state. `/health`, `/stats`, and
//! `/metrics` are public; everything under `/api` sits behind the bearer
//! middleware and requires an `x-user-id` header.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use axum::http::{header, HeaderValue, Method};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use arcana_config::model::{CreditsConfig, EngineConfig, GatewayConfig};
use arcana_core::ArcanaError;
use arcana_engine::{ProgressBroker, ProviderHealth};
use arcana_gate::SecurityGate;
use arcana_storage::{CreditLedger, Database, ReadingStore};

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;
use crate::sse;

/// Render function for the Prometheus exposition endpoint, installed by the
/// binary when the recorder is set up.
pub type PrometheusRender = Arc<dyn Fn() -> String + Send + Sync>;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Database handle, used directly only for the health ping.
    pub db: Database,
    pub store: ReadingStore,
    pub ledger: CreditLedger,
    pub gate: Arc<SecurityGate>,
    pub broker: ProgressBroker,
    /// Last-observed provider availability, written by the processor.
    pub health: ProviderHealth,
    /// Names of the configured provider chain, in failover order.
    pub providers: Vec<&'static str>,
    /// True while the poller is running; stats reports its inverse as `paused`.
    pub running: Arc<AtomicBool>,
    pub credits: CreditsConfig,
    pub engine: EngineConfig,
    /// Process start time for uptime reporting.
    pub start_time: Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<PrometheusRender>,
}

/// Builds the gateway router.
pub fn build_router(state: GatewayState, config: &GatewayConfig) -> Router {
    let auth = AuthConfig {
        bearer_token: config.auth_token.clone(),
    };

    // Unauthenticated public routes (health + stats + metrics for probes
    // and Prometheus).
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/stats", get(handlers::get_stats))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/api/readings", post(handlers::post_reading))
        .route("/api/readings/{id}", get(handlers::get_reading))
        .route("/api/readings/{id}/events", get(sse::reading_events))
        .route("/api/readings/{id}/retry", post(handlers::post_retry))
        .route("/api/credits", get(handlers::get_credits))
        .route("/api/credits/grant", post(handlers::post_grant))
        .route_layer(axum_middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config))
}

/// CORS policy from config. An empty origin list adds no CORS headers,
/// which browsers treat as same-origin only.
fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::new();
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-user-id"),
        ])
}

/// Binds and serves the gateway until the cancellation token fires.
///
/// In-flight requests are drained on shutdown; SSE streams close when
/// their progress channels do.
pub async fn serve(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), ArcanaError> {
    let app = build_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ArcanaError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    info!(addr = %addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| ArcanaError::Internal(format!("gateway server error: {e}")))?;

    info!("gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcana_config::model::GatewayConfig;

    #[test]
    fn cors_layer_accepts_configured_origins() {
        let config = GatewayConfig {
            cors_origins: vec![
                "https://app.example.com".to_string(),
                "not a header value\u{0}".to_string(),
            ],
            ..GatewayConfig::default()
        };
        // The invalid origin is dropped, not fatal.
        let _layer = cors_layer(&config);
    }

    #[test]
    fn cors_layer_defaults_to_same_origin() {
        let _layer = cors_layer(&GatewayConfig::default());
    }
}
