// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Arcana reading service.
//!
//! Exposes the submit/status/retry surface, the SSE progress stream, the
//! credit endpoints, and the public health/stats/metrics probes. Handlers
//! talk to the store, ledger, gate, and progress broker through the shared
//! [`GatewayState`]; nothing here owns the pipeline, the processor does.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;

pub use error::ApiError;
pub use server::{build_router, serve, GatewayState, PrometheusRender};
