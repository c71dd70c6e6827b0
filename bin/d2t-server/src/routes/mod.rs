//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - `GET /health`, `GET /ping`
//! - `POST /api/askQA`
//! - `GET /api-docs/openapi.json`
//! - CORS and per-request trace-id layers

pub mod doc;
mod health;
mod qa;

use std::sync::Arc;

use axum::{Router, middleware};

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let cors = cors::cors_layer(state.config.cors_allowed_origins.as_deref());

    Router::new()
        .merge(health::router())
        .nest("/api", qa::router())
        .merge(doc::router())
        // Outermost layers execute first on the way in.
        .layer(cors)
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
