//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use d2t_core::QaPipeline;

use crate::config::Config;

#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Question answering pipeline; stateless between requests.
    pub pipeline: Arc<QaPipeline>,
}
