use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::routes::{health, qa};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(info(
    title = "d2t-server",
    description = "Ask a Postgres database questions in natural language",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(qa::QaApi::openapi());
    root
}

/// Serve the generated document at `/api-docs/openapi.json`.
pub fn router() -> Router<Arc<AppState>> {
    let doc = get_docs();
    Router::new().route(
        "/api-docs/openapi.json",
        get(move || {
            let doc = doc.clone();
            async move { Json(doc) }
        }),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn document_lists_public_routes() {
        let doc = get_docs();
        for path in ["/health", "/ping", "/api/askQA"] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing from OpenAPI document");
        }
    }
}
