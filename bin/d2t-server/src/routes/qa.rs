//! Question answering route.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::ErrorBody;
use crate::schemas::qa::{AskRequest, AskResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(ask_qa), components(schemas(AskRequest, AskResponse, ErrorBody)))]
pub struct QaApi;

/// Routes nested under `/api`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/askQA", post(ask_qa))
}

/// Answer a natural-language question (`POST /api/askQA`).
///
/// The question is converted to SQL, explained, and executed; string values
/// in the result rows have trailing whitespace trimmed.
#[utoipa::path(
    post,
    path = "/api/askQA",
    tag = "qa",
    request_body = AskRequest,
    responses(
        (status = 200, description = "Question answered", body = AskResponse),
        (status = 400, description = "Malformed request body", body = ErrorBody),
        (status = 500, description = "Conversion, connection or execution failed", body = ErrorBody),
    )
)]
pub async fn ask_qa(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ServerError> {
    let Json(req) = body?;
    info!(question = %req.question, "askQA called");

    let mut answer = state.pipeline.answer(&req.question).await?;
    if state.config.decode_base64 {
        answer.results.decode_base64_text();
    }

    Ok(Json(answer.into()))
}
