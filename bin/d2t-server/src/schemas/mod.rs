//! HTTP request / response types, annotated for the OpenAPI document.

pub mod health;
pub mod qa;

use serde::Serialize;
use utoipa::ToSchema;

/// Error envelope returned by every failing route.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}
