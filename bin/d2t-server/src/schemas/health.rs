use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Server time, RFC 3339.
    pub timestamp: String,
}
