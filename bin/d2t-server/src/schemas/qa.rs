//! Request / response types for `POST /api/askQA`.

use d2t_core::{Answer, ResultSet};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /api/askQA`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AskRequest {
    /// Natural-language question about the database. May be empty.
    #[serde(default)]
    pub question: String,
}

/// Response body for `POST /api/askQA`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AskResponse {
    /// Result rows as column → value objects, in column order.
    #[schema(value_type = Vec<Object>)]
    pub results: ResultSet,
    /// The SQL that was executed.
    pub sql: String,
    /// Model explanation of the SQL, or a placeholder.
    pub analysis: String,
}

impl From<Answer> for AskResponse {
    fn from(answer: Answer) -> Self {
        Self { results: answer.results, sql: answer.sql, analysis: answer.analysis }
    }
}
