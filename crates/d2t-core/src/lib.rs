//! d2t-core – natural-language-to-SQL question answering.
//!
//! The crate is split along the request pipeline:
//!
//! - [`llm`]: chat-completion client and the three prompt modes.
//! - [`sql::extract`]: pulls a SQL statement out of loosely formatted model text.
//! - [`sql::executor`]: runs a statement against Postgres and materialises rows.
//! - [`decode`]: best-effort base64 detection over JSON values.
//! - [`pipeline`]: sequences all of the above for one question.

pub mod decode;
pub mod llm;
pub mod pipeline;
pub mod schema;
pub mod sql;

pub use llm::{ChatClient, LlmClient, LlmError, ModeKind, PromptMode};
pub use pipeline::{Answer, PipelineError, QaPipeline, NO_ANALYSIS};
pub use sql::executor::{ConnectionProvider, DatabaseError, PgConnectionProvider, SqlConnection};
pub use sql::value::{ResultRow, ResultSet, SqlValue};
