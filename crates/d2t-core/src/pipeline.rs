//! Question → SQL → rows, one request at a time.
//!
//! Steps run strictly in order: schema-grounded conversion, extraction,
//! analysis (non-fatal), execution, trailing-whitespace trim. A reply that
//! yields no SQL after extraction stops the request before any connection
//! is taken. Nothing is
//! retried and nothing is shared between calls beyond the collaborators
//! themselves.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::llm::{LlmClient, LlmError, PromptMode};
use crate::sql::executor::{ConnectionProvider, DatabaseError};
use crate::sql::extract_sql;
use crate::sql::value::ResultSet;

/// Analysis text used when the analyze call fails.
pub const NO_ANALYSIS: &str = "No analysis available";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to convert natural language to SQL: {0}")]
    Convert(#[source] LlmError),

    #[error("empty SQL query returned from model")]
    EmptySql,

    #[error("failed to acquire database connection: {0}")]
    Connect(#[source] DatabaseError),

    #[error("failed to execute SQL query: {0}")]
    Execute(#[source] DatabaseError),
}

/// Outcome of one answered question.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub results: ResultSet,
    pub sql: String,
    pub analysis: String,
}

/// Query orchestrator.
#[derive(Clone)]
pub struct QaPipeline {
    llm: Arc<dyn LlmClient>,
    db: Arc<dyn ConnectionProvider>,
    schema: Arc<str>,
}

impl QaPipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        db: Arc<dyn ConnectionProvider>,
        schema: impl Into<Arc<str>>,
    ) -> Self {
        Self { llm, db, schema: schema.into() }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, PipelineError> {
        let raw = self
            .llm
            .complete(question, PromptMode::WithSchema(&self.schema))
            .await
            .map_err(PipelineError::Convert)?;
        if raw.is_empty() {
            return Err(PipelineError::EmptySql);
        }

        let sql = extract_sql(&raw);
        if sql.trim().is_empty() {
            warn!(%raw, "model reply holds no SQL");
            return Err(PipelineError::EmptySql);
        }
        info!(%sql, "converted question to SQL");

        let analysis = match self.llm.complete(&sql, PromptMode::Analyze).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to analyze SQL query");
                NO_ANALYSIS.to_owned()
            }
        };

        let mut conn = self.db.acquire().await.map_err(PipelineError::Connect)?;
        let mut results = conn.execute(&sql).await.map_err(PipelineError::Execute)?;
        drop(conn);

        results.trim_trailing_whitespace();

        Ok(Answer { results, sql, analysis })
    }
}

impl std::fmt::Debug for QaPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaPipeline")
            .field("schema_len", &self.schema.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tracing_test::traced_test;

    use super::*;
    use crate::llm::ModeKind;
    use crate::sql::executor::SqlConnection;
    use crate::sql::value::SqlValue;

    const FENCED: &str = "Here you go:\n```sql\nSELECT cust_name FROM Customers\n```\n";

    struct ScriptedLlm {
        convert: Result<String, ()>,
        analyze: Result<String, ()>,
        calls: Mutex<Vec<(ModeKind, String)>>,
    }

    impl ScriptedLlm {
        fn new(convert: Result<&str, ()>, analyze: Result<&str, ()>) -> Arc<Self> {
            Arc::new(Self {
                convert: convert.map(str::to_owned),
                analyze: analyze.map(str::to_owned),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, input: &str, mode: PromptMode<'_>) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push((mode.kind(), input.to_owned()));
            let scripted = match mode {
                PromptMode::Analyze => &self.analyze,
                _ => &self.convert,
            };
            scripted
                .clone()
                .map_err(|_| LlmError::Status { status: 503, body: "unavailable".into() })
        }
    }

    #[derive(Default)]
    struct RecordingDb {
        acquired: AtomicUsize,
        executed: Arc<Mutex<Vec<String>>>,
        fail_connect: bool,
        fail_execute: bool,
    }

    struct RecordingConn {
        executed: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl SqlConnection for RecordingConn {
        async fn execute(&mut self, sql: &str) -> Result<ResultSet, DatabaseError> {
            self.executed.lock().unwrap().push(sql.to_owned());
            if self.fail {
                return Err(DatabaseError::Query(sqlx::Error::Protocol(
                    "relation \"custmers\" does not exist".into(),
                )));
            }
            Ok(ResultSet::from_rows(
                vec!["cust_name".into()],
                vec![vec![SqlValue::Text("Village Toys   ".into())]],
            ))
        }
    }

    #[async_trait]
    impl ConnectionProvider for RecordingDb {
        async fn acquire(&self) -> Result<Box<dyn SqlConnection>, DatabaseError> {
            self.acquired.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect {
                return Err(DatabaseError::Connect(sqlx::Error::PoolTimedOut));
            }
            Ok(Box::new(RecordingConn {
                executed: Arc::clone(&self.executed),
                fail: self.fail_execute,
            }))
        }
    }

    fn pipeline(llm: Arc<ScriptedLlm>, db: Arc<RecordingDb>) -> QaPipeline {
        QaPipeline::new(llm, db, "Table Customers (cust_name CHAR(50))")
    }

    #[tokio::test]
    async fn executes_extracted_sql_not_raw_text() {
        let llm = ScriptedLlm::new(Ok(FENCED), Ok("Lists customer names."));
        let db = Arc::new(RecordingDb::default());

        let answer = pipeline(llm.clone(), db.clone()).answer("who are our customers?").await.unwrap();

        assert_eq!(answer.sql, "SELECT cust_name FROM Customers");
        assert_eq!(answer.analysis, "Lists customer names.");
        assert_eq!(*db.executed.lock().unwrap(), vec!["SELECT cust_name FROM Customers".to_owned()]);
        assert_eq!(
            answer.results.rows()[0].get("cust_name").and_then(SqlValue::as_str),
            Some("Village Toys")
        );

        let calls = llm.calls.lock().unwrap();
        assert_eq!(calls[0], (ModeKind::WithSchema, "who are our customers?".to_owned()));
        assert_eq!(calls[1], (ModeKind::Analyze, "SELECT cust_name FROM Customers".to_owned()));
    }

    #[tokio::test]
    #[traced_test]
    async fn analysis_failure_falls_back_to_placeholder() {
        let llm = ScriptedLlm::new(Ok(FENCED), Err(()));
        let db = Arc::new(RecordingDb::default());

        let answer = pipeline(llm, db).answer("q").await.unwrap();

        assert_eq!(answer.analysis, NO_ANALYSIS);
        assert_eq!(answer.sql, "SELECT cust_name FROM Customers");
        assert_eq!(answer.results.len(), 1);
        assert!(logs_contain("failed to analyze SQL query"));
    }

    #[tokio::test]
    async fn empty_sql_never_opens_a_connection() {
        let llm = ScriptedLlm::new(Ok(""), Ok("unused"));
        let db = Arc::new(RecordingDb::default());

        let err = pipeline(llm.clone(), db.clone()).answer("q").await.unwrap_err();

        assert!(matches!(err, PipelineError::EmptySql));
        assert_eq!(db.acquired.load(Ordering::SeqCst), 0);
        assert_eq!(llm.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn blank_fenced_reply_never_opens_a_connection() {
        let llm = ScriptedLlm::new(Ok("```sql\n\n```"), Ok("unused"));
        let db = Arc::new(RecordingDb::default());

        let err = pipeline(llm.clone(), db.clone()).answer("q").await.unwrap_err();

        assert!(matches!(err, PipelineError::EmptySql));
        assert_eq!(db.acquired.load(Ordering::SeqCst), 0);
        assert!(db.executed.lock().unwrap().is_empty());
        assert_eq!(llm.calls.lock().unwrap().len(), 1);
        assert!(logs_contain("model reply holds no SQL"));
    }

    #[tokio::test]
    async fn whitespace_only_reply_is_empty_sql() {
        let llm = ScriptedLlm::new(Ok("  \n\t "), Ok("unused"));
        let db = Arc::new(RecordingDb::default());

        let err = pipeline(llm, db.clone()).answer("q").await.unwrap_err();

        assert!(matches!(err, PipelineError::EmptySql));
        assert_eq!(db.acquired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn conversion_failure_is_fatal() {
        let llm = ScriptedLlm::new(Err(()), Ok("unused"));
        let db = Arc::new(RecordingDb::default());

        let err = pipeline(llm, db.clone()).answer("q").await.unwrap_err();

        assert!(matches!(err, PipelineError::Convert(LlmError::Status { status: 503, .. })));
        assert!(err.to_string().starts_with("failed to convert natural language to SQL"));
        assert_eq!(db.acquired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn connect_failure_maps_to_connect() {
        let llm = ScriptedLlm::new(Ok(FENCED), Ok("a"));
        let db = Arc::new(RecordingDb { fail_connect: true, ..Default::default() });

        let err = pipeline(llm, db.clone()).answer("q").await.unwrap_err();

        assert!(matches!(err, PipelineError::Connect(_)));
        assert!(db.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn execute_failure_carries_driver_message() {
        let llm = ScriptedLlm::new(Ok(FENCED), Ok("a"));
        let db = Arc::new(RecordingDb { fail_execute: true, ..Default::default() });

        let err = pipeline(llm, db).answer("q").await.unwrap_err();

        assert!(matches!(err, PipelineError::Execute(_)));
        assert!(err.to_string().contains("custmers"));
    }
}
