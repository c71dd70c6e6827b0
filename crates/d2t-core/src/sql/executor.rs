//! Generic SQL execution.
//!
//! [`ConnectionProvider`] hands out one [`SqlConnection`] per request; the
//! connection goes back to the pool when the box is dropped, whichever way
//! the request ends. The SQL text is neither validated nor rewritten. With
//! `read_only` set, Postgres itself rejects writes because the statement runs
//! inside a `READ ONLY` transaction that is always rolled back.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{Column, Connection, PgConnection, PgPool, Postgres, Row, TypeInfo};
use thiserror::Error;
use tracing::{info, warn};

use super::value::{ResultSet, SqlValue};

/// Errors raised while obtaining a connection or running a statement.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// The statement could not be prepared or failed before yielding rows.
    #[error("failed to execute query: {0}")]
    Query(#[source] sqlx::Error),

    /// The cursor failed after some rows had already been read.
    #[error("failed while reading result rows: {0}")]
    Cursor(#[source] sqlx::Error),

    #[error("invalid database configuration: {0}")]
    InvalidConfig(String),
}

/// An open connection able to run arbitrary SQL.
#[async_trait]
pub trait SqlConnection: Send {
    async fn execute(&mut self, sql: &str) -> Result<ResultSet, DatabaseError>;
}

/// Source of per-request connections.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn SqlConnection>, DatabaseError>;
}

/// Postgres connection parameters.
#[derive(Clone)]
pub struct DbSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// `disable`, `allow`, `prefer`, `require`, `verify-ca` or `verify-full`.
    pub ssl_mode: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub read_only: bool,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: String::new(),
            database: "d2t_db".into(),
            ssl_mode: "disable".into(),
            max_connections: 100,
            acquire_timeout: Duration::from_secs(30),
            read_only: true,
        }
    }
}

impl fmt::Debug for DbSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl DbSettings {
    pub fn connect_options(&self) -> Result<PgConnectOptions, DatabaseError> {
        let ssl_mode = PgSslMode::from_str(&self.ssl_mode).map_err(|_| {
            DatabaseError::InvalidConfig(format!("unknown sslmode '{}'", self.ssl_mode))
        })?;
        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database)
            .ssl_mode(ssl_mode);
        if !self.password.is_empty() {
            options = options.password(&self.password);
        }
        Ok(options)
    }
}

/// [`ConnectionProvider`] backed by a lazily connected `sqlx` pool.
#[derive(Debug, Clone)]
pub struct PgConnectionProvider {
    pool: PgPool,
    read_only: bool,
}

impl PgConnectionProvider {
    /// Build the pool without connecting; the first [`acquire`] opens the
    /// first connection, so an unreachable database surfaces per request.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// [`acquire`]: ConnectionProvider::acquire
    pub fn connect_lazy(settings: &DbSettings) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections.max(1))
            .acquire_timeout(settings.acquire_timeout)
            .max_lifetime(Duration::from_secs(60 * 60))
            .idle_timeout(Duration::from_secs(10 * 60))
            .test_before_acquire(true)
            .connect_lazy_with(settings.connect_options()?);
        Ok(Self { pool, read_only: settings.read_only })
    }

    /// Close every pooled connection; used on shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ConnectionProvider for PgConnectionProvider {
    async fn acquire(&self) -> Result<Box<dyn SqlConnection>, DatabaseError> {
        let conn = self.pool.acquire().await.map_err(DatabaseError::Connect)?;
        Ok(Box::new(PgSqlConnection { conn, read_only: self.read_only }))
    }
}

struct PgSqlConnection {
    conn: PoolConnection<Postgres>,
    read_only: bool,
}

#[async_trait]
impl SqlConnection for PgSqlConnection {
    async fn execute(&mut self, sql: &str) -> Result<ResultSet, DatabaseError> {
        info!(sql, read_only = self.read_only, "executing SQL");

        if !self.read_only {
            return run_query(&mut self.conn, sql).await;
        }

        let mut tx = self.conn.begin().await.map_err(DatabaseError::Query)?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::Query)?;
        let result = run_query(&mut tx, sql).await;
        if let Err(e) = tx.rollback().await {
            warn!(error = %e, "failed to roll back read-only transaction");
        }
        result
    }
}

async fn run_query(conn: &mut PgConnection, sql: &str) -> Result<ResultSet, DatabaseError> {
    let mut stream = sqlx::query(sql).persistent(false).fetch(conn);
    let mut rows = RowCollector::default();

    loop {
        match stream.try_next().await {
            Ok(Some(row)) => rows.push(
                || row.columns().iter().map(|c| c.name().to_owned()).collect(),
                |idx| decode_cell(&row, idx),
            ),
            Ok(None) => break,
            Err(e) => return Err(rows.fail(e)),
        }
    }

    Ok(rows.finish())
}

/// Accumulates streamed rows into a [`ResultSet`].
#[derive(Debug, Default)]
struct RowCollector {
    columns: Option<Vec<String>>,
    rows: Vec<Vec<SqlValue>>,
}

impl RowCollector {
    /// Column names are read once, from the first row; every later row is
    /// read at that width. Bytes become text here.
    fn push(&mut self, names: impl FnOnce() -> Vec<String>, cell: impl FnMut(usize) -> SqlValue) {
        let width = self.columns.get_or_insert_with(names).len();
        self.rows.push((0..width).map(cell).map(SqlValue::bytes_to_text).collect());
    }

    fn fail(&self, e: sqlx::Error) -> DatabaseError {
        if self.rows.is_empty() {
            DatabaseError::Query(e)
        } else {
            DatabaseError::Cursor(e)
        }
    }

    fn finish(self) -> ResultSet {
        ResultSet::from_rows(self.columns.unwrap_or_default(), self.rows)
    }
}

/// `TIMESTAMP` carries no zone, so none is invented.
fn timestamp_text(t: chrono::NaiveDateTime) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

fn timestamptz_text(t: chrono::DateTime<chrono::Utc>) -> String {
    t.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

fn decode_cell(row: &PgRow, idx: usize) -> SqlValue {
    let column = &row.columns()[idx];
    let type_name = column.type_info().name();

    let decoded = match type_name {
        "BOOL" => cell(row, idx, SqlValue::Bool),
        "INT2" => cell(row, idx, |n: i16| SqlValue::Int(n.into())),
        "INT4" => cell(row, idx, |n: i32| SqlValue::Int(n.into())),
        "INT8" => cell(row, idx, SqlValue::Int),
        "FLOAT4" => cell(row, idx, |n: f32| SqlValue::Float(n.into())),
        "FLOAT8" => cell(row, idx, SqlValue::Float),
        "NUMERIC" => cell(row, idx, |n: bigdecimal::BigDecimal| SqlValue::Text(n.to_string())),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => cell(row, idx, SqlValue::Text),
        "BYTEA" => cell(row, idx, SqlValue::Bytes),
        "DATE" => cell(row, idx, |d: chrono::NaiveDate| SqlValue::Text(d.to_string())),
        "TIME" => cell(row, idx, |t: chrono::NaiveTime| SqlValue::Text(t.to_string())),
        "TIMESTAMP" => cell(row, idx, |t| SqlValue::Text(timestamp_text(t))),
        "TIMESTAMPTZ" => cell(row, idx, |t| SqlValue::Text(timestamptz_text(t))),
        "UUID" => cell(row, idx, |u: uuid::Uuid| SqlValue::Text(u.to_string())),
        "JSON" | "JSONB" => cell(row, idx, |v: serde_json::Value| SqlValue::Text(v.to_string())),
        // Enums and other text-like types carry their label as UTF-8.
        _ => row
            .try_get_unchecked::<Option<String>, _>(idx)
            .map(|s| s.map(SqlValue::Text).into()),
    };

    decoded.unwrap_or_else(|e| {
        warn!(column = column.name(), column_type = type_name, error = %e, "could not decode column value; using null");
        SqlValue::Null
    })
}

fn cell<'r, T>(
    row: &'r PgRow,
    idx: usize,
    f: impl FnOnce(T) -> SqlValue,
) -> Result<SqlValue, sqlx::Error>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    Ok(row.try_get::<Option<T>, _>(idx)?.map(f).into())
}
