//! Server configuration, loaded from environment variables at startup.
//!
//! Everything except the LLM API key has a default. Values are read once
//! here and passed down explicitly; nothing downstream touches the
//! environment again.

use std::fmt;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use d2t_core::DatabaseError;
use d2t_core::llm::DEFAULT_TIMEOUT;
use d2t_core::schema::DEFAULT_SCHEMA;
use d2t_core::sql::executor::DbSettings;
use thiserror::Error;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_LLM_URL: &str = "https://api.deepseek.com/chat/completions";
const DEFAULT_LLM_MODEL: &str = "deepseek-chat";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("D2T_LLM_API_KEY must be set to the chat-completion API key")]
    MissingApiKey,

    #[error("invalid bind address '{value}': {source}")]
    InvalidBind {
        value: String,
        #[source]
        source: AddrParseError,
    },

    #[error("failed to read schema file {}: {source}", .path.display())]
    SchemaFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Runtime configuration for d2t-server.
#[derive(Clone)]
pub struct Config {
    /// TCP address to bind (`D2T_BIND`, else `0.0.0.0:$PORT`).
    pub bind_address: SocketAddr,

    /// `tracing` filter string, e.g. `"info"` or `"debug,sqlx=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    pub llm_url: String,
    pub llm_model: String,
    pub llm_api_key: String,
    pub api_timeout: Duration,

    /// Schema text handed to the model.
    pub schema: Arc<str>,

    /// Run the base64 heuristic over result text before responding.
    pub decode_base64: bool,

    pub database: DbSettings,

    /// Problems that fell back to a default; logged once tracing is up.
    pub warnings: Vec<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("llm_url", &self.llm_url)
            .field("llm_model", &self.llm_model)
            .field("llm_api_key", &"<redacted>")
            .field("api_timeout", &self.api_timeout)
            .field("schema_len", &self.schema.len())
            .field("decode_base64", &self.decode_base64)
            .field("database", &self.database)
            .finish()
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);
        let mut warnings = Vec::new();

        let bind = match (env.get("D2T_BIND"), env.get("PORT")) {
            (Some(bind), _) => bind,
            (None, Some(port)) => format!("0.0.0.0:{port}"),
            (None, None) => DEFAULT_BIND.to_owned(),
        };
        let bind_address = bind
            .parse()
            .map_err(|source| ConfigError::InvalidBind { value: bind.clone(), source })?;

        let llm_api_key = env
            .get("D2T_LLM_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let api_timeout = match env.get("API_TIMEOUT_SECONDS") {
            None => DEFAULT_TIMEOUT,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warnings.push(format!(
                        "API_TIMEOUT_SECONDS='{raw}' is not a positive integer; using {}s",
                        DEFAULT_TIMEOUT.as_secs()
                    ));
                    DEFAULT_TIMEOUT
                }
            },
        };

        let schema: Arc<str> = match env.get("D2T_SCHEMA_FILE") {
            Some(path) => {
                let path = PathBuf::from(path);
                std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::SchemaFile { path, source })?
                    .into()
            }
            None => DEFAULT_SCHEMA.into(),
        };

        let defaults = DbSettings::default();
        let database = DbSettings {
            host: env.or("DB_HOST", &defaults.host),
            port: env.parse("DB_PORT", defaults.port),
            user: env.or("DB_USER", &defaults.user),
            password: env.or("DB_PASSWORD", &defaults.password),
            database: env.or("DB_NAME", &defaults.database),
            ssl_mode: env.or("DB_SSLMODE", &defaults.ssl_mode),
            max_connections: env.parse("DB_MAX_CONNECTIONS", defaults.max_connections),
            acquire_timeout: defaults.acquire_timeout,
            read_only: env.flag("DB_READ_ONLY", defaults.read_only),
        };
        // Reject an unknown sslmode now rather than on the first request.
        database.connect_options()?;

        Ok(Self {
            bind_address,
            log_level: env.or("D2T_LOG", "info"),
            log_json: env.flag("D2T_LOG_JSON", false),
            cors_allowed_origins: env.get("D2T_CORS_ORIGINS"),
            llm_url: env.or("D2T_LLM_URL", DEFAULT_LLM_URL),
            llm_model: env.or("D2T_LLM_MODEL", DEFAULT_LLM_MODEL),
            llm_api_key,
            api_timeout,
            schema,
            decode_base64: env.flag("D2T_DECODE_BASE64", false),
            database,
            warnings,
        })
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Set and non-empty.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
            .unwrap_or(default)
    }
}
