//! d2t-server – entry point.
//!
//! Startup order:
//! 1. Parse the command line and load the `.env` file.
//! 2. Parse configuration from environment variables.
//! 3. Initialise structured tracing (JSON in production, pretty in dev).
//! 4. Build the chat client, the lazy Postgres pool and the pipeline.
//! 5. Run the requested command; by default, serve HTTP until SIGINT/SIGTERM.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use d2t_core::{ChatClient, LlmClient, ModeKind, PgConnectionProvider, QaPipeline};
use tracing::{info, warn};

use crate::config::Config;
use crate::schemas::qa::AskResponse;
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "d2t-server", version, about = "Ask a Postgres database questions in natural language")]
struct Cli {
    /// Environment file to load instead of searching for `.env`.
    #[arg(long, global = true, value_name = "FILE")]
    env: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (the default).
    Serve,

    /// Answer one question and print the JSON response.
    Ask { question: String },

    /// Send one raw request to the model and print its reply.
    Prompt {
        /// `nl2sql`, `nl2sql_with_schema` or `analyze`.
        #[arg(long, default_value = "nl2sql")]
        mode: String,
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Command line + .env ─────────────────────────────────────────────────
    let cli = Cli::parse();
    let dotenv = load_dotenv(cli.env.as_deref());

    // ── 2. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid configuration")?;

    // ── 3. Tracing ─────────────────────────────────────────────────────────────
    init_tracing(&cfg);
    match &dotenv {
        Ok(path) => info!(path = %path.display(), "loaded environment file"),
        Err(message) => warn!("{message}"),
    }
    for warning in &cfg.warnings {
        warn!("{warning}");
    }
    info!(version = env!("CARGO_PKG_VERSION"), "d2t-server starting");

    // ── 4. Collaborators ───────────────────────────────────────────────────────
    let llm = Arc::new(ChatClient::new(
        &cfg.llm_url,
        &cfg.llm_model,
        &cfg.llm_api_key,
        Some(cfg.api_timeout),
    )?);
    info!(url = %cfg.llm_url, model = %cfg.llm_model, timeout_s = cfg.api_timeout.as_secs(), "chat client ready");

    if let Some(Command::Prompt { mode, text }) = &cli.command {
        let kind: ModeKind = mode.parse()?;
        let reply = llm.complete(text, kind.with_schema(&cfg.schema)).await?;
        println!("{reply}");
        return Ok(());
    }

    let db = Arc::new(PgConnectionProvider::connect_lazy(&cfg.database)?);
    info!(
        host = %cfg.database.host,
        port = cfg.database.port,
        database = %cfg.database.database,
        read_only = cfg.database.read_only,
        "database pool configured"
    );
    let pipeline = Arc::new(QaPipeline::new(llm, db.clone(), Arc::clone(&cfg.schema)));

    // ── 5. Command ─────────────────────────────────────────────────────────────
    let result = match cli.command {
        Some(Command::Ask { question }) => ask(&cfg, &pipeline, &question).await,
        _ => serve(cfg, pipeline).await,
    };

    db.close().await;
    info!("d2t-server stopped");
    result
}

async fn ask(cfg: &Config, pipeline: &QaPipeline, question: &str) -> anyhow::Result<()> {
    let mut answer = pipeline.answer(question).await?;
    if cfg.decode_base64 {
        answer.results.decode_base64_text();
    }
    println!("{}", serde_json::to_string_pretty(&AskResponse::from(answer))?);
    Ok(())
}

async fn serve(cfg: Config, pipeline: Arc<QaPipeline>) -> anyhow::Result<()> {
    let addr = cfg.bind_address;
    let state = Arc::new(AppState { config: Arc::new(cfg), pipeline });

    let app = routes::build(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Load the explicit env file, else the first `.env` found next to the
/// working directory or up to two levels above the executable.
///
/// Runs before tracing is up, so the outcome is returned for logging.
fn load_dotenv(explicit: Option<&Path>) -> Result<PathBuf, String> {
    if let Some(path) = explicit {
        return dotenvy::from_path(path)
            .map(|()| path.to_owned())
            .map_err(|e| format!("failed to load env file {}: {e}", path.display()));
    }

    let mut candidates = vec![PathBuf::from(".env")];
    if let Some(dir) = std::env::current_exe().ok().as_deref().and_then(Path::parent) {
        candidates.push(dir.join("../.env"));
        candidates.push(dir.join("../../.env"));
    }

    for candidate in candidates {
        if candidate.is_file() {
            return dotenvy::from_path(&candidate)
                .map(|()| candidate.clone())
                .map_err(|e| format!("failed to load env file {}: {e}", candidate.display()));
        }
    }
    Err("no .env file found; using the process environment".to_owned())
}

fn init_tracing(cfg: &Config) {
    // Build the log-level filter, warning loudly if the configured value is
    // not a valid tracing filter expression.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: D2T_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    // Logs go to stderr so `ask` and `prompt` keep stdout for their output.
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cli_defaults_to_serve() {
        let cli = Cli::try_parse_from(["d2t-server"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.env.is_none());
    }

    #[test]
    fn cli_parses_prompt_and_env() {
        let cli = Cli::try_parse_from([
            "d2t-server",
            "prompt",
            "--mode",
            "analyze",
            "SELECT 1",
            "--env",
            "prod.env",
        ])
        .unwrap();
        assert_eq!(cli.env.as_deref(), Some(Path::new("prod.env")));
        match cli.command {
            Some(Command::Prompt { mode, text }) => {
                assert_eq!(mode, "analyze");
                assert_eq!(text, "SELECT 1");
            }
            other => panic!("expected prompt, got {other:?}"),
        }
    }

    #[test]
    fn missing_explicit_env_file_is_reported() {
        let err = load_dotenv(Some(Path::new("/nonexistent/d2t.env"))).unwrap_err();
        assert!(err.contains("/nonexistent/d2t.env"));
    }
}
