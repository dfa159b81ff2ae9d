//! # CLI Commands
//!
//! The `haifu-logs` command line: a terminal consumer of the log stream
//! (`tail`) and management of the stored credential (`token`).

use crate::client::LogStreamClient;
use crate::config::StreamConfig;
use crate::credentials::{CredentialStore, StaticCredential, TokenStorage};
use crate::events::DeploymentEvent;
use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::{Args, Parser, Subcommand};
use std::fmt::Display;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "haifu-logs", version, about = "Stream hAIfu deployment logs")]
pub struct Cli {
    /// Token file to use instead of the default location
    #[arg(long, global = true, env = "HAIFU_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow the deployment log of a resource until it completes
    Tail(TailArgs),

    /// Manage the stored auth token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Debug, Args)]
pub struct TailArgs {
    /// Resource (service) identifier
    pub resource_id: String,

    /// Project the resource belongs to
    #[arg(long, short)]
    pub project: Option<String>,

    /// WebSocket base address, e.g. ws://localhost:8000
    #[arg(long)]
    pub ws_url: Option<String>,

    /// Use this token instead of the stored one
    #[arg(long, env = "HAIFU_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum TokenAction {
    /// Store a token for later connections
    Set { token: String },
    /// Delete the stored token
    Clear,
    /// Show whether a token is stored
    Status,
}

/// How a `tail` session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailOutcome {
    Completed,
    GaveUp,
    Interrupted,
}

impl TailOutcome {
    fn exit_code(self) -> ExitCode {
        match self {
            TailOutcome::Completed | TailOutcome::Interrupted => ExitCode::SUCCESS,
            TailOutcome::GaveUp => ExitCode::FAILURE,
        }
    }
}

/// Where `tail` reads its token from.
pub enum TailCredentials {
    Fixed(StaticCredential),
    Stored(TokenStorage),
}

impl CredentialStore for TailCredentials {
    fn get(&self) -> Option<String> {
        match self {
            TailCredentials::Fixed(credential) => credential.get(),
            TailCredentials::Stored(storage) => storage.get(),
        }
    }
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Tail(args) => {
            let credentials = match args.token.clone() {
                Some(token) => TailCredentials::Fixed(StaticCredential::new(Some(token))),
                None => match token_storage(cli.token_file) {
                    Ok(storage) => TailCredentials::Stored(storage),
                    Err(e) => {
                        warn!("No token store available ({:#}); connecting without a token", e);
                        TailCredentials::Fixed(StaticCredential::none())
                    }
                },
            };
            let outcome = tail(args, credentials).await?;
            Ok(outcome.exit_code())
        }
        Command::Token { action } => {
            let storage = token_storage(cli.token_file)?;
            token(action, &storage)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn token_storage(path: Option<PathBuf>) -> Result<TokenStorage> {
    match path {
        Some(path) => Ok(TokenStorage::new(path)),
        None => TokenStorage::default_location().context("locating the token store"),
    }
}

fn token(action: TokenAction, storage: &TokenStorage) -> Result<()> {
    match action {
        TokenAction::Set { token } => {
            storage.save(&token)?;
            info!("Token saved to {}", storage.path().display());
        }
        TokenAction::Clear => {
            storage.remove()?;
            info!("Token removed from {}", storage.path().display());
        }
        TokenAction::Status => {
            let state = if storage.has_token() { "stored" } else { "not stored" };
            println!("token {} ({})", state, storage.path().display());
        }
    }
    Ok(())
}

// ─── Tail ───────────────────────────────────────────────────────

/// Streams a resource's deployment log to stdout.
///
/// Ends on a `complete` event, on Ctrl-C, or when the client gives up
/// reconnecting. Fails if the stream never opens.
pub async fn tail(args: TailArgs, credentials: TailCredentials) -> Result<TailOutcome> {
    let config = match args.ws_url {
        Some(url) => StreamConfig::resolve(Some(url), None, None),
        None => StreamConfig::from_env(),
    };
    info!("Using log stream at {}", config.ws_base_url);

    let client = LogStreamClient::new(config, args.resource_id, args.project, credentials)?;

    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<()>();
    client.on_message(move |event| {
        print_line(&render_event(event, &Local));
        if event.is_complete() {
            let _ = done_tx.send(());
        }
    });
    client.on_close(|| warn!("Log stream connection closed"));

    if let Err(e) = client.connect().await {
        client.disconnect();
        return Err(e).context("deployment logs unavailable");
    }

    let mut states = client.watch_state();
    let gave_up = async {
        loop {
            if client.has_given_up() || states.changed().await.is_err() {
                break;
            }
        }
    };

    let outcome = tokio::select! {
        Some(()) = done_rx.recv() => TailOutcome::Completed,
        _ = gave_up => TailOutcome::GaveUp,
        _ = tokio::signal::ctrl_c() => TailOutcome::Interrupted,
    };

    client.disconnect();
    if outcome == TailOutcome::GaveUp {
        warn!("Deployment log stream could not be re-established");
    }
    Ok(outcome)
}

fn print_line(line: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{}", line);
}

/// One terminal line per event. Log lines use the timestamp in `tz`.
pub fn render_event<Tz>(event: &DeploymentEvent, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match event {
        DeploymentEvent::Log(log) => format!(
            "{} [{}] {}: {}",
            log.timestamp.with_timezone(tz).format("%H:%M:%S"),
            log.level,
            log.stage,
            log.message
        ),
        DeploymentEvent::Status(data) => format!("[STATUS] {}", data),
        DeploymentEvent::Error(data) => format!("[ERROR] {}", data),
        DeploymentEvent::Complete(data) => format!("[COMPLETE] {}", data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogEvent;
    use chrono::Utc;
    use haifu_protocol::LogLevel;
    use serde_json::json;

    #[test]
    fn renders_log_lines() {
        let event = DeploymentEvent::Log(LogEvent {
            stage: "BUILD".into(),
            message: "Installing deps".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 13, 4, 5).unwrap(),
            level: LogLevel::Warn,
        });
        assert_eq!(render_event(&event, &Utc), "13:04:05 [WARN] BUILD: Installing deps");
    }

    #[test]
    fn renders_opaque_events_as_json() {
        let event = DeploymentEvent::Status(json!({"status": "RUNNING"}));
        assert_eq!(render_event(&event, &Utc), r#"[STATUS] {"status":"RUNNING"}"#);
        assert_eq!(
            render_event(&DeploymentEvent::Complete(serde_json::Value::Null), &Utc),
            "[COMPLETE] null"
        );
    }

    #[test]
    fn parses_tail_arguments() {
        let cli = Cli::try_parse_from([
            "haifu-logs",
            "tail",
            "svc-42",
            "--project",
            "proj-7",
            "--ws-url",
            "ws://127.0.0.1:9000",
        ])
        .unwrap();

        let Command::Tail(args) = cli.command else {
            panic!("expected tail");
        };
        assert_eq!(args.resource_id, "svc-42");
        assert_eq!(args.project.as_deref(), Some("proj-7"));
        assert_eq!(args.ws_url.as_deref(), Some("ws://127.0.0.1:9000"));
    }

    #[test]
    fn token_commands_use_the_given_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jwt_token");
        let storage = TokenStorage::new(&path);

        token(TokenAction::Set { token: "abc".into() }, &storage).unwrap();
        assert_eq!(storage.get().as_deref(), Some("abc"));

        token(TokenAction::Clear, &storage).unwrap();
        assert!(!storage.has_token());
    }
}
