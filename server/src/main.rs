use anyhow::Context;
use clap::Parser;
use haifu_devserver::{AppState, FeedSettings};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "haifu-devserver", version, about = "Local hAIfu deployment log feed")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "HAIFU_DEVSERVER_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Milliseconds between two frames of the simulated deployment
    #[arg(long, env = "HAIFU_DEVSERVER_INTERVAL_MS", default_value_t = 1000)]
    interval_ms: u64,

    /// Reject subscribers whose `token` query parameter differs
    #[arg(long, env = "HAIFU_DEVSERVER_TOKEN", hide_env_values = true)]
    require_token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "haifu_devserver=info".into()),
        )
        .init();

    let args = Args::parse();
    let state = AppState::new(FeedSettings {
        frame_interval: Duration::from_millis(args.interval_ms),
        required_token: args.require_token,
    });

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    haifu_devserver::serve(listener, state)
        .await
        .context("feed server stopped")
}
