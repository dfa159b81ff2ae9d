use clap::Parser;
use haifu_logstream::commands::{self, Cli};
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "haifu_logstream=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // wss:// handshakes need a process-wide crypto provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    match commands::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
