mod connection;
mod generator;
mod handler;
mod registry;
mod server;
mod timer;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use crate::generator::{GeneratorConfig, QuestionSource};

/// Quizcade Server - Multiplayer trivia game server
#[derive(Parser, Debug)]
#[command(name = "quizcade-server", version, about)]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:9876")]
    bind: String,

    /// Maximum simultaneous connections allowed
    #[arg(short, long, default_value_t = 100)]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizcade_server=debug,quizcade_common=debug".into()),
        )
        .init();

    let args = Args::parse();

    let addr: SocketAddr = args.bind.parse()?;

    let config = GeneratorConfig::from_env();
    let question_source: Option<Arc<dyn QuestionSource>> = match config.build() {
        Some(source) => {
            tracing::info!("Question generation via {} ({})", config.api_url, config.model);
            Some(Arc::new(source))
        }
        None => {
            tracing::info!("No QUIZ_API_TOKEN set, serving built-in fallback questions");
            None
        }
    };

    tracing::info!(
        "Starting quizcade server on {} (max {} connections)",
        addr,
        args.max_connections
    );
    server::run(addr, args.max_connections, question_source).await
}
