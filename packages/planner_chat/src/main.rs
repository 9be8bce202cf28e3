use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;

mod config;
mod connection;
mod error;
mod repl;
mod session;
mod upload;

use crate::connection::ChatConnection;
use crate::error::ClientError;
use crate::session::ChatSession;
use crate::upload::UploadClient;

#[derive(Parser)]
#[command(name = "planner")]
#[command(about = "Terminal client for the Financial Planner AI chat server")]
struct Cli {
    /// Path to config.toml (defaults to ./config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chat server host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Chat server port (overrides config)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let default_directive = "planner_chat=info";
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    let config_path = args.config.unwrap_or_else(|| PathBuf::from("config.toml"));
    let mut config: config::FileConfig = config::load_config(&config_path)
        .extract()
        .context("invalid configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let ws_url = config.ws_url();
    info!(url = %ws_url, "connecting to chat server");
    let (connection, events) = match ChatConnection::open(&ws_url).await {
        Ok(ok) => ok,
        Err(ClientError::Unavailable) => {
            eprintln!("planner: chat server at {ws_url} is unavailable");
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };

    let uploader = UploadClient::new(config.upload_url());
    let (handle, updates) = ChatSession::spawn(connection, events, uploader);

    println!("Connected. Type a message, /upload <path>, /history, or /quit.");
    repl::run_repl(handle, updates).await
}
