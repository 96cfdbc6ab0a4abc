mod collectors;
mod config;
mod format;
mod http;
mod report;
mod snapshot;
mod sources;

use axum::serve;
use clap::Parser;
use collectors::Scanner;
use config::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sysfacts")]
#[command(version)]
struct Cli {
    /// YAML config file; built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    print_default_config: bool,
    /// Serve snapshots over HTTP instead of printing one and exiting.
    #[arg(long, conflicts_with = "text")]
    serve: bool,
    /// Print a plain-text report instead of JSON.
    #[arg(long)]
    text: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match cli.config.as_deref() {
        Some(path) => match Config::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, "failed to load configuration");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    if cli.serve {
        run_server(cfg).await;
    } else {
        run_once(cfg, cli.text).await;
    }
}

async fn run_once(cfg: Config, text: bool) {
    info!(distribution = ?cfg.distribution, "running a single scan");
    let scanner = Scanner::new(cfg);
    let snapshot = scanner.scan().await;
    if text {
        print!("{}", report::render(&snapshot));
        return;
    }
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            error!(error = %err, "failed to serialize snapshot");
            std::process::exit(1);
        }
    }
}

async fn run_server(cfg: Config) {
    info!(listen = %cfg.listen, distribution = ?cfg.distribution, "starting sysfacts");

    let addr: SocketAddr = match cfg.listen.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, listen = %cfg.listen, "invalid listen address");
            std::process::exit(1);
        }
    };
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(err) => {
            error!(error = %err, "failed to start HTTP server");
            std::process::exit(1);
        }
    };

    let scanner = Arc::new(Mutex::new(Scanner::new(cfg)));
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let http_task = tokio::spawn(async move {
        let app = http::build_router(scanner);
        let server = serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        });
        if let Err(err) = server.await {
            error!(error = %err, "HTTP server error");
        }
    });

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to wait for Ctrl+C");
    }
    info!("received Ctrl+C, shutting down");

    let _ = shutdown_tx.send(true);
    let _ = http_task.await;
}

/// Logs go to stderr so the JSON printed by a one-shot run stays clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
