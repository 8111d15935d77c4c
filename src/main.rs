mod config;
mod content_loader;
mod dates;
mod error;
mod export;
mod hot_reload;
mod markdown;
mod models;
mod navigation;
mod remote;
mod render;
mod routes;
mod seo;
mod sitemap;
mod state;

use std::{net::SocketAddr, path::PathBuf, process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::SiteConfig;
use crate::content_loader::load_content;
use crate::error::{BlogError, Result};
use crate::hot_reload::start_content_watcher;
use crate::remote::RemoteSource;
use crate::routes::build_router;
use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "memes-blog", version, about = "Markdown blog server and static exporter")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the site over HTTP (default).
    Serve,
    /// Render every page into a static directory.
    Export {
        #[arg(long, default_value = "dist")]
        out: PathBuf,
    },
    /// Snapshot the posts of a remote API into a JSON file.
    Fetch {
        #[arg(long, env = "BLOG_API_URL")]
        url: String,
        #[arg(long, default_value = "posts.json")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Export { out } => export_static(out).await,
        Command::Fetch { url, out } => fetch_posts(url, out).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn serve() -> Result<()> {
    let config = SiteConfig::load()?;
    info!("RUST_ENV is set to development: {}", config.is_development);

    let content = load_content(&config).await?;
    let port = config.port;
    let is_development = config.is_development;
    let watch_local = config.api_url.is_none();
    let state = Arc::new(AppState::new(config, content));

    // Hot-reload setup
    let (tx, _rx) = broadcast::channel(1);
    if is_development && watch_local {
        info!("Hot reload enabled. Check logs for file change events.");
        start_content_watcher(tx.clone(), state.clone());
    }

    let app = build_router(state, tx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "listening");
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| BlogError::io(format!("tcp://{addr}"), e))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| BlogError::io(format!("tcp://{addr}"), e))
}

async fn export_static(out: PathBuf) -> Result<()> {
    let config = SiteConfig::load()?;
    let content = load_content(&config).await?;
    let today = chrono::Utc::now().date_naive();
    let report = export::export_site(&content, &config, &out, today).await?;
    info!(
        pages = report.pages.len(),
        skipped = report.skipped.len(),
        "Static pages written to {}",
        out.display()
    );
    Ok(())
}

async fn fetch_posts(url: String, out: PathBuf) -> Result<()> {
    let count = RemoteSource::new(url).fetch_to_file(&out).await?;
    info!(count, "Posts saved to {}", out.display());
    Ok(())
}
