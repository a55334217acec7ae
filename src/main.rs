use anyhow::Context;
use clap::{Parser, Subcommand};
use seisquery::{EventService, Outcome};
use seisquery_core::config::Config;
use seisquery_core::{CatalogStore, MemoryCatalog};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "seisquery", version, about = "FDSN-style seismic event query service")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, global = true)]
    debug: bool,

    /// TOML config layered over the built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the event query endpoints over HTTP.
    Serve {
        /// Catalog dump to serve; overrides `catalog.path`.
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Listen address; overrides `server.listen`.
        #[arg(long)]
        listen: Option<SocketAddr>,
    },
    /// Run one query against a catalog dump and write the result to stdout.
    Query {
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Request parameters as `key=value`.
        params: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { catalog, listen } => {
            let path = catalog.or_else(|| config.catalog.path.clone());
            let store = open_store(path.as_deref());
            let service = Arc::new(EventService::new(store, config.service.clone())?);
            let addr = listen.unwrap_or(config.server.listen);

            tokio::runtime::Runtime::new()?
                .block_on(seisquery::server::serve(addr, service))
        }
        Command::Query { catalog, params } => {
            let path = catalog
                .or_else(|| config.catalog.path.clone())
                .context("no catalog given (use --catalog or catalog.path)")?;
            let store: Arc<dyn CatalogStore> = Arc::new(MemoryCatalog::from_path(&path)?);
            let service = EventService::new(Some(store), config.service.clone())?;

            let pairs = params
                .iter()
                .map(|p| {
                    p.split_once('=')
                        .with_context(|| format!("expected key=value, got '{p}'"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let stdout = std::io::stdout().lock();
            match service.run(&pairs, stdout, CancellationToken::new())? {
                Outcome::NoContent { status } => {
                    tracing::info!(status, "no matching events found");
                }
                Outcome::Partial { reason, .. } => {
                    anyhow::bail!("output cut short: {reason}");
                }
                Outcome::Complete { .. } => {}
            }
            Ok(())
        }
    }
}

/// A catalog that fails to load leaves the server up; searches then report
/// the store as unavailable.
fn open_store(path: Option<&Path>) -> Option<Arc<dyn CatalogStore>> {
    let Some(path) = path else {
        tracing::warn!("no catalog configured");
        return None;
    };
    match MemoryCatalog::from_path(path) {
        Ok(catalog) => Some(Arc::new(catalog)),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "could not open catalog");
            None
        }
    }
}
