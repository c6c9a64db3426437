// SPDX-License-Identifier: Apache-2.0
//! Network map rendering daemon (netmapd)
//!
//! Wires the document store, catalog and datasource registry together,
//! kicks off one cache fetch per datasource and serves the HTTP API.

mod auth;
mod error;
mod params;
mod routes;
mod settings;
mod state;
mod svg;

use anyhow::Result;
use clap::Parser;
use netmap_source::{SheetCacheSource, SourceRegistry};
use netmap_store::{Catalog, DocumentStore, MemoryStore};
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Directory holding netmapd.json
    #[clap(short, long, default_value = "/etc/netmap")]
    config_dir: PathBuf,

    /// Port for the HTTP API
    #[clap(short, long, default_value_t = 8000)]
    api_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting netmapd...");
    let settings = settings::load(args.config_dir)?;

    let memory = Arc::new(MemoryStore::new());
    if let Some(seed) = &settings.store_seed {
        let loaded = memory.load_seed(seed)?;
        info!(count = loaded, path = %seed.display(), "loaded document seed");
    }
    let store: Arc<dyn DocumentStore> = memory;

    let catalog = Catalog::new(Arc::clone(&store));
    catalog.seed_default_templates(&settings.node_templates)?;

    let mut registry = SourceRegistry::new();
    registry.register(
        "sheets",
        Arc::new(SheetCacheSource::new(
            Arc::clone(&store),
            settings.sheet_seed.clone(),
        )),
    );

    // Fire-and-forget cache refresh per source; readers see whatever
    // has landed so far.
    for (name, source) in registry.iter() {
        let name = name.to_string();
        let source = Arc::clone(source);
        tokio::task::spawn_blocking(move || match source.fetch() {
            Ok(count) => info!(source = %name, count, "cache fetch complete"),
            Err(err) => error!(source = %name, %err, "cache fetch failed"),
        });
    }

    let app = routes::router(AppState::new(
        catalog,
        registry,
        settings.tokens,
        settings.node_templates,
    ));

    let addr = format!("0.0.0.0:{}", args.api_port).parse::<SocketAddr>()?;
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP API server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
