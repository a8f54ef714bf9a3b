use anyhow::{Context, Result};
use facematch_core::EuclideanMatcher;
use facematch_store::{Database, DescriptorStore, RecognitionLedger};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod extractor;

use config::{BusKind, Config};
use dbus_interface::{FaceMatchService, BUS_NAME, OBJECT_PATH};
use engine::Engine;
use extractor::CommandExtractor;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facematchd starting");

    let config = Config::from_env();
    tracing::info!(
        db = %config.db_path.display(),
        threshold = config.match_threshold,
        dimension = ?config.dimension,
        extractor = %config.extractor_command,
        "configuration loaded"
    );

    let db = Database::open(&config.db_path)
        .await
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    let store = DescriptorStore::new(db.clone(), config.dimension).await?;
    let ledger = RecognitionLedger::new(db.clone());

    let extractor = CommandExtractor::new(&config.extractor_command, config.extractor_args.clone());
    let engine = Engine::new(extractor, EuclideanMatcher, store, ledger, config.match_threshold);

    let builder = match config.bus {
        BusKind::Session => zbus::connection::Builder::session()?,
        BusKind::System => zbus::connection::Builder::system()?,
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, FaceMatchService::new(engine))?
        .build()
        .await
        .context("registering on D-Bus")?;

    tracing::info!(bus = ?config.bus, name = BUS_NAME, "facematchd ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("facematchd shutting down");

    Ok(())
}
