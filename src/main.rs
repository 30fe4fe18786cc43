use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tracing_subscriber::EnvFilter;

use stay_pricing::adapters::cache::memory_cache::MemoryCache;
use stay_pricing::adapters::memory_store::{Fixtures, InMemoryStore};
use stay_pricing::config::load_config;
use stay_pricing::domain::dates::to_local_midnight;
use stay_pricing::engine::availability_service::AvailabilityService;
use stay_pricing::engine::change_applier::PeakSeasonChangeApplier;
use stay_pricing::engine::invalidation::CacheInvalidator;
use stay_pricing::engine::peak_season_service::PeakSeasonService;
use stay_pricing::mcp::server::PricingMcpServer;
use stay_pricing::ports::cache::ResultCache;
use stay_pricing::ports::pricing_repository::PricingRepository;

fn find_config_path() -> PathBuf {
    let candidates = [PathBuf::from("config.yaml"), exe_dir().join("config.yaml")];

    for path in &candidates {
        if path.exists() {
            return path.clone();
        }
    }

    candidates[0].clone()
}

fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting stay-pricing server");

    let config_path = find_config_path();
    let config = load_config(&config_path)?;

    let store = match &config.store.fixtures_path {
        Some(path) => {
            tracing::info!("Loading fixtures from {}", path.display());
            Arc::new(InMemoryStore::from_fixtures(Fixtures::load(path)?)?)
        }
        None => Arc::new(InMemoryStore::new()),
    };
    let repository: Arc<dyn PricingRepository> = store.clone();
    let cache: Arc<dyn ResultCache> = Arc::new(MemoryCache::new(config.cache.max_entries));

    let availability = AvailabilityService::new(Arc::clone(&repository), Arc::clone(&cache), &config);
    let seasons = PeakSeasonService::new(
        Arc::clone(&repository),
        CacheInvalidator::new(cache),
        config.engine.clone(),
    );

    // Fixture rooms start with a year of availability and fixture seasons
    // are materialized before the first request.
    let today = to_local_midnight(&Local::now());
    for room in store.rooms().await {
        if room.deleted {
            continue;
        }
        availability.seed_room(&room.id, today).await?;
    }
    let applier = PeakSeasonChangeApplier::new(repository);
    for season in store.peak_seasons().await {
        applier.apply_changes(&season, None, false).await?;
    }

    let server = PricingMcpServer::new(availability, seasons);

    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}
