//! Token-data aggregation and freshness engine for Solana mints.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the store and upstream providers into a `CoinService`, spawns
//! one refresh ticker per curated list (skipping any with
//! `fetch_interval_secs == 0`, per spec §6), spawns the ambient status
//! dashboard, and shuts down gracefully on Ctrl+C.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use coinhub::config::{self, AppConfig};
use coinhub::engine::{CoinService, CoinServiceDeps};
use coinhub::providers::chain_metadata::RpcChainMetadataProvider;
use coinhub::providers::image_proxy::HttpImageProxy;
use coinhub::providers::market_data::HttpMarketDataProvider;
use coinhub::providers::offchain::HttpOffchainMetadataFetcher;
use coinhub::types::ListKind;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();

    let config_path = std::env::var("COINHUB_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    info!(
        solana_rpc_endpoint = %cfg.service.solana_rpc_endpoint,
        dashboard_enabled = cfg.dashboard.enabled,
        image_proxy_enabled = cfg.image_proxy.enabled,
        "coinhub starting up"
    );

    let service = Arc::new(build_service(&cfg).await?);
    service.reload_banned_words().await.context("failed to load banned-word set")?;

    spawn_list_ticker(service.clone(), ListKind::Trending, cfg.lists.trending.fetch_interval_secs, cfg.lists.trending.concurrency);
    spawn_list_ticker(service.clone(), ListKind::NewCoin, cfg.lists.new_coins.fetch_interval_secs, cfg.lists.new_coins.concurrency);
    spawn_list_ticker(service.clone(), ListKind::TopGainer, cfg.lists.top_gainers.fetch_interval_secs, cfg.lists.top_gainers.concurrency);
    spawn_xstocks_seed_load(service.clone(), cfg.lists.xstocks.seed_path.clone());

    if cfg.dashboard.enabled {
        coinhub::dashboard::spawn_dashboard(service.clone(), cfg.dashboard.port)?;
    }

    info!("entering idle loop, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;

    info!("shutdown signal received, cancelling in-flight work");
    service.shutdown();
    Ok(())
}

async fn build_service(cfg: &AppConfig) -> Result<CoinService> {
    let store = coinhub::store::Store::connect("sqlite://coinhub.db").await?;

    let market_data_base_url = cfg
        .providers
        .market_data_base_url
        .clone()
        .unwrap_or_else(|| "https://public-api.birdeye.so".to_string());
    let market_data_api_key = match &cfg.providers.market_data_api_key_env {
        Some(env_name) => Some(config::AppConfig::resolve_env(env_name)?),
        None => None,
    };

    let market_data = Arc::new(HttpMarketDataProvider::new(market_data_base_url, market_data_api_key)?);
    let chain_metadata_endpoint = cfg
        .providers
        .chain_metadata_base_url
        .clone()
        .unwrap_or_else(|| cfg.service.solana_rpc_endpoint.clone());
    let chain_metadata = Arc::new(RpcChainMetadataProvider::new(chain_metadata_endpoint)?);
    let offchain_timeout = cfg.providers.offchain_fetch_timeout_secs.unwrap_or(10);
    let offchain = Arc::new(HttpOffchainMetadataFetcher::new(offchain_timeout)?);
    let image_proxy = Arc::new(HttpImageProxy::new(cfg.image_proxy.s3_host.clone(), cfg.image_proxy.upload_timeout_secs)?);

    Ok(CoinService::new(CoinServiceDeps {
        store,
        market_data,
        chain_metadata,
        offchain,
        image_proxy,
        image_upload_concurrency: cfg.image_proxy.upload_concurrency,
        cidv0_gateways: cfg.ipfs.cidv0_gateways.clone(),
        cidv1_gateways: cfg.ipfs.cidv1_gateways.clone(),
    }))
}

/// Spawn a periodic refresher for one curated list. `fetch_interval_secs
/// == 0` disables it entirely (spec §6), matching back to the fact the
/// crate's library surface never requires a running ticker to function.
fn spawn_list_ticker(service: Arc<CoinService>, kind: ListKind, fetch_interval_secs: u64, concurrency: usize) {
    if fetch_interval_secs == 0 {
        info!(list = %kind, "list refresher disabled (fetch_interval_secs = 0)");
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(fetch_interval_secs));
        let cancellation = service.cancellation_token();
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = service.refresh_list(kind, concurrency).await {
                        warn!(list = %kind, error = %e, "scheduled list refresh failed");
                    }
                }
                _ = cancellation.cancelled() => {
                    info!(list = %kind, "list refresher shutting down");
                    break;
                }
            }
        }
    });
}

/// Load the xstocks address seed file once at startup and refresh tag
/// membership from it (spec §4.8: xstocks membership comes from a static
/// seed, not an upstream list call).
fn spawn_xstocks_seed_load(service: Arc<CoinService>, seed_path: String) {
    tokio::spawn(async move {
        let addresses = match load_xstocks_seed(&seed_path) {
            Ok(addresses) => addresses,
            Err(e) => {
                error!(seed_path, error = %e, "failed to load xstocks seed, skipping refresh");
                return;
            }
        };
        if let Err(e) = service.refresh_xstocks_from_seed(addresses).await {
            warn!(error = %e, "xstocks refresh from seed failed");
        }
    });
}

fn load_xstocks_seed(seed_path: &str) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(seed_path)
        .with_context(|| format!("failed to read xstocks seed file: {seed_path}"))?;
    let addresses: Vec<String> =
        serde_yaml::from_str(&contents).with_context(|| format!("failed to parse xstocks seed file: {seed_path}"))?;
    Ok(addresses)
}

/// Initialise the `tracing` subscriber.
///
/// - In development (RUST_LOG set), uses human-readable pretty format.
/// - In production, uses structured JSON logging to stdout.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("coinhub=info"));

    if std::env::var("COINHUB_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
