//! Core engine: cache → store → upstream retrieval, batch retrieval, list
//! refreshing, curated-list reads, logo side-effects, and the native-asset
//! shim (spec §4.5–§4.11).
//!
//! `CoinService` is the library's operation surface (spec §6): callers
//! depend on it as plain async methods, never through an HTTP/RPC layer.

pub mod batch;
pub mod enrichment;
pub mod curated_list;
pub mod list_refresher;
pub mod logo;
pub mod native_asset;
pub mod search;
pub mod single_token;

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::cache::FreshnessCache;
use crate::content_filter::BannedWords;
use crate::providers::{ChainMetadataProvider, ImageProxy, MarketDataProvider, OffchainMetadataFetcher};
use crate::singleflight::SingleFlightRegistry;
use crate::store::Store;
use crate::types::Coin;

/// Wires together persistence, upstream providers, the freshness cache,
/// the single-flight registry, and the banned-word set behind a single
/// operation surface.
pub struct CoinService {
    pub(crate) store: Store,
    pub(crate) market_data: Arc<dyn MarketDataProvider>,
    pub(crate) chain_metadata: Arc<dyn ChainMetadataProvider>,
    pub(crate) offchain: Arc<dyn OffchainMetadataFetcher>,
    pub(crate) image_proxy: Arc<dyn ImageProxy>,
    pub(crate) banned_words: BannedWords,
    pub(crate) coin_cache: FreshnessCache<Coin>,
    pub(crate) list_cache: FreshnessCache<Vec<Coin>>,
    pub(crate) single_flight: SingleFlightRegistry,
    /// Global cap on concurrent image uploads (spec §6 `imageUploadLimiter`).
    pub(crate) image_upload_limiter: Arc<Semaphore>,
    pub(crate) cidv0_gateways: Vec<String>,
    pub(crate) cidv1_gateways: Vec<String>,
    pub(crate) cancellation: CancellationToken,
}

/// Dependencies required to build a `CoinService`. Kept as a plain struct
/// (rather than a long constructor argument list) since the set of
/// injected capabilities is large (spec §9: "injected capabilities not globals").
pub struct CoinServiceDeps {
    pub store: Store,
    pub market_data: Arc<dyn MarketDataProvider>,
    pub chain_metadata: Arc<dyn ChainMetadataProvider>,
    pub offchain: Arc<dyn OffchainMetadataFetcher>,
    pub image_proxy: Arc<dyn ImageProxy>,
    pub image_upload_concurrency: usize,
    pub cidv0_gateways: Vec<String>,
    pub cidv1_gateways: Vec<String>,
}

impl CoinService {
    pub fn new(deps: CoinServiceDeps) -> Self {
        CoinService {
            store: deps.store,
            market_data: deps.market_data,
            chain_metadata: deps.chain_metadata,
            offchain: deps.offchain,
            image_proxy: deps.image_proxy,
            banned_words: BannedWords::new(),
            coin_cache: FreshnessCache::new(),
            list_cache: FreshnessCache::new(),
            single_flight: SingleFlightRegistry::new(),
            image_upload_limiter: Arc::new(Semaphore::new(deps.image_upload_concurrency.max(1))),
            cidv0_gateways: deps.cidv0_gateways,
            cidv1_gateways: deps.cidv1_gateways,
            cancellation: CancellationToken::new(),
        }
    }

    /// Load the banned-word set from the store (spec §6 `ReloadBannedWords`).
    pub async fn reload_banned_words(&self) -> crate::types::CoreResult<()> {
        let words = self.store.load_banned_words().await?;
        self.banned_words.reload(words);
        Ok(())
    }

    /// The backing store, for callers that need direct read access (the
    /// ambient status dashboard, integration test fixtures).
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Request cooperative cancellation of any in-flight list refreshes or
    /// enrichment calls that poll this token (spec §5).
    pub fn shutdown(&self) {
        self.cancellation.cancel();
    }

    /// Snapshot of the engine's own cache occupancy, for the ambient
    /// status endpoint (expansion §4.1). Never touches coin data.
    pub async fn health(&self) -> EngineHealth {
        EngineHealth {
            coin_cache_entries: self.coin_cache.len().await,
            list_cache_entries: self.list_cache.len().await,
            shutting_down: self.cancellation.is_cancelled(),
        }
    }
}

/// Engine-level health snapshot reported by the ambient dashboard.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineHealth {
    pub coin_cache_entries: usize,
    pub list_cache_entries: usize,
    pub shutting_down: bool,
}
