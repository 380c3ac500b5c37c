//! Shared mock implementations of the four injected provider traits, for
//! end-to-end scenario tests (expansion §4.14). Each carries a
//! `force_error` toggle and otherwise deterministic, scriptable state.

use async_trait::async_trait;
use coinhub::providers::{
    ChainMetadata, ChainMetadataProvider, ImageProxy, MarketDataProvider, MarketListEntry,
    OffchainMetadata, OffchainMetadataFetcher, SearchParams, TokenOverview,
};
use coinhub::types::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Scriptable market-data double. Per-address overviews are seeded via
/// `set_overview`; list calls return whatever `set_list` last configured.
pub struct MockMarketData {
    pub overviews: Mutex<HashMap<String, TokenOverview>>,
    pub trending: Mutex<Vec<MarketListEntry>>,
    pub new_listings: Mutex<Vec<MarketListEntry>>,
    pub top_gainers: Mutex<Vec<MarketListEntry>>,
    pub force_error: std::sync::atomic::AtomicBool,
    pub overview_calls: AtomicUsize,
}

impl Default for MockMarketData {
    fn default() -> Self {
        MockMarketData {
            overviews: Mutex::new(HashMap::new()),
            trending: Mutex::new(Vec::new()),
            new_listings: Mutex::new(Vec::new()),
            top_gainers: Mutex::new(Vec::new()),
            force_error: std::sync::atomic::AtomicBool::new(false),
            overview_calls: AtomicUsize::new(0),
        }
    }
}

impl MockMarketData {
    pub async fn set_overview(&self, address: &str, overview: TokenOverview) {
        self.overviews.lock().await.insert(address.to_string(), overview);
    }

    pub async fn set_trending(&self, entries: Vec<MarketListEntry>) {
        *self.trending.lock().await = entries;
    }

    pub fn overview_call_count(&self) -> usize {
        self.overview_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataProvider for MockMarketData {
    async fn get_token_overview(&self, address: &str) -> CoreResult<TokenOverview> {
        self.overview_calls.fetch_add(1, Ordering::SeqCst);
        if self.force_error.load(Ordering::SeqCst) {
            return Err(CoreError::Unavailable("mock market data down".to_string()));
        }
        Ok(self
            .overviews
            .lock()
            .await
            .get(address)
            .cloned()
            .unwrap_or(TokenOverview { address: address.to_string(), ..Default::default() }))
    }

    async fn get_trending(&self, _limit: usize) -> CoreResult<Vec<MarketListEntry>> {
        if self.force_error.load(Ordering::SeqCst) {
            return Err(CoreError::Unavailable("mock market data down".to_string()));
        }
        Ok(self.trending.lock().await.clone())
    }

    async fn get_new_listings(&self, _limit: usize) -> CoreResult<Vec<MarketListEntry>> {
        Ok(self.new_listings.lock().await.clone())
    }

    async fn get_top_gainers(&self, _limit: usize) -> CoreResult<Vec<MarketListEntry>> {
        Ok(self.top_gainers.lock().await.clone())
    }

    async fn search(&self, _params: SearchParams) -> CoreResult<Vec<MarketListEntry>> {
        Ok(vec![])
    }
}

/// Chain-metadata double: returns the default (empty) account unless
/// `force_error` is set.
#[derive(Default)]
pub struct MockChainMetadata {
    pub force_error: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl ChainMetadataProvider for MockChainMetadata {
    async fn get_metadata_account(&self, _address: &str) -> CoreResult<ChainMetadata> {
        if self.force_error.load(Ordering::SeqCst) {
            return Err(CoreError::Unavailable("mock chain metadata down".to_string()));
        }
        Ok(ChainMetadata::default())
    }
}

/// Off-chain metadata double: returns the default (empty) document unless
/// `force_error` is set.
#[derive(Default)]
pub struct MockOffchainMetadata {
    pub force_error: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl OffchainMetadataFetcher for MockOffchainMetadata {
    async fn fetch_metadata(&self, _uri: &str) -> CoreResult<OffchainMetadata> {
        if self.force_error.load(Ordering::SeqCst) {
            return Err(CoreError::Unavailable("mock offchain fetch down".to_string()));
        }
        Ok(OffchainMetadata::default())
    }
}

/// Image proxy double: never has an existing hosted URL, always
/// "succeeds" the upload with a deterministic URL.
#[derive(Default)]
pub struct MockImageProxy {
    pub force_error: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl ImageProxy for MockImageProxy {
    async fn get_s3_url(&self, _source_url: &str) -> CoreResult<Option<String>> {
        Ok(None)
    }

    async fn process_and_upload_image(&self, _source_url: &str, address: &str) -> CoreResult<String> {
        if self.force_error.load(Ordering::SeqCst) {
            return Err(CoreError::Unavailable("mock image proxy down".to_string()));
        }
        Ok(format!("https://cdn.example.com/{address}.png"))
    }
}
