//! Injected upstream capabilities (spec §1, §6).
//!
//! The engine never talks to a concrete upstream API directly; it depends
//! on these four traits so that market-data, chain-metadata, off-chain
//! metadata, and image-hosting concerns can be swapped or mocked without
//! touching the enrichment/retrieval/list-refresh logic. Concrete HTTP
//! implementations live in sibling modules; `tests/integration` provides
//! mock implementations behind the same traits.

pub mod chain_metadata;
pub mod image_proxy;
pub mod market_data;
pub mod offchain;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::CoreResult;

/// Snapshot of a single token's market data, as returned by the market-data
/// provider's per-token overview call (spec §4.5 step 1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenOverview {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub logo_uri: Option<String>,
    pub price: Option<rust_decimal::Decimal>,
    pub price_change_24h_pct: Option<rust_decimal::Decimal>,
    pub market_cap: Option<rust_decimal::Decimal>,
    pub volume_24h_usd: Option<rust_decimal::Decimal>,
    pub volume_change_24h_pct: Option<rust_decimal::Decimal>,
    pub liquidity: Option<rust_decimal::Decimal>,
    pub fully_diluted_valuation: Option<rust_decimal::Decimal>,
    pub rank: Option<i64>,
    /// Tags as reported directly by the market-data provider (spec §4.5
    /// precedence: input tags beat these, these beat nothing).
    pub tags: Vec<String>,
}

/// A single row in a trending/new-listings/top-gainer result set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketListEntry {
    pub address: String,
    pub overview: TokenOverview,
}

/// Parameters for a `search` call (spec §6 `SearchCoins`).
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub query: String,
    pub limit: usize,
}

/// Market-data aggregator: trending lists, new listings, top gainers, a
/// per-token overview, and text search (spec §4.5 step 1, §4.7, §4.8).
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn get_token_overview(&self, address: &str) -> CoreResult<TokenOverview>;
    async fn get_trending(&self, limit: usize) -> CoreResult<Vec<MarketListEntry>>;
    async fn get_new_listings(&self, limit: usize) -> CoreResult<Vec<MarketListEntry>>;
    async fn get_top_gainers(&self, limit: usize) -> CoreResult<Vec<MarketListEntry>>;
    async fn search(&self, params: SearchParams) -> CoreResult<Vec<MarketListEntry>>;
}

/// On-chain SPL metadata-account contents (spec §4.5 step 2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    /// The metadata account's `uri` field, typically pointing at off-chain
    /// JSON (Metaplex-style). Empty if the mint has no metadata account.
    pub metadata_uri: Option<String>,
}

/// Reads an SPL token's on-chain metadata account (spec §6 `chain.getMetadataAccount`).
#[async_trait]
pub trait ChainMetadataProvider: Send + Sync {
    async fn get_metadata_account(&self, address: &str) -> CoreResult<ChainMetadata>;
}

/// Off-chain JSON metadata (Metaplex `uri` target or equivalent), modeled
/// as a generic string-keyed map since field names vary widely across
/// mints (spec §9 Design Notes: "string-keyed heterogeneous JSON maps").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OffchainMetadata {
    pub fields: HashMap<String, serde_json::Value>,
}

impl OffchainMetadata {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    /// Reads `extensions.<key>` (a common nested shape for socials).
    pub fn get_extension(&self, key: &str) -> Option<&str> {
        self.fields
            .get("extensions")
            .and_then(|v| v.as_object())
            .and_then(|obj| obj.get(key))
            .and_then(|v| v.as_str())
    }
}

/// Fetches off-chain JSON metadata by URI (spec §6 `offchain.fetchMetadata`).
#[async_trait]
pub trait OffchainMetadataFetcher: Send + Sync {
    async fn fetch_metadata(&self, uri: &str) -> CoreResult<OffchainMetadata>;
}

/// Proxies and re-hosts token logos (spec §4.10, §6 `imageProxy`).
#[async_trait]
pub trait ImageProxy: Send + Sync {
    /// Returns an existing S3-hosted copy of `source_url`, if one exists.
    async fn get_s3_url(&self, source_url: &str) -> CoreResult<Option<String>>;

    /// Downloads `source_url`, uploads it to S3, and returns the hosted URL.
    /// Called fire-and-forget by C10; callers must still honor the global
    /// upload semaphore themselves before invoking this.
    async fn process_and_upload_image(&self, source_url: &str, address: &str) -> CoreResult<String>;
}
