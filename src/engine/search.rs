//! Token search (spec §6 `SearchCoins`): delegates the text query to the
//! market-data provider, enriches hits with bounded concurrency, then
//! filters by tag membership and minimum volume before paging.

use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use tracing::warn;

use super::enrichment::EnrichmentInput;
use super::CoinService;
use crate::providers::SearchParams;
use crate::types::{paginate, Coin, CoreError, CoreResult};

/// Hard cap on the query string length (spec §6).
const MAX_QUERY_LEN: usize = 256;

/// Hard cap on each tag's length (spec §6).
const MAX_TAG_LEN: usize = 64;

/// `limit` is capped at this value regardless of what the caller requests,
/// mirroring C9's boundary behavior (spec §8).
const MAX_LIMIT: usize = 100;

/// How many hits to request from the market-data provider's search before
/// local filtering and pagination.
const SEARCH_FETCH_LIMIT: usize = 100;

/// Bounded concurrency for enriching search hits (spec §5 precedent: C7/C8
/// both bound upstream fan-out; search reuses the same discipline).
const SEARCH_ENRICH_CONCURRENCY: usize = 5;

/// A validated `SearchCoins` request (spec §6).
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: String,
    pub tags: Vec<String>,
    pub min_volume_24h_usd: Decimal,
    pub limit: usize,
    pub offset: usize,
}

impl SearchQuery {
    fn validate(&self) -> CoreResult<()> {
        if self.query.chars().count() > MAX_QUERY_LEN {
            return Err(CoreError::InvalidArgument(format!("query exceeds {MAX_QUERY_LEN} characters")));
        }
        if let Some(bad) = self.tags.iter().find(|t| t.chars().count() > MAX_TAG_LEN) {
            return Err(CoreError::InvalidArgument(format!("tag '{bad}' exceeds {MAX_TAG_LEN} characters")));
        }
        if self.min_volume_24h_usd < Decimal::ZERO {
            return Err(CoreError::InvalidArgument("minVolume24hUSD must be non-negative".to_string()));
        }
        Ok(())
    }
}

impl CoinService {
    /// Search for coins by text query, optionally narrowed by required tags
    /// and a minimum 24h volume (spec §6 `SearchCoins`).
    pub async fn search_coins(&self, query: SearchQuery) -> CoreResult<(Vec<Coin>, usize)> {
        query.validate()?;

        let hits = self
            .market_data
            .search(SearchParams { query: query.query.clone(), limit: SEARCH_FETCH_LIMIT })
            .await?;

        let enriched: Vec<Coin> = stream::iter(hits.into_iter().map(|entry| {
            let input = EnrichmentInput {
                address: entry.address.clone(),
                tags: entry.overview.tags.clone(),
                ..Default::default()
            };
            self.enrich(input)
        }))
        .buffer_unordered(SEARCH_ENRICH_CONCURRENCY)
        .filter_map(|result| async move {
            match result {
                Ok(coin) => Some(coin),
                Err(e) => {
                    warn!(error = %e, "search hit failed enrichment, eliding");
                    None
                }
            }
        })
        .collect()
        .await;

        let filtered: Vec<Coin> = enriched
            .into_iter()
            .filter(|c| query.tags.iter().all(|t| c.has_tag(t)))
            .filter(|c| c.volume_24h_usd >= query.min_volume_24h_usd)
            .collect();

        Ok(paginate(filtered, query.offset, query.limit.min(MAX_LIMIT)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CoinService, CoinServiceDeps};
    use crate::providers::{
        ChainMetadata, ChainMetadataProvider, ImageProxy, MarketDataProvider, MarketListEntry,
        OffchainMetadata, OffchainMetadataFetcher, TokenOverview,
    };
    use crate::store::Store;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct ScriptedSearch {
        hits: Vec<MarketListEntry>,
    }

    #[async_trait]
    impl MarketDataProvider for ScriptedSearch {
        async fn get_token_overview(&self, address: &str) -> CoreResult<TokenOverview> {
            let entry = self.hits.iter().find(|h| h.address == address);
            Ok(TokenOverview {
                address: address.to_string(),
                name: Some(format!("Coin {address}")),
                symbol: Some("X".to_string()),
                volume_24h_usd: entry.map(|h| h.overview.volume_24h_usd.unwrap_or_default()),
                tags: entry.map(|h| h.overview.tags.clone()).unwrap_or_default(),
                ..Default::default()
            })
        }
        async fn get_trending(&self, _limit: usize) -> CoreResult<Vec<MarketListEntry>> {
            Ok(vec![])
        }
        async fn get_new_listings(&self, _limit: usize) -> CoreResult<Vec<MarketListEntry>> {
            Ok(vec![])
        }
        async fn get_top_gainers(&self, _limit: usize) -> CoreResult<Vec<MarketListEntry>> {
            Ok(vec![])
        }
        async fn search(&self, _params: SearchParams) -> CoreResult<Vec<MarketListEntry>> {
            Ok(self.hits.clone())
        }
    }

    struct NoopChain;
    #[async_trait]
    impl ChainMetadataProvider for NoopChain {
        async fn get_metadata_account(&self, _address: &str) -> CoreResult<ChainMetadata> {
            Ok(ChainMetadata::default())
        }
    }
    struct NoopOffchain;
    #[async_trait]
    impl OffchainMetadataFetcher for NoopOffchain {
        async fn fetch_metadata(&self, _uri: &str) -> CoreResult<OffchainMetadata> {
            Ok(OffchainMetadata::default())
        }
    }
    struct NoopImageProxy;
    #[async_trait]
    impl ImageProxy for NoopImageProxy {
        async fn get_s3_url(&self, _source_url: &str) -> CoreResult<Option<String>> {
            Ok(None)
        }
        async fn process_and_upload_image(&self, _source_url: &str, _address: &str) -> CoreResult<String> {
            Ok(String::new())
        }
    }

    fn hit(address: &str, volume: rust_decimal::Decimal, tags: &[&str]) -> MarketListEntry {
        MarketListEntry {
            address: address.to_string(),
            overview: TokenOverview {
                volume_24h_usd: Some(volume),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            },
        }
    }

    async fn build_service(hits: Vec<MarketListEntry>) -> CoinService {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        CoinService::new(CoinServiceDeps {
            store,
            market_data: Arc::new(ScriptedSearch { hits }),
            chain_metadata: Arc::new(NoopChain),
            offchain: Arc::new(NoopOffchain),
            image_proxy: Arc::new(NoopImageProxy),
            image_upload_concurrency: 4,
            cidv0_gateways: vec![],
            cidv1_gateways: vec![],
        })
    }

    #[tokio::test]
    async fn test_query_too_long_rejected() {
        let service = build_service(vec![]).await;
        let result = service
            .search_coins(SearchQuery { query: "a".repeat(257), limit: 10, ..Default::default() })
            .await;
        assert!(matches!(result, Err(CoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_tag_too_long_rejected() {
        let service = build_service(vec![]).await;
        let result = service
            .search_coins(SearchQuery { tags: vec!["x".repeat(65)], limit: 10, ..Default::default() })
            .await;
        assert!(matches!(result, Err(CoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_negative_min_volume_rejected() {
        let service = build_service(vec![]).await;
        let result = service
            .search_coins(SearchQuery {
                min_volume_24h_usd: rust_decimal_macros::dec!(-1),
                limit: 10,
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(CoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_search_filters_by_min_volume() {
        let hits = vec![
            hit("Low", rust_decimal_macros::dec!(10), &[]),
            hit("High", rust_decimal_macros::dec!(1000), &[]),
        ];
        let service = build_service(hits).await;
        let (coins, total) = service
            .search_coins(SearchQuery {
                query: "coin".to_string(),
                min_volume_24h_usd: rust_decimal_macros::dec!(100),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(coins.len(), 1);
        assert_eq!(coins[0].address, "High");
    }

    #[tokio::test]
    async fn test_search_filters_require_all_tags() {
        let hits = vec![
            hit("Partial", rust_decimal_macros::dec!(0), &["meme"]),
            hit("Full", rust_decimal_macros::dec!(0), &["meme", "trending"]),
        ];
        let service = build_service(hits).await;
        let (coins, total) = service
            .search_coins(SearchQuery {
                tags: vec!["meme".to_string(), "trending".to_string()],
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(coins[0].address, "Full");
    }

    #[tokio::test]
    async fn test_search_paginates_results() {
        let hits = vec![
            hit("A", rust_decimal_macros::dec!(0), &[]),
            hit("B", rust_decimal_macros::dec!(0), &[]),
            hit("C", rust_decimal_macros::dec!(0), &[]),
        ];
        let service = build_service(hits).await;
        let (coins, total) = service
            .search_coins(SearchQuery { limit: 2, offset: 1, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(coins.len(), 2);
    }
}
