//! Native-asset shim (C11): a pseudo-`Coin` for native SOL, mirroring the
//! wrapped-SOL mint's market fields under a synthetic address distinct
//! from any real mint (I5, spec §4.11).

use tracing::warn;

use super::CoinService;
use crate::cache::COIN_CACHE_EXPIRY;
use crate::types::{Coin, NATIVE_SOL_PSEUDO_ADDRESS, WRAPPED_SOL_ADDRESS};
use crate::types::CoreResult;

const NATIVE_SOL_NAME: &str = "Solana";
const NATIVE_SOL_SYMBOL: &str = "SOL";
const NATIVE_SOL_DECIMALS: u8 = 9;

impl CoinService {
    /// Return the native-SOL pseudo-coin, refreshed from the wrapped-SOL
    /// mint. If the wrapped-SOL refresh fails, degrades to whatever
    /// pseudo-coin row is already stored (spec §7).
    pub async fn get_native_asset(&self) -> CoreResult<Coin> {
        match self.get_coin_by_address(WRAPPED_SOL_ADDRESS, false).await {
            Ok(wrapped) => {
                let existing = self.store.get_by_address(NATIVE_SOL_PSEUDO_ADDRESS).await?;
                let mut pseudo = existing.unwrap_or_else(|| Coin::new_bare(NATIVE_SOL_PSEUDO_ADDRESS));
                mirror_market_fields(&mut pseudo, &wrapped);

                let persisted = if pseudo.id == 0 {
                    self.store.create(&pseudo).await?
                } else {
                    self.store.update(&pseudo).await?;
                    pseudo
                };
                self.coin_cache.set(NATIVE_SOL_PSEUDO_ADDRESS, persisted.clone(), COIN_CACHE_EXPIRY).await;
                Ok(persisted)
            }
            Err(e) => match self.store.get_by_address(NATIVE_SOL_PSEUDO_ADDRESS).await? {
                Some(stale) => {
                    warn!(error = %e, "wrapped-SOL refresh failed, serving stale native-asset data");
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }
}

fn mirror_market_fields(pseudo: &mut Coin, wrapped: &Coin) {
    pseudo.name = NATIVE_SOL_NAME.to_string();
    pseudo.symbol = NATIVE_SOL_SYMBOL.to_string();
    pseudo.decimals = NATIVE_SOL_DECIMALS;
    pseudo.description = wrapped.description.clone();
    pseudo.logo_uri = wrapped.logo_uri.clone();
    pseudo.price = wrapped.price;
    pseudo.price_change_24h_pct = wrapped.price_change_24h_pct;
    pseudo.market_cap = wrapped.market_cap;
    pseudo.volume_24h_usd = wrapped.volume_24h_usd;
    pseudo.volume_change_24h_pct = wrapped.volume_change_24h_pct;
    pseudo.liquidity = wrapped.liquidity;
    pseudo.fully_diluted_valuation = wrapped.fully_diluted_valuation;
    pseudo.rank = wrapped.rank;
    pseudo.last_updated = wrapped.last_updated;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CoinService, CoinServiceDeps};
    use crate::providers::{
        ChainMetadata, ChainMetadataProvider, ImageProxy, MarketDataProvider, MarketListEntry,
        OffchainMetadata, OffchainMetadataFetcher, SearchParams, TokenOverview,
    };
    use crate::store::Store;
    use crate::types::CoreError;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct WrappedSolMarketData;
    #[async_trait]
    impl MarketDataProvider for WrappedSolMarketData {
        async fn get_token_overview(&self, address: &str) -> CoreResult<TokenOverview> {
            Ok(TokenOverview {
                address: address.to_string(),
                name: Some("Wrapped SOL".to_string()),
                symbol: Some("wSOL".to_string()),
                price: Some(rust_decimal_macros::dec!(150.0)),
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
            Ok(vec![])
        }
    }

    struct FailingMarketData;
    #[async_trait]
    impl MarketDataProvider for FailingMarketData {
        async fn get_token_overview(&self, _address: &str) -> CoreResult<TokenOverview> {
            Err(CoreError::Unavailable("down".to_string()))
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
            Ok(vec![])
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

    #[tokio::test]
    async fn test_native_asset_mirrors_wrapped_sol() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let service = CoinService::new(CoinServiceDeps {
            store,
            market_data: Arc::new(WrappedSolMarketData),
            chain_metadata: Arc::new(NoopChain),
            offchain: Arc::new(NoopOffchain),
            image_proxy: Arc::new(NoopImageProxy),
            image_upload_concurrency: 4,
            cidv0_gateways: vec![],
            cidv1_gateways: vec![],
        });

        let native = service.get_native_asset().await.unwrap();
        assert_eq!(native.address, NATIVE_SOL_PSEUDO_ADDRESS);
        assert_eq!(native.symbol, "SOL");
        assert_eq!(native.price, rust_decimal_macros::dec!(150.0));
        assert_ne!(native.address, WRAPPED_SOL_ADDRESS);
    }

    #[tokio::test]
    async fn test_native_asset_degrades_to_stale_on_upstream_failure() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let service = CoinService::new(CoinServiceDeps {
            store: store.clone(),
            market_data: Arc::new(WrappedSolMarketData),
            chain_metadata: Arc::new(NoopChain),
            offchain: Arc::new(NoopOffchain),
            image_proxy: Arc::new(NoopImageProxy),
            image_upload_concurrency: 4,
            cidv0_gateways: vec![],
            cidv1_gateways: vec![],
        });
        let first = service.get_native_asset().await.unwrap();

        let failing_service = CoinService::new(CoinServiceDeps {
            store,
            market_data: Arc::new(FailingMarketData),
            chain_metadata: Arc::new(NoopChain),
            offchain: Arc::new(NoopOffchain),
            image_proxy: Arc::new(NoopImageProxy),
            image_upload_concurrency: 4,
            cidv0_gateways: vec![],
            cidv1_gateways: vec![],
        });
        let degraded = failing_service.get_native_asset().await.unwrap();
        assert_eq!(degraded.price, first.price);
    }

    #[tokio::test]
    async fn test_native_asset_errors_when_nothing_stored_and_upstream_fails() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let service = CoinService::new(CoinServiceDeps {
            store,
            market_data: Arc::new(FailingMarketData),
            chain_metadata: Arc::new(NoopChain),
            offchain: Arc::new(NoopOffchain),
            image_proxy: Arc::new(NoopImageProxy),
            image_upload_concurrency: 4,
            cidv0_gateways: vec![],
            cidv1_gateways: vec![],
        });
        assert!(service.get_native_asset().await.is_err());
    }
}
