//! Per-token retrieval (C6): cache → store → upstream fallback (spec §4.6).
//!
//! The 2-minute freshness cache is always consulted, even under
//! `force_refresh` — forcing a refresh skips the store's 24h-freshness
//! check, not the cache (spec §9 Open Questions: intentional, not a bug).

use tracing::warn;

use super::enrichment::EnrichmentInput;
use super::CoinService;
use crate::cache::{COIN_CACHE_EXPIRY, STALE_CACHE_TTL};
use crate::types::{is_valid_mint_address, Coin, CoreError, CoreResult, NATIVE_SOL_PSEUDO_ADDRESS};

impl CoinService {
    /// Fetch a single coin by its mint address (spec §6 `GetCoinByAddress`).
    pub async fn get_coin_by_address(&self, address: &str, force_refresh: bool) -> CoreResult<Coin> {
        if address == NATIVE_SOL_PSEUDO_ADDRESS {
            return Box::pin(self.get_native_asset()).await;
        }
        if !is_valid_mint_address(address) {
            return Err(CoreError::InvalidArgument(format!("invalid mint address: {address}")));
        }

        if let Some(cached) = self.coin_cache.get(address).await {
            return Ok(cached);
        }

        let stored = self.store.get_by_address(address).await?;

        if !force_refresh {
            if let Some(coin) = &stored {
                if coin.is_market_data_fresh() {
                    self.coin_cache.set(address, coin.clone(), COIN_CACHE_EXPIRY).await;
                    return Ok(coin.clone());
                }
            }
        }

        match self.enrich(EnrichmentInput::bare(address)).await {
            Ok(mut enriched) => {
                if let Some(existing) = &stored {
                    enriched.id = existing.id;
                    // I2: reserved-tag membership is authoritative per refresher only.
                    enriched.tags = existing.tags.clone();
                    self.store.update(&enriched).await?;
                } else {
                    self.trigger_logo_upload(&enriched);
                    enriched = self.store.create(&enriched).await?;
                }
                self.coin_cache.set(address, enriched.clone(), COIN_CACHE_EXPIRY).await;
                Ok(enriched)
            }
            Err(e) => {
                if let Some(coin) = stored {
                    warn!(address = %address, error = %e, "upstream refresh failed, serving stale store data");
                    self.coin_cache.set(address, coin.clone(), STALE_CACHE_TTL).await;
                    Ok(coin)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Fetch a single coin by its numeric store id (spec §6 `GetCoinById`).
    pub async fn get_coin_by_id(&self, id: i64) -> CoreResult<Coin> {
        let coin = self
            .store
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("coin id {id}")))?;
        self.get_coin_by_address(&coin.address, false).await
    }
}
