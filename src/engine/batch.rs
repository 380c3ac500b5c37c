//! Batch retrieval (C7): filter, page, triage, bounded-concurrency
//! upstream fetch, and a two-pass persist (spec §4.7, §5).

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::warn;

use super::enrichment::EnrichmentInput;
use super::CoinService;
use crate::cache::COIN_CACHE_EXPIRY;
use crate::types::{Coin, CoreResult};

/// Bounded concurrency for refreshing stale rows (spec §5: counting
/// semaphore capacity 5 in C7 update-stale).
const UPDATE_STALE_CONCURRENCY: usize = 5;

impl CoinService {
    /// Fetch coins for a set of addresses (spec §6 `GetCoinsByAddresses`).
    ///
    /// `force_refresh` skips the store's 24h-freshness check, but a
    /// per-address cache hit is honored regardless (spec §4.7 step 3, same
    /// cache-over-force precedence as C6). `max_workers` bounds concurrency
    /// for addresses with no stored row (spec §5: bounded worker pool in C7
    /// new-fetch). Invalid/empty addresses are dropped before any store or
    /// upstream call; an entirely-invalid input list makes no upstream
    /// calls at all.
    pub async fn get_coins_by_addresses(
        &self,
        addresses: &[String],
        force_refresh: bool,
        max_workers: usize,
    ) -> CoreResult<Vec<Coin>> {
        let valid: Vec<String> = addresses.iter().map(|a| a.trim()).filter(|a| !a.is_empty()).map(str::to_string).collect();
        if valid.is_empty() {
            return Ok(Vec::new());
        }

        let stored = self.store.list_by_addresses(&valid).await?;
        let stored_map: HashMap<String, Coin> = stored.into_iter().map(|c| (c.address.clone(), c)).collect();

        let mut fresh = Vec::new();
        let mut stale = Vec::new();
        let mut missing = Vec::new();
        for addr in &valid {
            if let Some(cached) = self.coin_cache.get(addr).await {
                fresh.push(cached);
                continue;
            }
            match stored_map.get(addr) {
                Some(c) if !force_refresh && c.is_market_data_fresh() => fresh.push(c.clone()),
                Some(c) => stale.push(c.clone()),
                None => missing.push(addr.clone()),
            }
        }

        let max_workers = max_workers.max(1);
        let newly_fetched: Vec<Coin> = stream::iter(missing.into_iter().map(|addr| self.enrich(EnrichmentInput::bare(addr))))
            .buffer_unordered(max_workers)
            .filter_map(|result| async move {
                match result {
                    Ok(coin) => Some(coin),
                    Err(e) => {
                        warn!(error = %e, "batch new-fetch failed for one address, eliding");
                        None
                    }
                }
            })
            .collect()
            .await;

        // Stale rows are refreshed via the market-data provider only, not
        // the full C5 pipeline (spec §4.7 step 6) — cheaper, and a failure
        // degrades to the stale record rather than eliding it.
        let updated: Vec<Coin> = stream::iter(stale.iter().map(|c| self.refresh_market_fields(c)))
            .buffer_unordered(UPDATE_STALE_CONCURRENCY)
            .collect()
            .await;

        // Two-pass persist (spec §4.7): bulk-upsert rows that already
        // existed, then individually create new rows so each gets an id.
        let mut to_upsert: Vec<Coin> = Vec::with_capacity(updated.len());
        for mut coin in updated {
            if let Some(existing) = stored_map.get(&coin.address) {
                coin.id = existing.id;
                // I2: reserved-tag membership is authoritative per refresher only.
                coin.tags = existing.tags.clone();
            }
            to_upsert.push(coin);
        }
        if !to_upsert.is_empty() {
            self.store.bulk_upsert(&to_upsert).await?;
        }

        let mut created = Vec::with_capacity(newly_fetched.len());
        for coin in newly_fetched {
            match self.store.create(&coin).await {
                Ok(c) => created.push(c),
                Err(e) => warn!(address = %coin.address, error = %e, "failed to persist newly-fetched coin, eliding"),
            }
        }

        // Cache writes happen only after all store writes complete (spec §5
        // ordering). New and refreshed rows also get their logo submitted
        // to C10 (spec §4.7 step 7).
        for coin in to_upsert.iter().chain(created.iter()) {
            self.trigger_logo_upload(coin);
            self.coin_cache.set(&coin.address, coin.clone(), COIN_CACHE_EXPIRY).await;
        }

        let mut result = fresh;
        result.extend(to_upsert);
        result.extend(created);
        Ok(result)
    }
}
