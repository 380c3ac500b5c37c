//! List refresher (C8): rebuilds curated-list tag membership from upstream
//! (spec §4.8, §7, §5). Runs inside a single store transaction so that a
//! reader never observes a half-updated tag set; tag-clear always precedes
//! tag-assign within that transaction (spec §5 ordering).

use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{info, warn};

use super::enrichment::EnrichmentInput;
use super::CoinService;
use crate::cache::{COIN_CACHE_EXPIRY, STALE_CACHE_TTL};
use crate::providers::MarketListEntry;
use crate::types::{Coin, CoreError, CoreResult, ListKind};

/// Upstream list size requested per refresh.
const LIST_FETCH_LIMIT: usize = 100;

/// Sequential inter-item delay for the xstocks refresher (spec §4.8).
const XSTOCKS_ITEM_DELAY: Duration = Duration::from_millis(100);

impl CoinService {
    /// Refresh the tag membership for `kind`. `concurrency` bounds
    /// enrichment fan-out for trending/new-coin/top-gainer (spec §5: cap 3
    /// for trending/top-gainer); xstocks always runs sequentially with a
    /// fixed inter-item delay regardless of `concurrency`.
    pub async fn refresh_list(&self, kind: ListKind, concurrency: usize) -> CoreResult<()> {
        let _guard = self.single_flight.acquire(kind).await;

        let entries = match self.fetch_upstream_list(kind).await {
            Ok(entries) => entries,
            Err(e) => return self.fall_back_to_stored(kind, e).await,
        };

        let enriched = if kind == ListKind::XStocks {
            self.enrich_sequential(entries).await
        } else {
            self.enrich_concurrent(entries, concurrency.max(1)).await
        };

        for coin in &enriched {
            self.trigger_logo_upload(coin);
        }

        // Empty upstream result clears prior tags (spec §8 boundary behavior).
        let new_addresses: BTreeSet<String> = enriched.iter().map(|c| c.address.clone()).collect();

        self.store
            .with_transaction(|mut tx| async move {
                let current = tx.list_by_tag(kind.tag()).await?;
                for existing in &current {
                    if !new_addresses.contains(&existing.address) {
                        tx.clear_tag(&existing.address, kind.tag()).await?;
                    }
                }
                for mut coin in enriched {
                    if let Some(existing) = tx.get_by_address(&coin.address).await? {
                        coin.tags = existing.tags.clone();
                    }
                    coin.add_tag(kind.tag());
                    tx.upsert(&coin).await?;
                }
                Ok((tx, ()))
            })
            .await?;

        let refreshed = self.store.list_by_tag(kind.tag()).await?;
        info!(list = %kind, count = refreshed.len(), "list refresh committed");
        self.list_cache.set(kind.to_string(), refreshed, COIN_CACHE_EXPIRY).await;
        Ok(())
    }

    async fn fetch_upstream_list(&self, kind: ListKind) -> CoreResult<Vec<MarketListEntry>> {
        match kind {
            ListKind::Trending => self.market_data.get_trending(LIST_FETCH_LIMIT).await,
            ListKind::NewCoin => self.market_data.get_new_listings(LIST_FETCH_LIMIT).await,
            ListKind::TopGainer => self.market_data.get_top_gainers(LIST_FETCH_LIMIT).await,
            ListKind::XStocks => Ok(Vec::new()),
        }
    }

    async fn enrich_concurrent(&self, entries: Vec<MarketListEntry>, concurrency: usize) -> Vec<Coin> {
        stream::iter(entries.into_iter().map(|entry| {
            let input = EnrichmentInput {
                address: entry.address.clone(),
                tags: entry.overview.tags.clone(),
                ..Default::default()
            };
            self.enrich(input)
        }))
        .buffer_unordered(concurrency)
        .filter_map(|result| async move {
            match result {
                Ok(coin) => Some(coin),
                Err(e) => {
                    warn!(error = %e, "list refresh item failed enrichment, eliding");
                    None
                }
            }
        })
        .collect()
        .await
    }

    async fn enrich_sequential(&self, entries: Vec<MarketListEntry>) -> Vec<Coin> {
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let input = EnrichmentInput {
                address: entry.address.clone(),
                tags: entry.overview.tags.clone(),
                ..Default::default()
            };
            match self.enrich(input).await {
                Ok(coin) => out.push(coin),
                Err(e) => warn!(error = %e, "xstocks item failed enrichment, eliding"),
            }
            tokio::time::sleep(XSTOCKS_ITEM_DELAY).await;
        }
        out
    }

    /// Refresh the xstocks list from a static seed (loaded from YAML) rather
    /// than a market-data upstream call (spec §4.8).
    pub async fn refresh_xstocks_from_seed(&self, seed_addresses: Vec<String>) -> CoreResult<()> {
        let _guard = self.single_flight.acquire(ListKind::XStocks).await;
        let entries: Vec<MarketListEntry> = seed_addresses
            .into_iter()
            .map(|address| MarketListEntry { address, overview: Default::default() })
            .collect();
        let enriched = self.enrich_sequential(entries).await;
        for coin in &enriched {
            self.trigger_logo_upload(coin);
        }
        let new_addresses: BTreeSet<String> = enriched.iter().map(|c| c.address.clone()).collect();

        self.store
            .with_transaction(|mut tx| async move {
                let current = tx.list_by_tag(ListKind::XStocks.tag()).await?;
                for existing in &current {
                    if !new_addresses.contains(&existing.address) {
                        tx.clear_tag(&existing.address, ListKind::XStocks.tag()).await?;
                    }
                }
                for mut coin in enriched {
                    if let Some(existing) = tx.get_by_address(&coin.address).await? {
                        coin.tags = existing.tags.clone();
                    }
                    coin.add_tag(ListKind::XStocks.tag());
                    tx.upsert(&coin).await?;
                }
                Ok((tx, ()))
            })
            .await?;

        let refreshed = self.store.list_by_tag(ListKind::XStocks.tag()).await?;
        self.list_cache.set(ListKind::XStocks.to_string(), refreshed, COIN_CACHE_EXPIRY).await;
        Ok(())
    }

    async fn fall_back_to_stored(&self, kind: ListKind, cause: CoreError) -> CoreResult<()> {
        let stored = self.store.list_by_tag(kind.tag()).await?;
        if stored.is_empty() {
            warn!(list = %kind, error = %cause, "list refresh failed with no cached fallback");
            return Err(cause);
        }
        warn!(list = %kind, error = %cause, "list refresh failed, serving stale stored data");
        self.list_cache.set(kind.to_string(), stored, STALE_CACHE_TTL).await;
        Ok(())
    }
}
