//! Curated-list reader (C9): cache → store → single-flight upstream
//! refresh → stale-store fallback on failure (spec §4.9).

use tracing::warn;

use super::CoinService;
use crate::cache::COIN_CACHE_EXPIRY;
use crate::types::{is_list_stale, paginate, Coin, CoreResult, ListKind};

/// `limit` is capped at this value regardless of what the caller requests
/// (spec §8 boundary behavior).
const MAX_LIMIT: usize = 100;

fn default_concurrency(kind: ListKind) -> usize {
    match kind {
        ListKind::Trending | ListKind::TopGainer => 3,
        ListKind::NewCoin => 5,
        ListKind::XStocks => 1,
    }
}

impl CoinService {
    /// Read a curated list by tag (spec §6 `GetCurated`).
    pub async fn get_curated(&self, kind: ListKind, limit: usize, offset: usize) -> CoreResult<(Vec<Coin>, usize)> {
        let limit = limit.min(MAX_LIMIT);
        let cache_key = kind.to_string();

        if let Some(cached) = self.list_cache.get(&cache_key).await {
            return Ok(paginate(cached, offset, limit));
        }

        let stored = self.store.list_by_tag(kind.tag()).await?;
        if !is_list_stale(&stored) {
            self.list_cache.set(cache_key, stored.clone(), COIN_CACHE_EXPIRY).await;
            return Ok(paginate(stored, offset, limit));
        }

        match self.refresh_list(kind, default_concurrency(kind)).await {
            Ok(()) => {
                let refreshed = self.list_cache.get(&cache_key).await.unwrap_or(stored);
                Ok(paginate(refreshed, offset, limit))
            }
            Err(e) => {
                if stored.is_empty() {
                    Err(e)
                } else {
                    warn!(list = %kind, error = %e, "curated-list refresh failed, serving stale stored data");
                    Ok(paginate(stored, offset, limit))
                }
            }
        }
    }
}
