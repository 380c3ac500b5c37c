//! Shared types for the coin aggregation engine.
//!
//! These types form the data model used across all modules: the store,
//! the provider clients, and the enrichment/retrieval/list-refresh
//! pipelines. They are designed to be stable so those modules can depend
//! on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The wrapped-SOL mint address on Solana mainnet.
pub const WRAPPED_SOL_ADDRESS: &str = "So11111111111111111111111111111111111111112";

/// Synthetic address for the native asset shim (C11). Distinct from any
/// real mint so it can never collide with an on-chain address (I5).
pub const NATIVE_SOL_PSEUDO_ADDRESS: &str = "native:sol";

/// Reserved tags whose membership is maintained by a refresher (C8).
pub const TAG_TRENDING: &str = "trending";
pub const TAG_NEW_COIN: &str = "new-coin";
pub const TAG_TOP_GAINER: &str = "top-gainer";
pub const TAG_XSTOCKS: &str = "xstocks";

pub const RESERVED_TAGS: &[&str] = &[TAG_TRENDING, TAG_NEW_COIN, TAG_TOP_GAINER, TAG_XSTOCKS];

/// A curated list kind, as read through C9 and maintained by C8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListKind {
    Trending,
    NewCoin,
    TopGainer,
    XStocks,
}

impl ListKind {
    pub const ALL: &'static [ListKind] = &[
        ListKind::Trending,
        ListKind::NewCoin,
        ListKind::TopGainer,
        ListKind::XStocks,
    ];

    /// The reserved tag this list maintains membership of (I2).
    pub fn tag(&self) -> &'static str {
        match self {
            ListKind::Trending => TAG_TRENDING,
            ListKind::NewCoin => TAG_NEW_COIN,
            ListKind::TopGainer => TAG_TOP_GAINER,
            ListKind::XStocks => TAG_XSTOCKS,
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

// ---------------------------------------------------------------------------
// Coin
// ---------------------------------------------------------------------------

/// The central entity: a Solana mint enriched with identity, presentation,
/// and market data (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coin {
    pub id: i64,
    pub address: String,

    // Identity
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub description: String,

    // Presentation
    pub logo_uri: String,
    pub website: String,
    pub twitter: String,
    pub telegram: String,
    pub tags: BTreeSet<String>,

    // Market
    pub price: Decimal,
    pub price_change_24h_pct: Decimal,
    pub market_cap: Decimal,
    pub volume_24h_usd: Decimal,
    pub volume_change_24h_pct: Decimal,
    pub liquidity: Decimal,
    pub fully_diluted_valuation: Decimal,
    pub rank: i64,
    pub created_at: String,
    pub last_updated: DateTime<Utc>,
}

impl Coin {
    /// A bare-minimum coin with only identity fields set, used as the seed
    /// for enrichment (C5 input) and in tests.
    pub fn new_bare(address: impl Into<String>) -> Self {
        Coin {
            id: 0,
            address: address.into(),
            name: String::new(),
            symbol: String::new(),
            decimals: 0,
            description: String::new(),
            logo_uri: String::new(),
            website: String::new(),
            twitter: String::new(),
            telegram: String::new(),
            tags: BTreeSet::new(),
            price: Decimal::ZERO,
            price_change_24h_pct: Decimal::ZERO,
            market_cap: Decimal::ZERO,
            volume_24h_usd: Decimal::ZERO,
            volume_change_24h_pct: Decimal::ZERO,
            liquidity: Decimal::ZERO,
            fully_diluted_valuation: Decimal::ZERO,
            rank: 0,
            created_at: String::new(),
            last_updated: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// I: market data is fresh iff `now - last_updated < 24h` (C1).
    pub fn is_market_data_fresh(&self) -> bool {
        Utc::now() - self.last_updated < chrono::Duration::hours(24)
    }

    /// Idempotent tag addition (C1).
    pub fn add_tag(&mut self, tag: &str) {
        self.tags.insert(tag.to_string());
    }

    /// Idempotent tag removal (C1).
    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.remove(tag);
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Build a deterministic test fixture.
    #[cfg(test)]
    pub fn sample(address: &str) -> Self {
        let mut c = Coin::new_bare(address);
        c.name = "Test Coin".to_string();
        c.symbol = "TEST".to_string();
        c.decimals = 9;
        c.price = rust_decimal_macros::dec!(1.5);
        c.last_updated = Utc::now();
        c
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) [{}] price={} tags={:?}",
            self.name, self.symbol, self.address, self.price, self.tags
        )
    }
}

/// Structural validation for a mint address (spec §4.6 step 2): non-empty,
/// printable, and within the length a base58-encoded Solana address can
/// take. This does not assert the address is base58-valid or decodes to a
/// real 32-byte key — upstream providers are the source of truth for that;
/// this only rejects the obviously malformed (blank, whitespace, absurdly
/// long) before any store or upstream call is made.
pub fn is_valid_mint_address(address: &str) -> bool {
    let trimmed = address.trim();
    !trimmed.is_empty() && trimmed.len() <= 44 && trimmed.chars().all(|c| c.is_ascii_graphic())
}

/// Apply `offset`/`limit` to a full result set and return the page
/// alongside the pre-pagination total count (spec §6 `GetCurated`,
/// `SearchCoins`).
pub fn paginate<T>(items: Vec<T>, offset: usize, limit: usize) -> (Vec<T>, usize) {
    let total = items.len();
    let page = items.into_iter().skip(offset).take(limit).collect();
    (page, total)
}

/// Whether a list read from the store is stale (C1): empty, or its first
/// element's `last_updated` is more than an hour old.
///
/// spec.md's Open Questions note that two list-staleness bounds coexisted
/// in the source this spec was distilled from (a 1h `isDataStale` check
/// and a 1h `TrendingDataTTL`); this spec adopts 1h uniformly, so this is
/// the single staleness predicate used by both C8 scheduling and C9 reads.
pub fn is_list_stale(coins: &[Coin]) -> bool {
    match coins.first() {
        None => true,
        Some(first) => Utc::now() - first.last_updated > chrono::Duration::hours(1),
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Domain-specific error kinds surfaced by the core (spec §7).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("upstream error ({provider}): {message}")]
    UpstreamError { provider: String, message: String },

    #[error("inappropriate content")]
    InappropriateContent,

    #[error("store error: {0}")]
    StoreError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
