//! Persistent storage (spec §6): a `coins` table keyed by numeric id and
//! uniquely indexed by address, a `naughty_words` table, and a
//! closure-style `with_transaction` scoped API (spec §9 Design Notes).
//!
//! Backed by SQLite via `sqlx`. Decimal market-data fields are stored as
//! TEXT (via `Decimal`'s `Display`/`FromStr`) to keep full precision
//! without pulling in a `sqlx` decimal feature.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction};
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::{debug, info};

use crate::types::{Coin, CoreError, CoreResult};

/// Addresses are paged to the store in chunks of this size (spec §4.7).
pub const ADDRESS_PAGE_SIZE: usize = 50;

/// The `naughty_words` table is paged at this size when loading into memory.
pub const BANNED_WORD_PAGE_SIZE: i64 = 10_000;

/// SQLite-backed persistent store.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connect to (and, if necessary, create) the SQLite database at `url`,
    /// e.g. `sqlite://coinhub.db` or `sqlite::memory:` for tests.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(url)
            .await
            .with_context(|| format!("failed to connect to store at {url}"))?;
        let store = Store { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coins (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                address TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL DEFAULT '',
                symbol TEXT NOT NULL DEFAULT '',
                decimals INTEGER NOT NULL DEFAULT 0,
                description TEXT NOT NULL DEFAULT '',
                logo_uri TEXT NOT NULL DEFAULT '',
                website TEXT NOT NULL DEFAULT '',
                twitter TEXT NOT NULL DEFAULT '',
                telegram TEXT NOT NULL DEFAULT '',
                tags TEXT NOT NULL DEFAULT '',
                price TEXT NOT NULL DEFAULT '0',
                price_change_24h_pct TEXT NOT NULL DEFAULT '0',
                market_cap TEXT NOT NULL DEFAULT '0',
                volume_24h_usd TEXT NOT NULL DEFAULT '0',
                volume_change_24h_pct TEXT NOT NULL DEFAULT '0',
                liquidity TEXT NOT NULL DEFAULT '0',
                fully_diluted_valuation TEXT NOT NULL DEFAULT '0',
                rank INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT '',
                last_updated TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_coins_address ON coins(address);

            CREATE TABLE IF NOT EXISTS naughty_words (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                word TEXT NOT NULL UNIQUE
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to run store migrations")?;
        Ok(())
    }

    /// Run `f` inside a SQL transaction. Commits if `f` returns `Ok`, rolls
    /// back (implicitly, on drop) otherwise (spec §7: store failures inside
    /// a transaction roll back and surface `StoreError`).
    pub async fn with_transaction<F, Fut, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(StoreTx) -> Fut,
        Fut: std::future::Future<Output = CoreResult<(StoreTx, T)>>,
    {
        let tx = self.pool.begin().await.map_err(|e| CoreError::StoreError(e.to_string()))?;
        let (tx, result) = f(StoreTx { tx }).await?;
        tx.tx.commit().await.map_err(|e| CoreError::StoreError(e.to_string()))?;
        Ok(result)
    }

    pub async fn get_by_address(&self, address: &str) -> CoreResult<Option<Coin>> {
        let row = sqlx::query("SELECT * FROM coins WHERE address = ?1")
            .bind(address)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::StoreError(e.to_string()))?;
        row.map(|r| row_to_coin(&r)).transpose()
    }

    pub async fn get_by_id(&self, id: i64) -> CoreResult<Option<Coin>> {
        let row = sqlx::query("SELECT * FROM coins WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::StoreError(e.to_string()))?;
        row.map(|r| row_to_coin(&r)).transpose()
    }

    /// Looks up `addresses` in pages of `ADDRESS_PAGE_SIZE` (spec §4.7).
    pub async fn list_by_addresses(&self, addresses: &[String]) -> CoreResult<Vec<Coin>> {
        let mut out = Vec::with_capacity(addresses.len());
        for page in addresses.chunks(ADDRESS_PAGE_SIZE) {
            let placeholders = (1..=page.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(",");
            let sql = format!("SELECT * FROM coins WHERE address IN ({placeholders})");
            let mut query = sqlx::query(&sql);
            for addr in page {
                query = query.bind(addr);
            }
            let rows = query.fetch_all(&self.pool).await.map_err(|e| CoreError::StoreError(e.to_string()))?;
            for row in &rows {
                out.push(row_to_coin(row)?);
            }
        }
        Ok(out)
    }

    pub async fn list_by_tag(&self, tag: &str) -> CoreResult<Vec<Coin>> {
        let rows = sqlx::query("SELECT * FROM coins WHERE ',' || tags || ',' LIKE '%,' || ?1 || ',%'")
            .bind(tag)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::StoreError(e.to_string()))?;
        rows.iter().map(row_to_coin).collect()
    }

    pub async fn create(&self, coin: &Coin) -> CoreResult<Coin> {
        let id = insert_coin(&self.pool, coin).await?;
        let mut created = coin.clone();
        created.id = id;
        Ok(created)
    }

    pub async fn update(&self, coin: &Coin) -> CoreResult<()> {
        update_coin(&self.pool, coin).await
    }

    /// Bulk upsert of coins already known to exist (spec §4.7 two-pass
    /// persist: existing rows are upserted together, new rows created
    /// individually so each gets its assigned id).
    pub async fn bulk_upsert(&self, coins: &[Coin]) -> CoreResult<()> {
        for coin in coins {
            upsert_coin(&self.pool, coin).await?;
        }
        Ok(())
    }

    /// Loads the full banned-word list, paged internally at
    /// `BANNED_WORD_PAGE_SIZE` (spec §3: process-wide, reloadable set).
    pub async fn load_banned_words(&self) -> CoreResult<Vec<String>> {
        let mut words = Vec::new();
        let mut offset: i64 = 0;
        loop {
            let rows = sqlx::query("SELECT word FROM naughty_words ORDER BY id LIMIT ?1 OFFSET ?2")
                .bind(BANNED_WORD_PAGE_SIZE)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| CoreError::StoreError(e.to_string()))?;
            let fetched = rows.len();
            for row in rows {
                let word: String = row.try_get("word").map_err(|e| CoreError::StoreError(e.to_string()))?;
                words.push(word);
            }
            if (fetched as i64) < BANNED_WORD_PAGE_SIZE {
                break;
            }
            offset += BANNED_WORD_PAGE_SIZE;
        }
        debug!(count = words.len(), "loaded banned words from store");
        Ok(words)
    }

    pub async fn add_banned_word(&self, word: &str) -> CoreResult<()> {
        sqlx::query("INSERT OR IGNORE INTO naughty_words (word) VALUES (?1)")
            .bind(word.to_lowercase())
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::StoreError(e.to_string()))?;
        Ok(())
    }
}

/// A scoped handle into an in-flight transaction, returned by and passed
/// back into `Store::with_transaction`'s closure.
pub struct StoreTx {
    tx: Transaction<'static, Sqlite>,
}

impl StoreTx {
    pub async fn list_by_tag(&mut self, tag: &str) -> CoreResult<Vec<Coin>> {
        let rows = sqlx::query("SELECT * FROM coins WHERE ',' || tags || ',' LIKE '%,' || ?1 || ',%'")
            .bind(tag)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| CoreError::StoreError(e.to_string()))?;
        rows.iter().map(row_to_coin).collect()
    }

    /// Removes `tag` and bumps `last_updated` (spec §4.8 step 4).
    pub async fn clear_tag(&mut self, address: &str, tag: &str) -> CoreResult<()> {
        let Some(coin) = self.get_by_address(address).await? else {
            return Ok(());
        };
        let mut updated = coin;
        updated.remove_tag(tag);
        updated.last_updated = Utc::now();
        self.update(&updated).await
    }

    pub async fn get_by_address(&mut self, address: &str) -> CoreResult<Option<Coin>> {
        let row = sqlx::query("SELECT * FROM coins WHERE address = ?1")
            .bind(address)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| CoreError::StoreError(e.to_string()))?;
        row.map(|r| row_to_coin(&r)).transpose()
    }

    pub async fn upsert(&mut self, coin: &Coin) -> CoreResult<()> {
        upsert_coin(&mut *self.tx, coin).await
    }

    pub async fn update(&mut self, coin: &Coin) -> CoreResult<()> {
        update_coin(&mut *self.tx, coin).await
    }
}

async fn insert_coin<'e, E>(executor: E, coin: &Coin) -> CoreResult<i64>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let tags = tags_to_db(&coin.tags);
    let result = sqlx::query(
        r#"INSERT INTO coins
            (address, name, symbol, decimals, description, logo_uri, website, twitter,
             telegram, tags, price, price_change_24h_pct, market_cap, volume_24h_usd,
             volume_change_24h_pct, liquidity, fully_diluted_valuation, rank, created_at, last_updated)
           VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)"#,
    )
    .bind(&coin.address)
    .bind(&coin.name)
    .bind(&coin.symbol)
    .bind(coin.decimals as i64)
    .bind(&coin.description)
    .bind(&coin.logo_uri)
    .bind(&coin.website)
    .bind(&coin.twitter)
    .bind(&coin.telegram)
    .bind(&tags)
    .bind(coin.price.to_string())
    .bind(coin.price_change_24h_pct.to_string())
    .bind(coin.market_cap.to_string())
    .bind(coin.volume_24h_usd.to_string())
    .bind(coin.volume_change_24h_pct.to_string())
    .bind(coin.liquidity.to_string())
    .bind(coin.fully_diluted_valuation.to_string())
    .bind(coin.rank)
    .bind(&coin.created_at)
    .bind(coin.last_updated.to_rfc3339())
    .execute(executor)
    .await
    .map_err(|e| CoreError::StoreError(e.to_string()))?;
    Ok(result.last_insert_rowid())
}

async fn update_coin<'e, E>(executor: E, coin: &Coin) -> CoreResult<()>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let tags = tags_to_db(&coin.tags);
    sqlx::query(
        r#"UPDATE coins SET
            name=?2, symbol=?3, decimals=?4, description=?5, logo_uri=?6, website=?7, twitter=?8,
            telegram=?9, tags=?10, price=?11, price_change_24h_pct=?12, market_cap=?13,
            volume_24h_usd=?14, volume_change_24h_pct=?15, liquidity=?16, fully_diluted_valuation=?17,
            rank=?18, created_at=?19, last_updated=?20
           WHERE address=?1"#,
    )
    .bind(&coin.address)
    .bind(&coin.name)
    .bind(&coin.symbol)
    .bind(coin.decimals as i64)
    .bind(&coin.description)
    .bind(&coin.logo_uri)
    .bind(&coin.website)
    .bind(&coin.twitter)
    .bind(&coin.telegram)
    .bind(&tags)
    .bind(coin.price.to_string())
    .bind(coin.price_change_24h_pct.to_string())
    .bind(coin.market_cap.to_string())
    .bind(coin.volume_24h_usd.to_string())
    .bind(coin.volume_change_24h_pct.to_string())
    .bind(coin.liquidity.to_string())
    .bind(coin.fully_diluted_valuation.to_string())
    .bind(coin.rank)
    .bind(&coin.created_at)
    .bind(coin.last_updated.to_rfc3339())
    .execute(executor)
    .await
    .map_err(|e| CoreError::StoreError(e.to_string()))?;
    Ok(())
}

async fn upsert_coin<'e, E>(executor: E, coin: &Coin) -> CoreResult<()>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let tags = tags_to_db(&coin.tags);
    sqlx::query(
        r#"INSERT INTO coins
            (address, name, symbol, decimals, description, logo_uri, website, twitter,
             telegram, tags, price, price_change_24h_pct, market_cap, volume_24h_usd,
             volume_change_24h_pct, liquidity, fully_diluted_valuation, rank, created_at, last_updated)
           VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)
           ON CONFLICT(address) DO UPDATE SET
             name=excluded.name, symbol=excluded.symbol, decimals=excluded.decimals,
             description=excluded.description, logo_uri=excluded.logo_uri, website=excluded.website,
             twitter=excluded.twitter, telegram=excluded.telegram, tags=excluded.tags,
             price=excluded.price, price_change_24h_pct=excluded.price_change_24h_pct,
             market_cap=excluded.market_cap, volume_24h_usd=excluded.volume_24h_usd,
             volume_change_24h_pct=excluded.volume_change_24h_pct, liquidity=excluded.liquidity,
             fully_diluted_valuation=excluded.fully_diluted_valuation, rank=excluded.rank,
             last_updated=excluded.last_updated"#,
    )
    .bind(&coin.address)
    .bind(&coin.name)
    .bind(&coin.symbol)
    .bind(coin.decimals as i64)
    .bind(&coin.description)
    .bind(&coin.logo_uri)
    .bind(&coin.website)
    .bind(&coin.twitter)
    .bind(&coin.telegram)
    .bind(&tags)
    .bind(coin.price.to_string())
    .bind(coin.price_change_24h_pct.to_string())
    .bind(coin.market_cap.to_string())
    .bind(coin.volume_24h_usd.to_string())
    .bind(coin.volume_change_24h_pct.to_string())
    .bind(coin.liquidity.to_string())
    .bind(coin.fully_diluted_valuation.to_string())
    .bind(coin.rank)
    .bind(&coin.created_at)
    .bind(coin.last_updated.to_rfc3339())
    .execute(executor)
    .await
    .map_err(|e| CoreError::StoreError(e.to_string()))?;
    Ok(())
}

fn tags_to_db(tags: &BTreeSet<String>) -> String {
    tags.iter().cloned().collect::<Vec<_>>().join(",")
}

fn tags_from_db(raw: &str) -> BTreeSet<String> {
    raw.split(',').filter(|s| !s.is_empty()).map(|s| s.to_string()).collect()
}

fn decimal_col(row: &sqlx::sqlite::SqliteRow, col: &str) -> CoreResult<Decimal> {
    let raw: String = row.try_get(col).map_err(|e| CoreError::StoreError(e.to_string()))?;
    Decimal::from_str(&raw).map_err(|e| CoreError::StoreError(format!("bad decimal in {col}: {e}")))
}

fn row_to_coin(row: &sqlx::sqlite::SqliteRow) -> CoreResult<Coin> {
    let tags_raw: String = row.try_get("tags").map_err(|e| CoreError::StoreError(e.to_string()))?;
    let last_updated_raw: String =
        row.try_get("last_updated").map_err(|e| CoreError::StoreError(e.to_string()))?;
    let last_updated = DateTime::parse_from_rfc3339(&last_updated_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::StoreError(format!("bad timestamp: {e}")))?;
    let decimals_raw: i64 = row.try_get("decimals").map_err(|e| CoreError::StoreError(e.to_string()))?;

    Ok(Coin {
        id: row.try_get("id").map_err(|e| CoreError::StoreError(e.to_string()))?,
        address: row.try_get("address").map_err(|e| CoreError::StoreError(e.to_string()))?,
        name: row.try_get("name").map_err(|e| CoreError::StoreError(e.to_string()))?,
        symbol: row.try_get("symbol").map_err(|e| CoreError::StoreError(e.to_string()))?,
        decimals: decimals_raw as u8,
        description: row.try_get("description").map_err(|e| CoreError::StoreError(e.to_string()))?,
        logo_uri: row.try_get("logo_uri").map_err(|e| CoreError::StoreError(e.to_string()))?,
        website: row.try_get("website").map_err(|e| CoreError::StoreError(e.to_string()))?,
        twitter: row.try_get("twitter").map_err(|e| CoreError::StoreError(e.to_string()))?,
        telegram: row.try_get("telegram").map_err(|e| CoreError::StoreError(e.to_string()))?,
        tags: tags_from_db(&tags_raw),
        price: decimal_col(row, "price")?,
        price_change_24h_pct: decimal_col(row, "price_change_24h_pct")?,
        market_cap: decimal_col(row, "market_cap")?,
        volume_24h_usd: decimal_col(row, "volume_24h_usd")?,
        volume_change_24h_pct: decimal_col(row, "volume_change_24h_pct")?,
        liquidity: decimal_col(row, "liquidity")?,
        fully_diluted_valuation: decimal_col(row, "fully_diluted_valuation")?,
        rank: row.try_get("rank").map_err(|e| CoreError::StoreError(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(|e| CoreError::StoreError(e.to_string()))?,
        last_updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> Store {
        Store::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_by_address() {
        let store = memory_store().await;
        let coin = Coin::sample("Addr1");
        let created = store.create(&coin).await.unwrap();
        assert!(created.id > 0);

        let fetched = store.get_by_address("Addr1").await.unwrap().unwrap();
        assert_eq!(fetched.symbol, "TEST");
    }

    #[tokio::test]
    async fn test_get_by_address_missing_returns_none() {
        let store = memory_store().await;
        assert!(store.get_by_address("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_addresses_pages_in_chunks() {
        let store = memory_store().await;
        let mut addresses = Vec::new();
        for i in 0..120 {
            let addr = format!("addr-{i}");
            store.create(&Coin::sample(&addr)).await.unwrap();
            addresses.push(addr);
        }
        let found = store.list_by_addresses(&addresses).await.unwrap();
        assert_eq!(found.len(), 120);
    }

    #[tokio::test]
    async fn test_update_persists_changes() {
        let store = memory_store().await;
        let created = store.create(&Coin::sample("Addr1")).await.unwrap();
        let mut updated = created.clone();
        updated.name = "Renamed".to_string();
        store.update(&updated).await.unwrap();

        let fetched = store.get_by_address("Addr1").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Renamed");
    }

    #[tokio::test]
    async fn test_bulk_upsert_inserts_and_updates() {
        let store = memory_store().await;
        let mut coin = Coin::sample("Addr1");
        store.bulk_upsert(&[coin.clone()]).await.unwrap();
        coin.name = "Upserted".to_string();
        store.bulk_upsert(&[coin]).await.unwrap();

        let fetched = store.get_by_address("Addr1").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Upserted");
    }

    #[tokio::test]
    async fn test_list_by_tag() {
        let store = memory_store().await;
        let mut coin = Coin::sample("Addr1");
        coin.add_tag("trending");
        store.create(&coin).await.unwrap();
        store.create(&Coin::sample("Addr2")).await.unwrap();

        let tagged = store.list_by_tag("trending").await.unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].address, "Addr1");
    }

    #[tokio::test]
    async fn test_transaction_commits_on_success() {
        let store = memory_store().await;
        store
            .with_transaction(|mut tx| async move {
                tx.upsert(&Coin::sample("Addr1")).await?;
                Ok((tx, ()))
            })
            .await
            .unwrap();
        assert!(store.get_by_address("Addr1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_error() {
        let store = memory_store().await;
        let result: CoreResult<()> = store
            .with_transaction(|mut tx| async move {
                tx.upsert(&Coin::sample("Addr1")).await?;
                Err(CoreError::StoreError("simulated failure".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert!(store.get_by_address("Addr1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_banned_words_roundtrip() {
        let store = memory_store().await;
        store.add_banned_word("Scam").await.unwrap();
        store.add_banned_word("rugpull").await.unwrap();
        let words = store.load_banned_words().await.unwrap();
        assert_eq!(words.len(), 2);
        assert!(words.contains(&"scam".to_string()));
    }
}
