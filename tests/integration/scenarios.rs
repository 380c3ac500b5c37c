//! End-to-end scenarios (spec §8), exercised against a real in-memory
//! SQLite store and the mock providers in `mock_providers.rs`.

use super::mock_providers::{MockChainMetadata, MockImageProxy, MockMarketData, MockOffchainMetadata};
use coinhub::engine::{CoinService, CoinServiceDeps};
use coinhub::providers::{MarketListEntry, TokenOverview};
use coinhub::store::Store;
use coinhub::types::{CoreError, ListKind};
use std::sync::Arc;

async fn build(market_data: Arc<MockMarketData>) -> Arc<CoinService> {
    let store = Store::connect("sqlite::memory:").await.unwrap();
    Arc::new(CoinService::new(CoinServiceDeps {
        store,
        market_data,
        chain_metadata: Arc::new(MockChainMetadata::default()),
        offchain: Arc::new(MockOffchainMetadata::default()),
        image_proxy: Arc::new(MockImageProxy::default()),
        image_upload_concurrency: 4,
        cidv0_gateways: vec![],
        cidv1_gateways: vec![],
    }))
}

/// Scenario 1: cold single fetch.
#[tokio::test]
async fn scenario_cold_single_fetch() {
    let market_data = Arc::new(MockMarketData::default());
    market_data
        .set_overview(
            "A",
            TokenOverview {
                address: "A".to_string(),
                name: Some("X".to_string()),
                symbol: Some("X".to_string()),
                decimals: Some(6),
                price: Some(rust_decimal_macros::dec!(1.5)),
                ..Default::default()
            },
        )
        .await;
    let service = build(market_data.clone()).await;

    let coin = service.get_coin_by_address("A", false).await.unwrap();
    assert_eq!(coin.address, "A");
    assert_eq!(coin.price, rust_decimal_macros::dec!(1.5));
    assert!(coin.tags.is_empty());

    let stored = service.store().get_by_address("A").await.unwrap().unwrap();
    assert_eq!(stored.price, rust_decimal_macros::dec!(1.5));

    let calls_before_second_read = market_data.overview_call_count();
    service.get_coin_by_address("A", false).await.unwrap();
    assert_eq!(market_data.overview_call_count(), calls_before_second_read, "cached read must not hit upstream");
}

/// Scenario 2: stale-refresh single fetch.
#[tokio::test]
async fn scenario_stale_refresh_single_fetch() {
    let market_data = Arc::new(MockMarketData::default());
    market_data
        .set_overview(
            "A",
            TokenOverview {
                address: "A".to_string(),
                name: Some("X".to_string()),
                price: Some(rust_decimal_macros::dec!(2.0)),
                ..Default::default()
            },
        )
        .await;
    let service = build(market_data).await;

    let mut stale = coinhub::types::Coin::new_bare("A");
    stale.price = rust_decimal_macros::dec!(1.0);
    stale.last_updated = chrono::Utc::now() - chrono::Duration::hours(25);
    service.store().create(&stale).await.unwrap();

    let coin = service.get_coin_by_address("A", false).await.unwrap();
    assert_eq!(coin.price, rust_decimal_macros::dec!(2.0));

    let stored = service.store().get_by_address("A").await.unwrap().unwrap();
    assert_eq!(stored.price, rust_decimal_macros::dec!(2.0));
    assert!(chrono::Utc::now() - stored.last_updated < chrono::Duration::seconds(1));
}

/// Scenario 3: batch triage (fresh / stale / missing).
#[tokio::test]
async fn scenario_batch_triage() {
    let market_data = Arc::new(MockMarketData::default());
    let service = build(market_data.clone()).await;

    let fresh = service.get_coin_by_address("F", false).await.unwrap();
    let calls_after_fresh_fetch = market_data.overview_call_count();

    let mut stale = coinhub::types::Coin::new_bare("S");
    stale.last_updated = chrono::Utc::now() - chrono::Duration::hours(48);
    service.store().create(&stale).await.unwrap();

    let result = service
        .get_coins_by_addresses(&[fresh.address.clone(), "S".to_string(), "M".to_string()], false, 4)
        .await
        .unwrap();

    assert_eq!(result.len(), 3);
    // One more overview call for S (update-stale path) and one for M (new-fetch path);
    // F is served from cache and makes no additional call.
    assert_eq!(market_data.overview_call_count(), calls_after_fresh_fetch + 2);
}

/// Scenario 4: trending refresh with empty upstream clears prior tags and
/// bumps `last_updated` on the cleared rows.
#[tokio::test]
async fn scenario_trending_refresh_empty_upstream_clears_tags() {
    let market_data = Arc::new(MockMarketData::default());
    market_data
        .set_trending(vec![
            MarketListEntry { address: "X".to_string(), overview: Default::default() },
            MarketListEntry { address: "Y".to_string(), overview: Default::default() },
        ])
        .await;
    let service = build(market_data.clone()).await;

    service.refresh_list(ListKind::Trending, 3).await.unwrap();
    let x_before = service.store().get_by_address("X").await.unwrap().unwrap();
    let y_before = service.store().get_by_address("Y").await.unwrap().unwrap();
    assert!(x_before.has_tag("trending"));
    assert!(y_before.has_tag("trending"));

    market_data.set_trending(vec![]).await;
    service.refresh_list(ListKind::Trending, 3).await.unwrap();

    let x_after = service.store().get_by_address("X").await.unwrap().unwrap();
    let y_after = service.store().get_by_address("Y").await.unwrap().unwrap();
    assert!(!x_after.has_tag("trending"));
    assert!(!y_after.has_tag("trending"));
    assert!(x_after.last_updated > x_before.last_updated);
    assert!(y_after.last_updated > y_before.last_updated);
}

/// Scenario 5: single-flight list read under two concurrent callers.
#[tokio::test]
async fn scenario_single_flight_list_read() {
    let market_data = Arc::new(MockMarketData::default());
    market_data
        .set_trending(vec![MarketListEntry { address: "X".to_string(), overview: Default::default() }])
        .await;
    let service = build(market_data.clone()).await;

    let (a, b) = tokio::join!(
        service.get_curated(ListKind::Trending, 10, 0),
        service.get_curated(ListKind::Trending, 10, 0),
    );
    let (a, _a_total) = a.unwrap();
    let (b, _b_total) = b.unwrap();

    let a_addrs: Vec<_> = a.iter().map(|c| c.address.clone()).collect();
    let b_addrs: Vec<_> = b.iter().map(|c| c.address.clone()).collect();
    assert_eq!(a_addrs, b_addrs);
    assert_eq!(market_data.overview_call_count(), 1);
}

/// Scenario 6: content filter rejects at the market-data gating point,
/// leaving the store and cache untouched.
#[tokio::test]
async fn scenario_content_filter_rejects_market_data_name() {
    let market_data = Arc::new(MockMarketData::default());
    market_data
        .set_overview(
            "A",
            TokenOverview { address: "A".to_string(), name: Some("banned".to_string()), ..Default::default() },
        )
        .await;
    let service = build(market_data).await;
    service.store().add_banned_word("banned").await.unwrap();
    service.reload_banned_words().await.unwrap();

    let health_before = service.health().await;
    let result = service.get_coin_by_address("A", false).await;
    assert!(matches!(result, Err(CoreError::InappropriateContent)));
    assert!(service.store().get_by_address("A").await.unwrap().is_none());

    let health_after = service.health().await;
    assert_eq!(health_before.coin_cache_entries, health_after.coin_cache_entries);
}
