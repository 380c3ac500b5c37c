//! HTTP client for the market-data aggregator (spec §4.5 step 1, §4.7, §4.8).
//!
//! Modeled after a Birdeye/DexScreener-style token-data API: per-token
//! overview, trending/new-listing/top-gainer lists, and text search.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{MarketDataProvider, MarketListEntry, SearchParams, TokenOverview};
use crate::types::CoreError;

const PROVIDER_NAME: &str = "market-data";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct OverviewResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    decimals: Option<u8>,
    #[serde(default)]
    logo_uri: Option<String>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    price_change24h_percent: Option<f64>,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    volume24h_usd: Option<f64>,
    #[serde(default)]
    volume24h_change_percent: Option<f64>,
    #[serde(default)]
    liquidity: Option<f64>,
    #[serde(default)]
    fdv: Option<f64>,
    #[serde(default)]
    rank: Option<i64>,
    #[serde(default)]
    tags: Vec<String>,
}

fn to_decimal(v: Option<f64>) -> Option<rust_decimal::Decimal> {
    v.and_then(rust_decimal::Decimal::from_f64_retain)
}

impl OverviewResponse {
    fn into_overview(self, address: &str) -> TokenOverview {
        TokenOverview {
            address: address.to_string(),
            name: self.name,
            symbol: self.symbol,
            decimals: self.decimals,
            logo_uri: self.logo_uri,
            price: to_decimal(self.price),
            price_change_24h_pct: to_decimal(self.price_change24h_percent),
            market_cap: to_decimal(self.market_cap),
            volume_24h_usd: to_decimal(self.volume24h_usd),
            volume_change_24h_pct: to_decimal(self.volume24h_change_percent),
            liquidity: to_decimal(self.liquidity),
            fully_diluted_valuation: to_decimal(self.fdv),
            rank: self.rank,
            tags: self.tags,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListItem>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ListItem {
    address: String,
    #[serde(flatten)]
    overview: OverviewResponse,
}

/// HTTP-backed `MarketDataProvider` over a Birdeye/DexScreener-shaped REST API.
pub struct HttpMarketDataProvider {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpMarketDataProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent("coinhub/0.1.0")
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key,
        })
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.get(url);
        if let Some(key) = &self.api_key {
            req = req.header("X-API-KEY", key);
        }
        req
    }

    async fn get_list(&self, path: &str, limit: usize) -> Result<Vec<MarketListEntry>, CoreError> {
        let url = format!("{}/{path}?limit={limit}", self.base_url.trim_end_matches('/'));
        debug!(url = %url, "fetching market-data list");
        let resp = self.request(&url).send().await.map_err(|e| CoreError::UpstreamError {
            provider: PROVIDER_NAME.to_string(),
            message: e.to_string(),
        })?;
        if !resp.status().is_success() {
            let status = resp.status();
            warn!(status = %status, path = %path, "market-data list request failed");
            return Err(CoreError::UpstreamError {
                provider: PROVIDER_NAME.to_string(),
                message: format!("HTTP {status}"),
            });
        }
        let parsed: ListResponse = resp.json().await.map_err(|e| CoreError::UpstreamError {
            provider: PROVIDER_NAME.to_string(),
            message: e.to_string(),
        })?;
        Ok(parsed
            .items
            .into_iter()
            .map(|item| MarketListEntry {
                address: item.address.clone(),
                overview: item.overview.into_overview(&item.address),
            })
            .collect())
    }
}

#[async_trait]
impl MarketDataProvider for HttpMarketDataProvider {
    async fn get_token_overview(&self, address: &str) -> Result<TokenOverview, CoreError> {
        let url = format!("{}/token_overview?address={address}", self.base_url.trim_end_matches('/'));
        let resp = self.request(&url).send().await.map_err(|e| CoreError::UpstreamError {
            provider: PROVIDER_NAME.to_string(),
            message: e.to_string(),
        })?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CoreError::NotFound(address.to_string()));
        }
        if !resp.status().is_success() {
            return Err(CoreError::UpstreamError {
                provider: PROVIDER_NAME.to_string(),
                message: format!("HTTP {}", resp.status()),
            });
        }
        let parsed: OverviewResponse = resp.json().await.map_err(|e| CoreError::UpstreamError {
            provider: PROVIDER_NAME.to_string(),
            message: e.to_string(),
        })?;
        Ok(parsed.into_overview(address))
    }

    async fn get_trending(&self, limit: usize) -> Result<Vec<MarketListEntry>, CoreError> {
        self.get_list("trending", limit).await
    }

    async fn get_new_listings(&self, limit: usize) -> Result<Vec<MarketListEntry>, CoreError> {
        self.get_list("new_listings", limit).await
    }

    async fn get_top_gainers(&self, limit: usize) -> Result<Vec<MarketListEntry>, CoreError> {
        self.get_list("top_gainers", limit).await
    }

    async fn search(&self, params: SearchParams) -> Result<Vec<MarketListEntry>, CoreError> {
        if params.query.trim().is_empty() {
            return Err(CoreError::InvalidArgument("search query must not be empty".to_string()));
        }
        let url = format!(
            "{}/search?q={}&limit={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&params.query),
            params.limit.min(100),
        );
        let resp = self.request(&url).send().await.map_err(|e| CoreError::UpstreamError {
            provider: PROVIDER_NAME.to_string(),
            message: e.to_string(),
        })?;
        if !resp.status().is_success() {
            return Err(CoreError::UpstreamError {
                provider: PROVIDER_NAME.to_string(),
                message: format!("HTTP {}", resp.status()),
            });
        }
        let parsed: ListResponse = resp.json().await.map_err(|e| CoreError::UpstreamError {
            provider: PROVIDER_NAME.to_string(),
            message: e.to_string(),
        })?;
        Ok(parsed
            .items
            .into_iter()
            .map(|item| MarketListEntry {
                address: item.address.clone(),
                overview: item.overview.into_overview(&item.address),
            })
            .collect())
    }
}
