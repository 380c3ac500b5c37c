//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (provider API keys) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub lists: ListsConfig,
    pub ipfs: IpfsConfig,
    pub image_proxy: ImageProxyConfig,
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub solana_rpc_endpoint: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListsConfig {
    pub trending: ListRefreshConfig,
    pub new_coins: ListRefreshConfig,
    pub top_gainers: ListRefreshConfig,
    pub xstocks: XStocksConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListRefreshConfig {
    /// Zero disables the refresher (spec §6).
    pub fetch_interval_secs: u64,
    /// Per-refresher enrichment concurrency cap (spec §5: 3 for trending/top-gainer).
    pub concurrency: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct XStocksConfig {
    pub seed_path: String,
    /// Inter-item delay for the sequential xstocks refresher (spec §4.8).
    pub item_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IpfsConfig {
    pub cidv0_gateways: Vec<String>,
    pub cidv1_gateways: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImageProxyConfig {
    pub enabled: bool,
    pub s3_host: String,
    /// Capacity of the global upload semaphore (spec §6 `imageUploadLimiter`).
    pub upload_concurrency: usize,
    pub upload_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProvidersConfig {
    pub market_data_base_url: Option<String>,
    pub market_data_api_key_env: Option<String>,
    pub chain_metadata_base_url: Option<String>,
    pub offchain_fetch_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig =
            toml::from_str(&contents).with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// `SolanaRPCEndpoint` is mandatory and non-empty per spec §6.
    fn validate(&self) -> Result<()> {
        if self.service.solana_rpc_endpoint.trim().is_empty() {
            bail!("service.solana_rpc_endpoint must not be empty");
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name).with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
