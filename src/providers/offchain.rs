//! Fetches off-chain JSON metadata pointed to by a mint's on-chain `uri`
//! (spec §6 `offchain.fetchMetadata`, §4.5 step 3).
//!
//! The target JSON shape varies across token issuers, so the response is
//! captured as a generic string-keyed map (spec §9 Design Notes) rather
//! than a fixed struct.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::{OffchainMetadataFetcher, OffchainMetadata};
use crate::types::CoreError;

const PROVIDER_NAME: &str = "offchain-metadata";

/// HTTP-backed `OffchainMetadataFetcher`.
pub struct HttpOffchainMetadataFetcher {
    http: Client,
}

impl HttpOffchainMetadataFetcher {
    pub fn new(timeout_secs: u64) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("coinhub/0.1.0")
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl OffchainMetadataFetcher for HttpOffchainMetadataFetcher {
    async fn fetch_metadata(&self, uri: &str) -> Result<OffchainMetadata, CoreError> {
        if uri.trim().is_empty() {
            return Ok(OffchainMetadata::default());
        }

        debug!(uri = %uri, "fetching off-chain metadata");
        let resp = self.http.get(uri).send().await.map_err(|e| CoreError::UpstreamError {
            provider: PROVIDER_NAME.to_string(),
            message: e.to_string(),
        })?;

        if !resp.status().is_success() {
            return Err(CoreError::UpstreamError {
                provider: PROVIDER_NAME.to_string(),
                message: format!("HTTP {}", resp.status()),
            });
        }

        let fields: HashMap<String, serde_json::Value> =
            resp.json().await.map_err(|e| CoreError::UpstreamError {
                provider: PROVIDER_NAME.to_string(),
                message: e.to_string(),
            })?;

        Ok(OffchainMetadata { fields })
    }
}
