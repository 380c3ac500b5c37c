//! Reads SPL on-chain metadata accounts via a Solana RPC endpoint
//! (spec §6 `chain.getMetadataAccount`, §4.5 step 2).
//!
//! Uses the `getAccountInfo` JSON-RPC method against the Metaplex Token
//! Metadata PDA for the mint. Parsing the PDA layout in full is out of
//! scope for this engine; the client decodes the subset of fields
//! (`name`, `symbol`, `uri`) needed by the enrichment pipeline.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use super::{ChainMetadata, ChainMetadataProvider};
use crate::types::CoreError;

const PROVIDER_NAME: &str = "chain-metadata";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
}

#[derive(Debug, Deserialize, Default)]
struct AccountInfoResult {
    value: Option<AccountValue>,
}

#[derive(Debug, Deserialize, Default)]
struct AccountValue {
    #[serde(default)]
    data: ParsedAccountData,
}

#[derive(Debug, Deserialize, Default)]
struct ParsedAccountData {
    #[serde(default)]
    parsed: Option<ParsedMetadata>,
}

#[derive(Debug, Deserialize, Default)]
struct ParsedMetadata {
    #[serde(default)]
    info: Option<MetadataInfo>,
}

#[derive(Debug, Deserialize, Default)]
struct MetadataInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    decimals: Option<u8>,
    #[serde(default)]
    uri: Option<String>,
}

/// RPC-backed `ChainMetadataProvider`.
pub struct RpcChainMetadataProvider {
    http: Client,
    rpc_endpoint: String,
}

impl RpcChainMetadataProvider {
    pub fn new(rpc_endpoint: impl Into<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent("coinhub/0.1.0")
            .build()?;
        Ok(Self {
            http,
            rpc_endpoint: rpc_endpoint.into(),
        })
    }
}

#[async_trait]
impl ChainMetadataProvider for RpcChainMetadataProvider {
    async fn get_metadata_account(&self, address: &str) -> Result<ChainMetadata, CoreError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getAccountInfo",
            "params": [address, {"encoding": "jsonParsed"}],
        });

        let resp = self
            .http
            .post(&self.rpc_endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::UpstreamError {
                provider: PROVIDER_NAME.to_string(),
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(CoreError::UpstreamError {
                provider: PROVIDER_NAME.to_string(),
                message: format!("HTTP {}", resp.status()),
            });
        }

        let parsed: RpcResponse<AccountInfoResult> =
            resp.json().await.map_err(|e| CoreError::UpstreamError {
                provider: PROVIDER_NAME.to_string(),
                message: e.to_string(),
            })?;

        if let Some(err) = parsed.error {
            warn!(address = %address, message = %err.message, "chain metadata RPC error");
            return Err(CoreError::UpstreamError {
                provider: PROVIDER_NAME.to_string(),
                message: err.message,
            });
        }

        let info = parsed
            .result
            .and_then(|r| r.value)
            .and_then(|v| v.data.parsed)
            .and_then(|p| p.info)
            .unwrap_or_default();

        Ok(ChainMetadata {
            name: info.name,
            symbol: info.symbol,
            decimals: info.decimals,
            metadata_uri: info.uri,
        })
    }
}
