//! Logo re-hosting client (spec §4.10, §6 `imageProxy`).
//!
//! Talks to an internal image-proxy service that mirrors token logos onto
//! S3-compatible storage so the engine never re-serves upstream IPFS/CDN
//! URLs directly to clients.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::ImageProxy;
use crate::types::CoreError;

const PROVIDER_NAME: &str = "image-proxy";

#[derive(Debug, Deserialize, Default)]
struct LookupResponse {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct UploadResponse {
    url: String,
}

/// HTTP-backed `ImageProxy` fronting an S3-compatible logo store.
pub struct HttpImageProxy {
    http: Client,
    s3_host: String,
}

impl HttpImageProxy {
    pub fn new(s3_host: impl Into<String>, timeout_secs: u64) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("coinhub/0.1.0")
            .build()?;
        Ok(Self {
            http,
            s3_host: s3_host.into(),
        })
    }
}

#[async_trait]
impl ImageProxy for HttpImageProxy {
    async fn get_s3_url(&self, source_url: &str) -> Result<Option<String>, CoreError> {
        let url = format!(
            "https://{}/lookup?source={}",
            self.s3_host,
            urlencoding::encode(source_url)
        );
        let resp = self.http.get(&url).send().await.map_err(|e| CoreError::UpstreamError {
            provider: PROVIDER_NAME.to_string(),
            message: e.to_string(),
        })?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(CoreError::UpstreamError {
                provider: PROVIDER_NAME.to_string(),
                message: format!("HTTP {}", resp.status()),
            });
        }
        let parsed: LookupResponse = resp.json().await.map_err(|e| CoreError::UpstreamError {
            provider: PROVIDER_NAME.to_string(),
            message: e.to_string(),
        })?;
        Ok(parsed.url)
    }

    async fn process_and_upload_image(&self, source_url: &str, address: &str) -> Result<String, CoreError> {
        debug!(source = %source_url, address = %address, "uploading logo to image proxy");
        let body = serde_json::json!({"source": source_url, "address": address});
        let url = format!("https://{}/upload", self.s3_host);
        let resp = self
            .http
            .post(&url)
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
        let parsed: UploadResponse = resp.json().await.map_err(|e| CoreError::UpstreamError {
            provider: PROVIDER_NAME.to_string(),
            message: e.to_string(),
        })?;
        Ok(parsed.url)
    }
}
