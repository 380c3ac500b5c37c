//! Enrichment pipeline (C5).
//!
//! Calls the market-data provider, then the on-chain metadata account,
//! then (if the account has a `uri`) the off-chain JSON it points to, and
//! merges the results under a fixed precedence per field (spec §4.5).
//! The content filter gates twice: once after the market-data call using
//! whatever name is known so far, and again after the full merge.

use chrono::Utc;
use tracing::{debug, warn};

use super::CoinService;
use crate::ipfs::standardize_logo_uri;
use crate::providers::{ChainMetadata, OffchainMetadata, TokenOverview};
use crate::types::{Coin, CoreError, CoreResult};

/// Caller-supplied fields, which take the highest precedence for identity
/// fields and tags (spec §4.5).
#[derive(Debug, Clone, Default)]
pub struct EnrichmentInput {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub logo_uri: Option<String>,
    pub tags: Vec<String>,
}

impl EnrichmentInput {
    pub fn bare(address: impl Into<String>) -> Self {
        EnrichmentInput {
            address: address.into(),
            ..Default::default()
        }
    }
}

fn first_attribute(meta: &OffchainMetadata, trait_type: &str) -> Option<String> {
    meta.fields
        .get("attributes")
        .and_then(|v| v.as_array())
        .and_then(|arr| {
            arr.iter().find_map(|entry| {
                let obj = entry.as_object()?;
                let tt = obj.get("trait_type")?.as_str()?;
                if tt.eq_ignore_ascii_case(trait_type) {
                    obj.get("value").and_then(|v| v.as_str()).map(|s| s.to_string())
                } else {
                    None
                }
            })
        })
}

/// Synthesized description default when off-chain metadata has none
/// (spec §4.5): both present, name-only, symbol-only, or neither.
fn default_description(name: &str, symbol: &str) -> String {
    match (name.is_empty(), symbol.is_empty()) {
        (false, false) => format!("{name} ({symbol}) is a Solana token."),
        (false, true) => format!("{name} is a Solana token."),
        (true, false) => format!("{symbol} is a Solana token."),
        (true, true) => "A Solana token.".to_string(),
    }
}

fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Rewrite a social handle into a bare handle (strip a leading `@` and any
/// `https://<host>/` prefix), accepting only a known host for that network.
fn extract_handle(raw: &str, expected_hosts: &[&str]) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(rest) = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
    {
        let mut parts = rest.splitn(2, '/');
        let host = parts.next().unwrap_or("");
        let handle = parts.next().unwrap_or("");
        let host_ok = expected_hosts.iter().any(|h| host.eq_ignore_ascii_case(h));
        if host_ok && !handle.is_empty() {
            return Some(handle.trim_start_matches('@').trim_end_matches('/').to_string());
        }
        return None;
    }
    Some(trimmed.trim_start_matches('@').to_string())
}

impl CoinService {
    /// Run the full enrichment pipeline for `input`, gating on the banned
    /// word list both before the off-chain fetch and after the final merge.
    pub async fn enrich(&self, input: EnrichmentInput) -> CoreResult<Coin> {
        if input.address.trim().is_empty() {
            return Err(CoreError::InvalidArgument("address must not be empty".to_string()));
        }

        let (overview, market_error) = match self.market_data.get_token_overview(&input.address).await {
            Ok(o) => (Some(o), None),
            Err(e) => {
                warn!(address = %input.address, error = %e, "market-data overview fetch failed, continuing without it");
                (None, Some(e))
            }
        };

        let provisional_name = input
            .name
            .clone()
            .or_else(|| overview.as_ref().and_then(|o| o.name.clone()))
            .unwrap_or_default();
        if self.banned_words.coin_contains_naughty_word(&provisional_name, "") {
            return Err(CoreError::InappropriateContent);
        }

        let chain_meta = match self.chain_metadata.get_metadata_account(&input.address).await {
            Ok(m) => m,
            Err(e) => {
                debug!(address = %input.address, error = %e, "chain metadata fetch failed, continuing without it");
                ChainMetadata::default()
            }
        };

        // Chain-metadata failure (or a trivially empty account) is non-fatal
        // only if the input or the market-data provider already produced
        // some identity or price (spec §4.5 step 2); otherwise there is
        // nothing to enrich and the pipeline fails outright, surfacing the
        // market-data provider's own error classification.
        let has_identity_or_price = input.name.is_some()
            || input.symbol.is_some()
            || overview.as_ref().is_some_and(|o| o.name.is_some() || o.symbol.is_some() || o.price.is_some());
        if !has_identity_or_price {
            return Err(market_error.unwrap_or_else(|| CoreError::NotFound(format!("no data available for {}", input.address))));
        }

        let offchain = match chain_meta.metadata_uri.as_deref() {
            Some(uri) if !uri.trim().is_empty() => match self.offchain.fetch_metadata(uri).await {
                Ok(m) => m,
                Err(e) => {
                    debug!(address = %input.address, error = %e, "off-chain metadata fetch failed, continuing without it");
                    OffchainMetadata::default()
                }
            },
            _ => OffchainMetadata::default(),
        };

        let coin = self.merge(input, overview, chain_meta, offchain)?;

        if self.banned_words.coin_contains_naughty_word(&coin.name, &coin.description) {
            return Err(CoreError::InappropriateContent);
        }

        Ok(coin)
    }

    fn merge(
        &self,
        input: EnrichmentInput,
        overview: Option<TokenOverview>,
        chain_meta: ChainMetadata,
        offchain: OffchainMetadata,
    ) -> CoreResult<Coin> {
        let mut coin = Coin::new_bare(&input.address);

        // name/symbol/decimals: input > market-data > off-chain > chain-metadata.
        coin.name = input
            .name
            .or_else(|| overview.as_ref().and_then(|o| o.name.clone()))
            .or_else(|| offchain.get_str("name").map(str::to_string))
            .or_else(|| chain_meta.name.clone())
            .unwrap_or_default();
        coin.symbol = input
            .symbol
            .or_else(|| overview.as_ref().and_then(|o| o.symbol.clone()))
            .or_else(|| offchain.get_str("symbol").map(str::to_string))
            .or_else(|| chain_meta.symbol.clone())
            .unwrap_or_default();
        coin.decimals = input
            .decimals
            .or_else(|| overview.as_ref().and_then(|o| o.decimals))
            .or(chain_meta.decimals)
            .unwrap_or(0);

        // logo: market-data > input > offchain.image > offchain.logoURI.
        let raw_logo = overview
            .as_ref()
            .and_then(|o| o.logo_uri.clone())
            .or_else(|| input.logo_uri.clone())
            .or_else(|| offchain.get_str("image").map(str::to_string))
            .or_else(|| offchain.get_str("logoURI").map(str::to_string))
            .unwrap_or_default();
        coin.logo_uri = if raw_logo.is_empty() {
            String::new()
        } else {
            standardize_logo_uri(&raw_logo, &self.cidv0_gateways, &self.cidv1_gateways)
        };

        // description: offchain.description > synthesized default.
        coin.description = offchain
            .get_str("description")
            .map(str::to_string)
            .unwrap_or_else(|| default_description(&coin.name, &coin.symbol));

        // website: offchain.website > offchain.external_url > attribute("website").
        let raw_website = offchain
            .get_str("website")
            .map(str::to_string)
            .or_else(|| offchain.get_str("external_url").map(str::to_string))
            .or_else(|| first_attribute(&offchain, "website"))
            .unwrap_or_default();
        coin.website = if raw_website.is_empty() {
            String::new()
        } else {
            normalize_url(&raw_website)
        };

        // twitter: direct field > extensions.twitter > attribute("twitter").
        let raw_twitter = offchain
            .get_str("twitter")
            .map(str::to_string)
            .or_else(|| offchain.get_extension("twitter").map(str::to_string))
            .or_else(|| first_attribute(&offchain, "twitter"));
        coin.twitter = raw_twitter
            .and_then(|raw| extract_handle(&raw, &["twitter.com", "x.com"]))
            .map(|handle| format!("https://twitter.com/{handle}"))
            .unwrap_or_default();

        // telegram: direct field > extensions.telegram > attribute("telegram").
        let raw_telegram = offchain
            .get_str("telegram")
            .map(str::to_string)
            .or_else(|| offchain.get_extension("telegram").map(str::to_string))
            .or_else(|| first_attribute(&offchain, "telegram"));
        coin.telegram = raw_telegram
            .and_then(|raw| extract_handle(&raw, &["t.me", "telegram.me"]))
            .map(|handle| format!("https://t.me/{handle}"))
            .unwrap_or_default();

        // tags: input > market-data.
        if !input.tags.is_empty() {
            coin.tags = input.tags.into_iter().collect();
        } else if let Some(o) = &overview {
            coin.tags = o.tags.iter().cloned().collect();
        }

        if let Some(o) = overview {
            coin.price = o.price.unwrap_or_default();
            coin.price_change_24h_pct = o.price_change_24h_pct.unwrap_or_default();
            coin.market_cap = o.market_cap.unwrap_or_default();
            coin.volume_24h_usd = o.volume_24h_usd.unwrap_or_default();
            coin.volume_change_24h_pct = o.volume_change_24h_pct.unwrap_or_default();
            coin.liquidity = o.liquidity.unwrap_or_default();
            coin.fully_diluted_valuation = o.fully_diluted_valuation.unwrap_or_default();
            coin.rank = o.rank.unwrap_or(0);
        }

        // I3: last-updated is bumped on every market write.
        coin.last_updated = Utc::now();
        Ok(coin)
    }

    /// Refresh only `coin`'s market-data fields from the market-data
    /// provider (spec §4.7 step 6), cheaper than a full C5 pass for a
    /// batch read's stale rows. On provider failure the stale record is
    /// returned unchanged rather than propagating the error, matching the
    /// batch path's per-item elision.
    pub(crate) async fn refresh_market_fields(&self, coin: &Coin) -> Coin {
        match self.market_data.get_token_overview(&coin.address).await {
            Ok(o) => {
                let mut updated = coin.clone();
                updated.price = o.price.unwrap_or_default();
                updated.price_change_24h_pct = o.price_change_24h_pct.unwrap_or_default();
                updated.market_cap = o.market_cap.unwrap_or_default();
                updated.volume_24h_usd = o.volume_24h_usd.unwrap_or_default();
                updated.volume_change_24h_pct = o.volume_change_24h_pct.unwrap_or_default();
                updated.liquidity = o.liquidity.unwrap_or_default();
                updated.fully_diluted_valuation = o.fully_diluted_valuation.unwrap_or_default();
                updated.rank = o.rank.unwrap_or(0);
                updated.last_updated = Utc::now();
                updated
            }
            Err(e) => {
                warn!(address = %coin.address, error = %e, "market-data-only refresh failed, keeping stale record");
                coin.clone()
            }
        }
    }
}
