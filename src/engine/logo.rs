//! Logo side-effect (C10): the synchronous URL rewrite happens inline
//! during enrichment (`ipfs::standardize_logo_uri`); this module is the
//! asynchronous fire-and-forget re-hosting upload, bounded by the global
//! image-upload semaphore and running on an independent cancellation root
//! (spec §4.10, §9 Design Notes) so a caller's own cancellation never
//! aborts an in-flight upload others may be waiting on.

use tracing::warn;

use super::CoinService;
use crate::store::Store;
use crate::types::{Coin, CoreResult};

impl CoinService {
    /// Spawn a detached task that re-hosts `coin`'s logo via the image
    /// proxy, if configured, and updates the stored row on success.
    /// Fire-and-forget: the caller does not await the upload.
    pub fn trigger_logo_upload(&self, coin: &Coin) {
        if coin.logo_uri.trim().is_empty() {
            return;
        }

        let store = self.store.clone();
        let image_proxy = self.image_proxy.clone();
        let limiter = self.image_upload_limiter.clone();
        let address = coin.address.clone();
        let source_url = coin.logo_uri.clone();

        tokio::spawn(async move {
            let _permit = match limiter.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return, // semaphore closed at shutdown
            };

            match image_proxy.get_s3_url(&source_url).await {
                Ok(Some(existing)) => {
                    if let Err(e) = apply_logo_url(&store, &address, &existing).await {
                        warn!(address = %address, error = %e, "failed to persist existing logo URL");
                    }
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(address = %address, error = %e, "logo lookup failed, attempting upload");
                }
            }

            match image_proxy.process_and_upload_image(&source_url, &address).await {
                Ok(hosted_url) => {
                    if let Err(e) = apply_logo_url(&store, &address, &hosted_url).await {
                        warn!(address = %address, error = %e, "failed to persist uploaded logo URL");
                    }
                }
                Err(e) => warn!(address = %address, error = %e, "logo upload failed"),
            }
        });
    }
}

async fn apply_logo_url(store: &Store, address: &str, url: &str) -> CoreResult<()> {
    if let Some(mut coin) = store.get_by_address(address).await? {
        coin.logo_uri = url.to_string();
        store.update(&coin).await?;
    }
    Ok(())
}
