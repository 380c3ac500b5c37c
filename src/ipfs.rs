//! IPFS URL standardization (part of C5).
//!
//! A pure function: given a logo URI and the configured gateway lists, it
//! rewrites `ipfs://<cid>[/path][?query]` or an embedded `/ipfs/<cid>...`
//! segment to a canonical HTTPS gateway URL. CIDv0 (prefix `Qm`, length
//! 46) picks from `cidv0_gateways`; anything else is treated as CIDv1 and
//! picks from `cidv1_gateways`. Both lists are ordered; the first gateway
//! is used. An empty gateway list for the relevant CID version leaves the
//! input unchanged (spec §8 boundary behavior).

const CIDV0_PREFIX: &str = "Qm";
const CIDV0_LEN: usize = 46;

fn is_cidv0(cid: &str) -> bool {
    cid.starts_with(CIDV0_PREFIX) && cid.chars().count() == CIDV0_LEN
}

/// Extract `(cid, rest)` from a URI of the form `ipfs://<cid>[/path][?query]`
/// or containing `.../ipfs/<cid>[/path][?query]`.
fn extract_cid(uri: &str) -> Option<(String, String)> {
    let after_scheme = uri.strip_prefix("ipfs://").map(|rest| rest.to_string());
    let after_path_segment = uri.find("/ipfs/").map(|idx| uri[idx + "/ipfs/".len()..].to_string());

    let rest = after_scheme.or(after_path_segment)?;
    let split_at = rest.find(['/', '?']).unwrap_or(rest.len());
    let cid = rest[..split_at].to_string();
    let tail = rest[split_at..].to_string();
    if cid.is_empty() {
        None
    } else {
        Some((cid, tail))
    }
}

/// Rewrite an IPFS-style logo URI to a canonical HTTPS gateway URL.
/// Non-IPFS URIs, and IPFS URIs with no configured gateway for their CID
/// version, are returned unchanged.
pub fn standardize_logo_uri(uri: &str, cidv0_gateways: &[String], cidv1_gateways: &[String]) -> String {
    let Some((cid, tail)) = extract_cid(uri) else {
        return uri.to_string();
    };

    let gateways = if is_cidv0(&cid) { cidv0_gateways } else { cidv1_gateways };
    match gateways.first() {
        Some(gateway) => format!("{}/{}{}", gateway.trim_end_matches('/'), cid, tail),
        None => uri.to_string(),
    }
}
