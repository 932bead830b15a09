//! Utility functions for identifiers and hashing

use bech32::Bech32m;
use uuid7::uuid7;

pub const BLUEPRINT_HRP: &str = "bp";
pub const BID_HRP: &str = "bid";
pub const REVISION_HRP: &str = "rev";

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Fresh identifier under one of the crate's prefixes.
///
/// The prefixes are valid hrps, so the raw uuid fallback is never expected.
pub fn new_id(hrp: &str) -> String {
    new_uuid_to_bech32(hrp).unwrap_or_else(|_| uuid7().to_string())
}

pub fn payload_digest(payload: &[u8]) -> String {
    sha256::digest(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_ids_are_unique_and_prefixed() {
        let a = new_id(REVISION_HRP);
        let b = new_id(REVISION_HRP);
        assert!(a.starts_with("rev1"));
        assert_ne!(a, b);
    }

    #[test]
    fn empty_hrp_is_rejected() {
        assert!(new_uuid_to_bech32("").is_err());
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(payload_digest(b"{}"), payload_digest(b"{}"));
        assert_ne!(payload_digest(b"{}"), payload_digest(b"[]"));
    }
}
