//! Public key fingerprints for out-of-band identity verification.
//!
//! Participants read their fingerprints to each other over another channel
//! to rule out a relay substituting its own keys.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// A SHA-256 digest over a participant's SPKI public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// 64 uppercase hex digits in 16 groups of 4, separated by spaces.
    pub display: String,
    pub digest: [u8; 32],
}

impl Fingerprint {
    /// Compare against a digest received out of band, in constant time.
    pub fn matches(&self, other_digest: &[u8]) -> bool {
        self.digest[..].ct_eq(other_digest).into()
    }
}

/// Compute the fingerprint of an SPKI-encoded public key.
pub fn fingerprint(public_key_spki: &[u8]) -> Fingerprint {
    let digest: [u8; 32] = Sha256::digest(public_key_spki).into();

    let hex: String = digest.iter().map(|b| format!("{b:02X}")).collect();
    let display = hex
        .as_bytes()
        .chunks(4)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect::<Vec<_>>()
        .join(" ");

    Fingerprint { display, digest }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_16_groups_of_4_hex_digits() {
        let fp = fingerprint(b"some public key");
        let groups: Vec<&str> = fp.display.split(' ').collect();
        assert_eq!(groups.len(), 16);
        for group in groups {
            assert_eq!(group.len(), 4);
            assert!(group
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        }
    }

    #[test]
    fn same_key_gives_same_fingerprint() {
        assert_eq!(fingerprint(b"key-a"), fingerprint(b"key-a"));
    }

    #[test]
    fn different_keys_give_different_fingerprints() {
        assert_ne!(fingerprint(b"key-a").display, fingerprint(b"key-b").display);
    }

    #[test]
    fn known_digest_of_empty_input() {
        let fp = fingerprint(b"");
        assert!(fp.display.starts_with("E3B0 C442 98FC 1C14"));
    }

    #[test]
    fn matches_compares_digests() {
        let fp = fingerprint(b"key-a");
        assert!(fp.matches(&fp.digest));
        assert!(!fp.matches(&fingerprint(b"key-b").digest));
        assert!(!fp.matches(&fp.digest[..16]));
    }
}
