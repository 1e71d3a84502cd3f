//! Content fingerprints.
//!
//! A `Fingerprint` is a 128-bit md5 digest of a source string. The rewrite
//! engine uses fingerprints in two places: as the cache generation key (the
//! active script's digest) and as content-addressed memoisation keys, so that
//! two structurally identical fragments share cached work regardless of node
//! identity.

use serde::{Deserialize, Serialize};

/// A 128-bit content digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u128);

impl Fingerprint {
    /// The distinguished "no hash" value, used for cache entries that must
    /// not be invalidated by generation changes.
    pub const NONE: Fingerprint = Fingerprint(0);

    /// Digest a source string.
    pub fn of(text: &str) -> Fingerprint {
        let digest = md5::compute(text.as_bytes());
        Fingerprint(u128::from_be_bytes(digest.0))
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_text_same_fingerprint() {
        assert_eq!(Fingerprint::of("var a = 1;"), Fingerprint::of("var a = 1;"));
    }

    #[test]
    fn test_different_text_different_fingerprint() {
        assert_ne!(Fingerprint::of("var a = 1;"), Fingerprint::of("var a = 2;"));
    }

    #[test]
    fn test_none_sentinel() {
        assert!(Fingerprint::NONE.is_none());
        assert!(!Fingerprint::of("x").is_none());
    }
}
