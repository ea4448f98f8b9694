//! Content fingerprints used as dedup keys

use md5::{Digest, Md5};
use std::fmt;

/// Width of one fingerprint record in bytes
pub const FINGERPRINT_LEN: usize = 16;

/// MD5 digest of an item's exact bytes
///
/// Equal fingerprints are treated as equal items; collisions are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Computes the fingerprint of `value`
    pub fn of(value: &[u8]) -> Self {
        let digest = Md5::digest(value);
        let mut bytes = [0u8; FINGERPRINT_LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Rebuilds a fingerprint from a raw on-disk record
    pub fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw record bytes, as written to the fingerprint log
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
