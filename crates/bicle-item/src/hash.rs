use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ItemError;

/// A 32-byte SHA-256 digest.
///
/// Serialises as a lowercase hex string so that exported chains stay readable
/// and can be re-checked with ordinary tooling.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash32(pub [u8; 32]);

/// Per-item content fingerprint (the "iHash").
pub type ItemFingerprint = Hash32;

impl Hash32 {
    /// The all-zero digest, used as the genesis predecessor sentinel.
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First `n` hex characters, for compact display.
    pub fn short(&self, n: usize) -> String {
        let mut s = self.to_hex();
        s.truncate(n);
        s
    }
}

impl From<[u8; 32]> for Hash32 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Hash32 {
    type Err = ItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| ItemError::InvalidDigest(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| ItemError::InvalidDigest(format!("expected 32 bytes, got {}", v.len())))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let h = Hash32([0xab; 32]);
        let parsed: Hash32 = h.to_hex().parse().unwrap();
        assert_eq!(parsed, h);
    }

    #[test]
    fn serialises_as_hex_string() {
        let json = serde_json::to_string(&Hash32::ZERO).unwrap();
        assert_eq!(json, format!("\"{}\"", "0".repeat(64)));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("abcd".parse::<Hash32>().is_err());
        assert!("zz".parse::<Hash32>().is_err());
    }
}
