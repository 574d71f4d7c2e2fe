//! Core type aliases and newtypes

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::FINGERPRINT_SIZE;

/// Device-local secret identifier.
///
/// Assigned by the card when a secret is stored; unique only within one
/// card's catalog and never comparable across devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretId(pub u16);

impl SecretId {
    pub fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for SecretId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content-derived secret identifier (4 bytes).
///
/// Stable across devices, which makes it the basis for cross-device
/// identity of "the same secret". The card computes it over the secret's
/// raw encoding; the host computes it the same way only for public keys
/// it searches for or registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(#[serde(with = "hex_bytes_4")] pub [u8; FINGERPRINT_SIZE]);

impl Fingerprint {
    /// Create a fingerprint from raw bytes
    pub fn new(bytes: [u8; FINGERPRINT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Compute the fingerprint of a secret's raw encoding
    /// (first four bytes of SHA-256)
    pub fn of(raw: &[u8]) -> Self {
        let digest = Sha256::digest(raw);
        let mut bytes = [0u8; FINGERPRINT_SIZE];
        bytes.copy_from_slice(&digest[..FINGERPRINT_SIZE]);
        Self(bytes)
    }

    /// Get the bytes of the fingerprint
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_SIZE] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Create from hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; FINGERPRINT_SIZE];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A device's identity public key.
///
/// Identifies the physical card across re-insertions and doubles as the
/// encryption target when secrets are exported to that card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentikey {
    /// SEC1-encoded public key bytes
    pub bytes: Vec<u8>,
    /// Fingerprint of the key's raw secret encoding
    pub fingerprint: Fingerprint,
}

impl Authentikey {
    /// Wrap public key bytes, deriving the fingerprint
    pub fn new(bytes: Vec<u8>) -> Self {
        let fingerprint = Fingerprint::of(&bytes);
        Self { bytes, fingerprint }
    }
}

/// Serde helper for 4-byte arrays as hex strings
pub mod hex_bytes_4 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 4], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 4], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 4];
        hex::decode_to_slice(&s, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let a = Fingerprint::of(b"some secret payload");
        let b = Fingerprint::of(b"some secret payload");
        assert_eq!(a, b);

        let c = Fingerprint::of(b"different payload");
        assert_ne!(a, c);
    }

    #[test]
    fn test_fingerprint_hex_roundtrip() {
        let fp = Fingerprint::new([0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(fp.to_hex(), "deadbeef");
        assert_eq!(Fingerprint::from_hex("deadbeef").unwrap(), fp);
    }

    #[test]
    fn test_authentikey_fingerprint_matches_bytes() {
        let key = Authentikey::new(vec![0x04; 65]);
        assert_eq!(key.fingerprint, Fingerprint::of(&key.bytes));
    }
}
