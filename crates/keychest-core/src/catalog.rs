//! Secret catalogs
//!
//! A catalog is the ordered list of secret headers visible on one card at
//! a point in time. It is fetched whole during pairing and replaced by a
//! fresh fetch if re-pairing occurs, never mutated in place.

use serde::{Deserialize, Serialize};

use crate::secret::SecretHeader;
use crate::types::Fingerprint;

/// Ordered snapshot of one card's secret headers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretCatalog {
    headers: Vec<SecretHeader>,
}

impl SecretCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog from headers in card order
    pub fn from_headers(headers: Vec<SecretHeader>) -> Self {
        Self { headers }
    }

    /// Number of headers in the catalog
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterate headers in card order
    pub fn iter(&self) -> impl Iterator<Item = &SecretHeader> {
        self.headers.iter()
    }

    /// All headers in card order
    pub fn headers(&self) -> &[SecretHeader] {
        &self.headers
    }

    /// Whether any header carries the given fingerprint
    pub fn contains_fingerprint(&self, fingerprint: Fingerprint) -> bool {
        self.headers.iter().any(|h| h.fingerprint == fingerprint)
    }
}

impl<'a> IntoIterator for &'a SecretCatalog {
    type Item = &'a SecretHeader;
    type IntoIter = std::slice::Iter<'a, SecretHeader>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::{ExportPolicy, SecretKind};
    use crate::types::SecretId;

    fn header(id: u16, fp: [u8; 4]) -> SecretHeader {
        SecretHeader::new(
            SecretId::new(id),
            format!("secret-{}", id),
            SecretKind::Password,
            0,
            ExportPolicy::Allowed,
            Fingerprint::new(fp),
        )
    }

    #[test]
    fn test_contains_fingerprint() {
        let catalog = SecretCatalog::from_headers(vec![
            header(1, [0xaa; 4]),
            header(2, [0xbb; 4]),
        ]);
        assert!(catalog.contains_fingerprint(Fingerprint::new([0xaa; 4])));
        assert!(!catalog.contains_fingerprint(Fingerprint::new([0xcc; 4])));
    }

    #[test]
    fn test_preserves_card_order() {
        let catalog = SecretCatalog::from_headers(vec![
            header(7, [0x01; 4]),
            header(3, [0x02; 4]),
            header(5, [0x03; 4]),
        ]);
        let ids: Vec<u16> = catalog.iter().map(|h| h.id.as_u16()).collect();
        assert_eq!(ids, vec![7, 3, 5]);
    }
}
