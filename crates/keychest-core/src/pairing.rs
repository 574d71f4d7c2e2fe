//! Pairing resolver
//!
//! Pure computations over two catalogs: which secrets the target is
//! missing, and where a given key is already registered. Everything is
//! keyed by fingerprint because device-local ids are not comparable
//! across cards.

use crate::catalog::SecretCatalog;
use crate::secret::{SecretHeader, SecretKind};
use crate::types::Fingerprint;

/// Headers present on the master but absent from the backup.
///
/// Set difference keyed by fingerprint, preserving master catalog order.
/// Catalogs are bounded to low hundreds of entries, so the quadratic scan
/// is not worth avoiding.
pub fn missing(master: &SecretCatalog, backup: &SecretCatalog) -> Vec<SecretHeader> {
    master
        .iter()
        .filter(|h| !backup.contains_fingerprint(h.fingerprint))
        .cloned()
        .collect()
}

/// First header carrying the given fingerprint, if any
pub fn find_by_fingerprint(
    catalog: &SecretCatalog,
    fingerprint: Fingerprint,
) -> Option<&SecretHeader> {
    catalog.iter().find(|h| h.fingerprint == fingerprint)
}

/// First public-key header carrying the given fingerprint, if any.
///
/// Used for the pairing-key bootstrap: locating whether the counterpart
/// device's authentikey is already registered in this catalog. Restricted
/// to `PubKey` entries so a non-key secret can never be mistaken for a
/// recipient key.
pub fn find_pubkey_by_fingerprint(
    catalog: &SecretCatalog,
    fingerprint: Fingerprint,
) -> Option<&SecretHeader> {
    catalog
        .iter()
        .find(|h| h.kind == SecretKind::PubKey && h.fingerprint == fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::ExportPolicy;
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

    fn pubkey_header(id: u16, fp: [u8; 4]) -> SecretHeader {
        SecretHeader::new(
            SecretId::new(id),
            format!("key-{}", id),
            SecretKind::PubKey,
            0,
            ExportPolicy::Allowed,
            Fingerprint::new(fp),
        )
    }

    #[test]
    fn test_missing_by_fingerprint_not_id() {
        // Same fingerprint under different ids counts as present
        let master = SecretCatalog::from_headers(vec![
            header(1, [0x0a; 4]),
            header(2, [0x0b; 4]),
        ]);
        let backup = SecretCatalog::from_headers(vec![header(5, [0x0a; 4])]);

        let pending = missing(&master, &backup);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, SecretId::new(2));
        assert_eq!(pending[0].fingerprint, Fingerprint::new([0x0b; 4]));
    }

    #[test]
    fn test_missing_empty_when_backup_current() {
        let master = SecretCatalog::from_headers(vec![
            header(1, [0x0a; 4]),
            header(2, [0x0b; 4]),
        ]);
        let backup = SecretCatalog::from_headers(vec![
            header(9, [0x0b; 4]),
            header(8, [0x0a; 4]),
        ]);
        assert!(missing(&master, &backup).is_empty());
    }

    #[test]
    fn test_missing_preserves_master_order() {
        let master = SecretCatalog::from_headers(vec![
            header(3, [0x01; 4]),
            header(1, [0x02; 4]),
            header(2, [0x03; 4]),
        ]);
        let backup = SecretCatalog::new();

        let ids: Vec<u16> = missing(&master, &backup)
            .iter()
            .map(|h| h.id.as_u16())
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_find_by_fingerprint_first_match() {
        let catalog = SecretCatalog::from_headers(vec![
            header(1, [0x0a; 4]),
            header(2, [0x0a; 4]),
        ]);
        let found = find_by_fingerprint(&catalog, Fingerprint::new([0x0a; 4])).unwrap();
        assert_eq!(found.id, SecretId::new(1));
        assert!(find_by_fingerprint(&catalog, Fingerprint::new([0x0c; 4])).is_none());
    }

    #[test]
    fn test_find_pubkey_skips_other_kinds() {
        // A password secret with a colliding fingerprint must not shadow
        // the key lookup
        let catalog = SecretCatalog::from_headers(vec![
            header(1, [0x0a; 4]),
            pubkey_header(2, [0x0a; 4]),
        ]);
        let found = find_pubkey_by_fingerprint(&catalog, Fingerprint::new([0x0a; 4])).unwrap();
        assert_eq!(found.id, SecretId::new(2));

        let only_password = SecretCatalog::from_headers(vec![header(1, [0x0a; 4])]);
        assert!(find_pubkey_by_fingerprint(&only_password, Fingerprint::new([0x0a; 4])).is_none());
    }
}
