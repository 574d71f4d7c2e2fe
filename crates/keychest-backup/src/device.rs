//! Per-device session context
//!
//! A `DeviceContext` is the session's handle to one physical card: the
//! cached PIN, the identity key seen at pairing, and the catalog snapshot.
//! It is created when its pairing stage succeeds and dropped (zeroing the
//! PIN) when the session resets or completes.

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use keychest_core::{
    find_pubkey_by_fingerprint, Authentikey, SecretCatalog, SecretId,
};

use crate::card::SecureCard;
use crate::error::{BackupError, Result};

/// Which side of the backup a card plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    /// The card whose secrets are being backed up
    Master,
    /// The card receiving the secrets
    Backup,
}

impl std::fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceRole::Master => f.write_str("master"),
            DeviceRole::Backup => f.write_str("backup"),
        }
    }
}

/// Presentation-layer hook for PIN entry.
///
/// Called only when no PIN is cached for the device; returning an error
/// (`PinCancelled`) keeps the session at its current stage.
pub trait PinSource {
    fn request_pin(&mut self, role: DeviceRole) -> Result<Zeroizing<Vec<u8>>>;
}

/// Session cache for one physical card
#[derive(Debug)]
pub struct DeviceContext {
    role: DeviceRole,
    /// PIN cached for re-verification on re-insertion; zeroed on drop
    pin: Zeroizing<Vec<u8>>,
    /// Identity key seen at pairing
    authentikey: Authentikey,
    /// Catalog snapshot fetched at pairing; replaced wholesale on
    /// re-pairing, never patched
    catalog: SecretCatalog,
    /// Id under which the counterpart's authentikey is registered in this
    /// card's catalog; set by `ensure_counterpart_key_registered`
    counterpart_key_id: Option<SecretId>,
}

impl DeviceContext {
    /// Pair with the card currently in the slot.
    ///
    /// Prompts for the PIN, verifies it on the card, then fetches the
    /// identity key and the catalog. A rejected PIN is discarded so the
    /// next attempt prompts again.
    pub fn pair(
        card: &mut dyn SecureCard,
        pins: &mut dyn PinSource,
        role: DeviceRole,
    ) -> Result<Self> {
        let pin = pins.request_pin(role)?;
        card.verify_pin(&pin)
            .map_err(|e| BackupError::from_card(role, e))?;

        let authentikey = card
            .get_authentikey()
            .map_err(|e| BackupError::from_card(role, e))?;
        let catalog = card
            .list_secret_headers()
            .map_err(|e| BackupError::from_card(role, e))?;

        info!(
            %role,
            authentikey = %authentikey.fingerprint,
            secrets = catalog.len(),
            "card paired"
        );

        Ok(Self {
            role,
            pin,
            authentikey,
            catalog,
            counterpart_key_id: None,
        })
    }

    /// Re-verify this card after a re-insertion checkpoint.
    ///
    /// The cached PIN is presented again and the identity key is compared
    /// to the one seen at pairing, guarding against a card swap mid-flow.
    /// Fails without touching any collected session state, so the user
    /// can insert the correct card and retry.
    pub fn reauthenticate(&self, card: &mut dyn SecureCard) -> Result<()> {
        card.verify_pin(&self.pin)
            .map_err(|e| BackupError::from_card(self.role, e))?;

        let key = card
            .get_authentikey()
            .map_err(|e| BackupError::from_card(self.role, e))?;
        if key != self.authentikey {
            warn!(
                role = %self.role,
                expected = %self.authentikey.fingerprint,
                found = %key.fingerprint,
                "different card inserted at re-insertion checkpoint"
            );
            return Err(BackupError::WrongDevice { role: self.role });
        }

        debug!(role = %self.role, "card re-authenticated");
        Ok(())
    }

    /// Make sure the counterpart device's authentikey is registered in
    /// this card's catalog, returning its local id.
    ///
    /// The id is the recipient key reference for encrypted transfer
    /// toward the counterpart; this must run once per direction before
    /// any secret moves in that direction.
    pub fn ensure_counterpart_key_registered(
        &mut self,
        card: &mut dyn SecureCard,
        counterpart: &Authentikey,
    ) -> Result<SecretId> {
        if let Some(header) = find_pubkey_by_fingerprint(&self.catalog, counterpart.fingerprint) {
            debug!(
                role = %self.role,
                id = %header.id,
                fingerprint = %counterpart.fingerprint,
                "counterpart key already registered"
            );
            self.counterpart_key_id = Some(header.id);
            return Ok(header.id);
        }

        let label = format!("paired-device key {}", counterpart.fingerprint.to_hex());
        let (id, fingerprint) = card
            .import_pubkey(&label, &counterpart.bytes)
            .map_err(|e| BackupError::from_card(self.role, e))?;

        if fingerprint != counterpart.fingerprint {
            // The card owns the fingerprint construction; a divergence
            // here means host and card disagree on the key encoding
            warn!(
                role = %self.role,
                expected = %counterpart.fingerprint,
                card = %fingerprint,
                "card computed a different fingerprint for the imported key"
            );
        }

        info!(role = %self.role, %id, "counterpart key registered");
        self.counterpart_key_id = Some(id);
        Ok(id)
    }

    pub fn role(&self) -> DeviceRole {
        self.role
    }

    pub fn authentikey(&self) -> &Authentikey {
        &self.authentikey
    }

    pub fn catalog(&self) -> &SecretCatalog {
        &self.catalog
    }

    /// Recipient key reference for transfers toward the counterpart, once
    /// registered
    pub fn counterpart_key_id(&self) -> Option<SecretId> {
        self.counterpart_key_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ScriptedPins, SimCard};
    use keychest_core::{ExportPolicy, SecretKind};

    #[test]
    fn test_pair_caches_key_and_catalog() {
        let mut card = SimCard::new(1, b"123456");
        card.seed_secret(
            "wallet seed",
            SecretKind::MasterSeed,
            0,
            ExportPolicy::Allowed,
            b"seed-bytes".to_vec(),
        );
        let mut pins = ScriptedPins::same(b"123456");

        let ctx = DeviceContext::pair(&mut card, &mut pins, DeviceRole::Master).unwrap();
        assert_eq!(ctx.role(), DeviceRole::Master);
        assert_eq!(ctx.catalog().len(), 1);
        assert_eq!(ctx.authentikey(), &card.authentikey());
        assert!(ctx.counterpart_key_id().is_none());
    }

    #[test]
    fn test_pair_rejects_bad_pin() {
        let mut card = SimCard::new(1, b"123456");
        let mut pins = ScriptedPins::same(b"000000");

        let err = DeviceContext::pair(&mut card, &mut pins, DeviceRole::Backup).unwrap_err();
        assert!(matches!(
            err,
            BackupError::PinRejected {
                role: DeviceRole::Backup,
                ..
            }
        ));
    }

    #[test]
    fn test_reauthenticate_detects_card_swap() {
        let mut card = SimCard::new(1, b"123456");
        let mut other = SimCard::new(2, b"123456");
        let mut pins = ScriptedPins::same(b"123456");

        let ctx = DeviceContext::pair(&mut card, &mut pins, DeviceRole::Master).unwrap();
        assert!(ctx.reauthenticate(&mut card).is_ok());

        let err = ctx.reauthenticate(&mut other).unwrap_err();
        assert!(matches!(
            err,
            BackupError::WrongDevice {
                role: DeviceRole::Master
            }
        ));
    }

    #[test]
    fn test_ensure_counterpart_key_registers_once() {
        let mut card = SimCard::new(1, b"123456");
        let counterpart = SimCard::new(2, b"654321").authentikey();
        let mut pins = ScriptedPins::same(b"123456");

        let mut ctx = DeviceContext::pair(&mut card, &mut pins, DeviceRole::Master).unwrap();
        let id = ctx
            .ensure_counterpart_key_registered(&mut card, &counterpart)
            .unwrap();
        assert_eq!(ctx.counterpart_key_id(), Some(id));

        // Re-pairing sees the stored key and reuses the same id
        let mut ctx2 = DeviceContext::pair(&mut card, &mut pins, DeviceRole::Master).unwrap();
        let id2 = ctx2
            .ensure_counterpart_key_registered(&mut card, &counterpart)
            .unwrap();
        assert_eq!(id2, id);
        assert_eq!(card.secret_count(), 1);
    }
}
