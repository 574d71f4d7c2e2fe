//! In-memory card simulator
//!
//! A deterministic `SecureCard` implementation used by unit and
//! integration tests, and by downstream work that needs the protocol
//! without hardware. The "encryption" is a toy recipient-bound transform;
//! what matters is that it enforces the same contract a real card does:
//! PIN gating, export policies, recipient binding, bounded memory, and
//! card-computed fingerprints.

use std::collections::VecDeque;

use zeroize::Zeroizing;

use keychest_core::{
    Authentikey, ExportPolicy, Fingerprint, Secret, SecretCatalog, SecretHeader, SecretId,
    SecretKind, MAX_CARD_SECRETS, MAX_LABEL_SIZE,
};

use crate::card::{CardError, SecureCard};
use crate::device::{DeviceRole, PinSource};
use crate::error::{BackupError, Result};

/// Initial PIN retry budget
const PIN_RETRIES: u8 = 5;

/// One operation as seen by the card, recorded for test assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardOp {
    VerifyPin,
    GetAuthentikey,
    ListHeaders,
    ImportPubkey,
    Export(SecretId),
    Import(Fingerprint),
}

impl CardOp {
    /// Whether this operation moves secret material
    pub fn is_transfer(&self) -> bool {
        matches!(self, CardOp::Export(_) | CardOp::Import(_))
    }
}

struct StoredSecret {
    header: SecretHeader,
    payload: Vec<u8>,
}

/// Simulated security card
pub struct SimCard {
    pin: Vec<u8>,
    retries_left: u8,
    pin_verified: bool,
    authentikey: Authentikey,
    store: Vec<StoredSecret>,
    next_id: u16,
    capacity: usize,
    /// Every call in arrival order
    pub journal: Vec<CardOp>,
    /// Pending injected transport failures, consumed one per call
    comm_failures: VecDeque<String>,
    /// When set, the next import reports a corrupted fingerprint
    corrupt_import: bool,
}

impl SimCard {
    /// Create a card with a deterministic identity derived from `seed`
    pub fn new(seed: u8, pin: &[u8]) -> Self {
        // 65-byte SEC1 uncompressed layout; contents only need to be
        // stable per seed, not a real curve point
        let mut bytes = vec![0x04];
        bytes.extend(Fingerprint::of(&[seed, 0x01]).as_bytes());
        bytes.extend(std::iter::repeat(seed).take(60));

        Self {
            pin: pin.to_vec(),
            retries_left: PIN_RETRIES,
            pin_verified: false,
            authentikey: Authentikey::new(bytes),
            store: Vec::new(),
            next_id: 1,
            capacity: MAX_CARD_SECRETS,
            journal: Vec::new(),
            comm_failures: VecDeque::new(),
            corrupt_import: false,
        }
    }

    /// This card's identity key, for test assertions
    pub fn authentikey(&self) -> Authentikey {
        self.authentikey.clone()
    }

    /// Number of secrets currently stored
    pub fn secret_count(&self) -> usize {
        self.store.len()
    }

    /// Store a secret directly, as if provisioned before the session
    pub fn seed_secret(
        &mut self,
        label: &str,
        kind: SecretKind,
        subtype: u8,
        export_policy: ExportPolicy,
        payload: Vec<u8>,
    ) -> SecretId {
        let id = self.allocate_id();
        let fingerprint = Fingerprint::of(&payload);
        self.store.push(StoredSecret {
            header: SecretHeader::new(id, label, kind, subtype, export_policy, fingerprint),
            payload,
        });
        id
    }

    /// Shrink the card's remaining capacity (for memory-full tests)
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    /// Make the next `n` calls fail at the transport level
    pub fn inject_comm_failures(&mut self, n: usize, message: &str) {
        for _ in 0..n {
            self.comm_failures.push_back(message.to_string());
        }
    }

    /// Make the next import report a wrong content fingerprint
    pub fn corrupt_next_import(&mut self) {
        self.corrupt_import = true;
    }

    /// Whether any export or import reached this card
    pub fn journal_contains_transfer(&self) -> bool {
        self.journal.iter().any(|op| op.is_transfer())
    }

    fn allocate_id(&mut self) -> SecretId {
        let id = SecretId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn check_transport(&mut self) -> std::result::Result<(), CardError> {
        match self.comm_failures.pop_front() {
            Some(msg) => Err(CardError::Communication(msg)),
            None => Ok(()),
        }
    }

    fn require_pin(&self) -> std::result::Result<(), CardError> {
        if self.pin_verified {
            Ok(())
        } else {
            Err(CardError::PinRequired)
        }
    }

    fn find(&self, id: SecretId) -> std::result::Result<&StoredSecret, CardError> {
        self.store
            .iter()
            .find(|s| s.header.id == id)
            .ok_or(CardError::SecretNotFound(id))
    }

    /// Recipient-bound toy cipher: XOR with the recipient key's
    /// fingerprint, cycled. Symmetric, so import applies it again.
    fn transform(payload: &[u8], recipient_fp: &Fingerprint) -> Vec<u8> {
        payload
            .iter()
            .zip(recipient_fp.as_bytes().iter().cycle())
            .map(|(b, k)| b ^ k)
            .collect()
    }
}

impl SecureCard for SimCard {
    fn verify_pin(&mut self, pin: &[u8]) -> std::result::Result<(), CardError> {
        self.journal.push(CardOp::VerifyPin);
        self.check_transport()?;

        if self.retries_left == 0 {
            return Err(CardError::PinLocked);
        }
        if pin == self.pin {
            self.pin_verified = true;
            self.retries_left = PIN_RETRIES;
            Ok(())
        } else {
            self.pin_verified = false;
            self.retries_left -= 1;
            if self.retries_left == 0 {
                Err(CardError::PinLocked)
            } else {
                Err(CardError::PinRejected {
                    retries_left: self.retries_left,
                })
            }
        }
    }

    fn get_authentikey(&mut self) -> std::result::Result<Authentikey, CardError> {
        self.journal.push(CardOp::GetAuthentikey);
        self.check_transport()?;
        self.require_pin()?;
        Ok(self.authentikey.clone())
    }

    fn list_secret_headers(&mut self) -> std::result::Result<SecretCatalog, CardError> {
        self.journal.push(CardOp::ListHeaders);
        self.check_transport()?;
        self.require_pin()?;
        Ok(SecretCatalog::from_headers(
            self.store.iter().map(|s| s.header.clone()).collect(),
        ))
    }

    fn import_pubkey(
        &mut self,
        label: &str,
        pubkey: &[u8],
    ) -> std::result::Result<(SecretId, Fingerprint), CardError> {
        self.journal.push(CardOp::ImportPubkey);
        self.check_transport()?;
        self.require_pin()?;

        if label.len() > MAX_LABEL_SIZE {
            return Err(CardError::Status { sw: 0x9C32 });
        }
        if self.store.len() >= self.capacity {
            return Err(CardError::MemoryFull);
        }

        let id = self.allocate_id();
        let fingerprint = Fingerprint::of(pubkey);
        self.store.push(StoredSecret {
            header: SecretHeader::new(
                id,
                label,
                SecretKind::PubKey,
                0,
                ExportPolicy::Allowed,
                fingerprint,
            ),
            payload: pubkey.to_vec(),
        });
        Ok((id, fingerprint))
    }

    fn export_secret(
        &mut self,
        id: SecretId,
        recipient_key_id: SecretId,
    ) -> std::result::Result<Secret, CardError> {
        self.journal.push(CardOp::Export(id));
        self.check_transport()?;
        self.require_pin()?;

        let recipient = self.find(recipient_key_id)?;
        if recipient.header.kind != SecretKind::PubKey {
            return Err(CardError::Status { sw: 0x9C10 });
        }
        let recipient_fp = Fingerprint::of(&recipient.payload);

        let stored = self.find(id)?;
        if stored.header.export_policy.is_forbidden() {
            return Err(CardError::ExportForbidden(id));
        }

        Ok(Secret {
            header: stored.header.clone(),
            ciphertext: Self::transform(&stored.payload, &recipient_fp),
            recipient_fingerprint: recipient_fp,
        })
    }

    fn import_secret(
        &mut self,
        secret: &Secret,
        recipient_key_id: SecretId,
    ) -> std::result::Result<(SecretId, Fingerprint), CardError> {
        self.journal
            .push(CardOp::Import(secret.header.fingerprint));
        self.check_transport()?;
        self.require_pin()?;

        // The secret must have been encrypted for this card's own key
        if secret.recipient_fingerprint != self.authentikey.fingerprint {
            return Err(CardError::RecipientMismatch);
        }
        // recipient_key_id references the sender's key registered on this
        // card; it must exist and be a pubkey entry
        if self.find(recipient_key_id)?.header.kind != SecretKind::PubKey {
            return Err(CardError::Status { sw: 0x9C10 });
        }

        if self.store.len() >= self.capacity {
            return Err(CardError::MemoryFull);
        }

        let payload = Self::transform(&secret.ciphertext, &self.authentikey.fingerprint);
        let fingerprint = if self.corrupt_import {
            self.corrupt_import = false;
            Fingerprint::new([0xff, 0xee, 0xdd, 0xcc])
        } else {
            Fingerprint::of(&payload)
        };

        let id = self.allocate_id();
        let header = SecretHeader::new(
            id,
            secret.header.label.clone(),
            secret.header.kind,
            secret.header.subtype,
            secret.header.export_policy,
            fingerprint,
        );
        self.store.push(StoredSecret { header, payload });
        Ok((id, fingerprint))
    }
}

/// Fixed per-role PINs for tests
pub struct ScriptedPins {
    master: Vec<u8>,
    backup: Vec<u8>,
}

impl ScriptedPins {
    pub fn new(master: &[u8], backup: &[u8]) -> Self {
        Self {
            master: master.to_vec(),
            backup: backup.to_vec(),
        }
    }

    /// Same PIN for both cards
    pub fn same(pin: &[u8]) -> Self {
        Self::new(pin, pin)
    }
}

impl PinSource for ScriptedPins {
    fn request_pin(&mut self, role: DeviceRole) -> Result<Zeroizing<Vec<u8>>> {
        let pin = match role {
            DeviceRole::Master => &self.master,
            DeviceRole::Backup => &self.backup,
        };
        Ok(Zeroizing::new(pin.clone()))
    }
}

/// A PIN source that always cancels, for prompt-flow tests
pub struct CancelledPins;

impl PinSource for CancelledPins {
    fn request_pin(&mut self, _role: DeviceRole) -> Result<Zeroizing<Vec<u8>>> {
        Err(BackupError::PinCancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_gating_and_lockout() {
        let mut card = SimCard::new(1, b"123456");
        assert!(matches!(
            card.get_authentikey(),
            Err(CardError::PinRequired)
        ));

        for expected_left in (1..PIN_RETRIES).rev() {
            match card.verify_pin(b"000000") {
                Err(CardError::PinRejected { retries_left }) => {
                    assert_eq!(retries_left, expected_left)
                }
                other => panic!("unexpected: {:?}", other.err()),
            }
        }
        assert!(matches!(card.verify_pin(b"000000"), Err(CardError::PinLocked)));
        // Locked even with the right PIN
        assert!(matches!(card.verify_pin(b"123456"), Err(CardError::PinLocked)));
    }

    #[test]
    fn test_export_is_recipient_bound() {
        let mut master = SimCard::new(1, b"111111");
        let mut backup = SimCard::new(2, b"222222");
        let mut stranger = SimCard::new(3, b"333333");

        master.verify_pin(b"111111").unwrap();
        backup.verify_pin(b"222222").unwrap();
        stranger.verify_pin(b"333333").unwrap();

        let sid = master.seed_secret(
            "seed",
            SecretKind::MasterSeed,
            0,
            ExportPolicy::Allowed,
            b"payload".to_vec(),
        );
        let (rid, _) = master
            .import_pubkey("backup key", &backup.authentikey().bytes)
            .unwrap();

        let secret = master.export_secret(sid, rid).unwrap();
        assert_ne!(secret.ciphertext, b"payload");

        // The intended recipient recovers the content fingerprint
        let (key_ref, _) = backup
            .import_pubkey("master key", &master.authentikey().bytes)
            .unwrap();
        let (_, fp) = backup.import_secret(&secret, key_ref).unwrap();
        assert_eq!(fp, secret.header.fingerprint);

        // Anyone else is rejected
        let (stranger_ref, _) = stranger
            .import_pubkey("master key", &master.authentikey().bytes)
            .unwrap();
        assert!(matches!(
            stranger.import_secret(&secret, stranger_ref),
            Err(CardError::RecipientMismatch)
        ));
    }

    #[test]
    fn test_export_policy_enforced() {
        let mut card = SimCard::new(1, b"111111");
        card.verify_pin(b"111111").unwrap();

        let sid = card.seed_secret(
            "locked",
            SecretKind::PrivKey,
            0,
            ExportPolicy::Forbidden,
            b"no".to_vec(),
        );
        let (rid, _) = card.import_pubkey("key", &[0x04; 65]).unwrap();
        assert!(matches!(
            card.export_secret(sid, rid),
            Err(CardError::ExportForbidden(id)) if id == sid
        ));
    }

    #[test]
    fn test_memory_full() {
        let mut card = SimCard::new(1, b"111111");
        card.verify_pin(b"111111").unwrap();
        card.set_capacity(1);
        card.seed_secret(
            "one",
            SecretKind::Password,
            0,
            ExportPolicy::Allowed,
            b"x".to_vec(),
        );
        assert!(matches!(
            card.import_pubkey("key", &[0x04; 65]),
            Err(CardError::MemoryFull)
        ));
    }

    #[test]
    fn test_comm_failure_injection() {
        let mut card = SimCard::new(1, b"111111");
        card.inject_comm_failures(1, "reader unplugged");
        assert!(matches!(
            card.verify_pin(b"111111"),
            Err(CardError::Communication(_))
        ));
        // Next call goes through
        card.verify_pin(b"111111").unwrap();
    }
}
