//! Secure card collaborator
//!
//! The card speaks an authenticated APDU protocol and performs all
//! cryptography internally: PIN verification, identity-key retrieval, and
//! the pairwise-encrypted secret export/import. The orchestration layer
//! only sees this trait; wire format and ciphers stay on the other side
//! of it.

use thiserror::Error;

use keychest_core::{Authentikey, Fingerprint, Secret, SecretCatalog, SecretId};

/// Errors reported by the card itself
#[derive(Debug, Clone, Error)]
pub enum CardError {
    /// Wrong PIN presented
    #[error("PIN rejected ({retries_left} tries left)")]
    PinRejected { retries_left: u8 },

    /// Too many failed PIN attempts; the card refuses further tries
    #[error("PIN blocked after too many failed attempts")]
    PinLocked,

    /// Operation requires a verified PIN first
    #[error("PIN must be verified before this operation")]
    PinRequired,

    /// The card was never seeded, so it has no identity key
    #[error("card has no seed; identity key unavailable")]
    UninitializedSeed,

    /// The secret's export policy forbids leaving the card
    #[error("secret {0} is not exportable")]
    ExportForbidden(SecretId),

    /// No secret stored under that id
    #[error("no secret with id {0}")]
    SecretNotFound(SecretId),

    /// The secret was encrypted for a different recipient key
    #[error("secret was encrypted for a different recipient key")]
    RecipientMismatch,

    /// Card storage is exhausted
    #[error("card memory is full")]
    MemoryFull,

    /// Transport-level failure (card removed, reader gone, ...)
    #[error("communication failure: {0}")]
    Communication(String),

    /// Any other status word the card returned
    #[error("unexpected card status: 0x{sw:04X}")]
    Status { sw: u16 },
}

/// Operations the orchestration consumes from a card.
///
/// Calls are blocking and user-paced; some wait on physical card
/// (re)insertion with no timeout. `&mut self` reflects that the card
/// tracks per-channel state (PIN verification) across calls.
pub trait SecureCard {
    /// Verify the card's PIN, unlocking subsequent operations
    fn verify_pin(&mut self, pin: &[u8]) -> Result<(), CardError>;

    /// Retrieve the card's identity public key
    fn get_authentikey(&mut self) -> Result<Authentikey, CardError>;

    /// Fetch the full catalog of secret headers
    fn list_secret_headers(&mut self) -> Result<SecretCatalog, CardError>;

    /// Register a public key as a stored secret, returning its assigned
    /// id and the card-computed fingerprint
    fn import_pubkey(
        &mut self,
        label: &str,
        pubkey: &[u8],
    ) -> Result<(SecretId, Fingerprint), CardError>;

    /// Export a secret encrypted for the recipient key registered under
    /// `recipient_key_id`
    fn export_secret(
        &mut self,
        id: SecretId,
        recipient_key_id: SecretId,
    ) -> Result<Secret, CardError>;

    /// Import a secret that was encrypted for this card, returning the
    /// new id and the fingerprint the card computed over the decrypted
    /// content
    fn import_secret(
        &mut self,
        secret: &Secret,
        recipient_key_id: SecretId,
    ) -> Result<(SecretId, Fingerprint), CardError>;
}
