//! Secret headers and payloads

use serde::{Deserialize, Serialize};

use crate::types::{Fingerprint, SecretId};

/// The closed set of secret types a card can store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretKind {
    /// Raw master seed
    MasterSeed,
    /// BIP39 mnemonic phrase
    Bip39Mnemonic,
    /// Electrum mnemonic phrase
    ElectrumMnemonic,
    /// Shamir secret share
    ShamirShare,
    /// Raw private key
    PrivKey,
    /// Public key (device authentikeys are stored as this kind)
    PubKey,
    /// Password entry
    Password,
    /// Certificate
    Certificate,
    /// TOTP/2FA secret
    TwoFaSecret,
}

impl SecretKind {
    /// Human-readable kind name, used in logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            SecretKind::MasterSeed => "masterseed",
            SecretKind::Bip39Mnemonic => "bip39-mnemonic",
            SecretKind::ElectrumMnemonic => "electrum-mnemonic",
            SecretKind::ShamirShare => "shamir-share",
            SecretKind::PrivKey => "privkey",
            SecretKind::PubKey => "pubkey",
            SecretKind::Password => "password",
            SecretKind::Certificate => "certificate",
            SecretKind::TwoFaSecret => "2fa-secret",
        }
    }
}

impl std::fmt::Display for SecretKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a secret may leave the card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportPolicy {
    /// Encrypted export to a registered recipient key is allowed
    Allowed,
    /// The secret can never be exported
    Forbidden,
}

impl ExportPolicy {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ExportPolicy::Forbidden)
    }
}

/// Metadata header of one stored secret.
///
/// The `id` is assigned by the card and only meaningful on that card; the
/// `fingerprint` is content-derived and identifies the same secret across
/// devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretHeader {
    /// Device-local identifier
    pub id: SecretId,
    /// User-assigned label
    pub label: String,
    /// Secret type
    pub kind: SecretKind,
    /// Type-specific subtype byte
    pub subtype: u8,
    /// Export policy
    pub export_policy: ExportPolicy,
    /// Content-derived identifier
    pub fingerprint: Fingerprint,
}

impl SecretHeader {
    pub fn new(
        id: SecretId,
        label: impl Into<String>,
        kind: SecretKind,
        subtype: u8,
        export_policy: ExportPolicy,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            kind,
            subtype,
            export_policy,
            fingerprint,
        }
    }
}

/// A secret exported from a card: its header plus a payload encrypted for
/// one specific recipient authentikey.
///
/// The ciphertext is opaque to the host. A secret produced for device B
/// cannot be imported by device C; the recipient binding is recorded so
/// the target card can reject a misdirected import.
#[derive(Debug, Clone)]
pub struct Secret {
    /// Header as it appeared on the exporting card
    pub header: SecretHeader,
    /// Payload encrypted under the recipient's authentikey
    pub ciphertext: Vec<u8>,
    /// Fingerprint of the authentikey this secret was encrypted for
    pub recipient_fingerprint: Fingerprint,
}
