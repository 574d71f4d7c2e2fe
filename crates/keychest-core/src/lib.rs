//! KeyChest Core - Shared types and pure logic for card-to-card backup
//!
//! This crate provides the data model for secrets stored on a hardware
//! security card (headers, catalogs, fingerprints) together with the pure
//! computations the backup orchestration is built on: fingerprint-keyed
//! catalog set-difference and the backup result log. No I/O happens here.

pub mod catalog;
pub mod log;
pub mod pairing;
pub mod secret;
pub mod types;

pub use catalog::SecretCatalog;
pub use log::{BackupLog, BackupLogEntry, BackupOutcome};
pub use pairing::{find_by_fingerprint, find_pubkey_by_fingerprint, missing};
pub use secret::{ExportPolicy, Secret, SecretHeader, SecretKind};
pub use types::{Authentikey, Fingerprint, SecretId};

/// Size of a secret fingerprint in bytes
pub const FINGERPRINT_SIZE: usize = 4;

/// Maximum label length accepted by a card, in bytes
pub const MAX_LABEL_SIZE: usize = 127;

/// Typical upper bound on secrets held by one card; catalogs stay small
/// enough that linear scans are fine
pub const MAX_CARD_SECRETS: usize = 256;
