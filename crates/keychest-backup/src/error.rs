//! Error types for backup orchestration

use thiserror::Error;

use crate::card::CardError;
use crate::device::DeviceRole;
use crate::session::Stage;

/// Result type alias for backup operations
pub type Result<T> = std::result::Result<T, BackupError>;

/// Errors surfaced to the presentation layer.
///
/// Everything here is recoverable by retrying the current stage; per-item
/// export/import failures never appear as errors, they are folded into
/// the backup log instead.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The card rejected the presented PIN
    #[error("{role} card rejected the PIN ({retries_left} tries left)")]
    PinRejected { role: DeviceRole, retries_left: u8 },

    /// The card refuses further PIN attempts
    #[error("{role} card PIN is blocked")]
    PinLocked { role: DeviceRole },

    /// The user dismissed the PIN prompt
    #[error("PIN entry cancelled")]
    PinCancelled,

    /// The backup card presented the master's identity key
    #[error("backup card is the same device as the master")]
    SameDevice,

    /// The inserted card is not the one paired earlier in the session
    #[error("inserted card is not the paired {role} device")]
    WrongDevice { role: DeviceRole },

    /// Transport-level failure talking to the card
    #[error("card communication failed: {0}")]
    Communication(String),

    /// The card has no identity key
    #[error("card has no seed; cannot pair")]
    UninitializedSeed,

    /// The requested operation is not valid at the session's stage
    #[error("operation not valid at stage {stage:?}")]
    InvalidStage { stage: Stage },

    /// Any other card error during a step-level operation
    #[error("card error: {0}")]
    Card(#[from] CardError),
}

impl BackupError {
    /// Translate a card error raised during a step-level operation on the
    /// device with the given role
    pub(crate) fn from_card(role: DeviceRole, err: CardError) -> Self {
        match err {
            CardError::PinRejected { retries_left } => {
                BackupError::PinRejected { role, retries_left }
            }
            CardError::PinLocked => BackupError::PinLocked { role },
            CardError::UninitializedSeed => BackupError::UninitializedSeed,
            CardError::Communication(msg) => BackupError::Communication(msg),
            other => BackupError::Card(other),
        }
    }
}
