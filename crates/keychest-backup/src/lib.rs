//! KeyChest Backup - Card-to-card backup orchestration
//!
//! This crate drives a master security card and a backup card through
//! pairing, export, and import so that every secret on the master ends up
//! on the backup:
//! - `SecureCard` is the collaborator trait for the physical card
//! - `DeviceContext` caches one card's PIN, identity key, and catalog for
//!   the duration of a session
//! - `BackupSession` is the user-paced state machine that orchestrates
//!   the whole flow and produces a `BackupLog`
//! - `sim` provides an in-memory card for tests and integration work
//!
//! All card I/O is blocking and happens on the caller's thread; the
//! session only moves when the presentation layer calls `advance`.

pub mod card;
pub mod device;
pub mod error;
pub mod session;
pub mod sim;

pub use card::{CardError, SecureCard};
pub use device::{DeviceContext, DeviceRole, PinSource};
pub use error::{BackupError, Result};
pub use session::{BackupSession, Stage};
