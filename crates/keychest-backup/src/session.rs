//! Backup session state machine
//!
//! The session advances one stage per explicit user action: pair the
//! master, pair the backup, export everything missing from the backup,
//! import it, show the result. Retryable failures (wrong PIN, wrong card,
//! communication loss) leave the stage unchanged so the user can correct
//! and try again; per-secret failures are folded into the log and never
//! stop the batch.
//!
//! Exports and imports are two separate phases: the whole pending set is
//! exported off the master before any import touches the backup, so a
//! card removal mid-export cannot leave a half-imported backup.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use keychest_core::{
    missing, BackupLog, BackupLogEntry, Secret, SecretHeader,
};

use crate::card::SecureCard;
use crate::device::{DeviceContext, DeviceRole, PinSource};
use crate::error::{BackupError, Result};

/// Session stage.
///
/// `Report` is terminal; cancellation returns to `Idle` from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Nothing in progress
    #[default]
    Idle,
    /// Waiting for the master card to be inserted and paired
    MasterPairing,
    /// Waiting for the backup card to be inserted and paired
    BackupPairing,
    /// Waiting for the master card to be re-inserted for export
    MasterExport,
    /// Waiting for the backup card to be re-inserted for import
    BackupImport,
    /// Backup finished; the log is available
    Report,
}

/// The card-to-card backup state machine.
///
/// Owns all session state (cached PINs included) and is the only holder;
/// dropping or cancelling it erases the PINs. Never persisted.
#[derive(Default)]
pub struct BackupSession {
    stage: Stage,
    master: Option<DeviceContext>,
    backup: Option<DeviceContext>,
    /// Headers still to transfer, in master catalog order
    pending: Vec<SecretHeader>,
    /// Secrets exported off the master, awaiting import
    exported: Vec<Secret>,
    entries: Vec<BackupLogEntry>,
    has_error: bool,
    started_at: Option<DateTime<Utc>>,
    log: Option<BackupLog>,
}

impl BackupSession {
    /// Create an idle session
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stage
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Which card the next `advance` expects in the slot, if any
    pub fn expected_device(&self) -> Option<DeviceRole> {
        match self.stage {
            Stage::MasterPairing | Stage::MasterExport => Some(DeviceRole::Master),
            Stage::BackupPairing | Stage::BackupImport => Some(DeviceRole::Backup),
            Stage::Idle | Stage::Report => None,
        }
    }

    /// Number of secrets still missing on the backup card
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// The finished report; only valid at `Report`
    pub fn log(&self) -> Result<&BackupLog> {
        match (&self.stage, &self.log) {
            (Stage::Report, Some(log)) => Ok(log),
            _ => Err(BackupError::InvalidStage { stage: self.stage }),
        }
    }

    /// Cancel the session, erasing all collected state (cached PINs are
    /// zeroed when the device contexts drop) and returning to idle
    pub fn cancel(&mut self) {
        info!(stage = ?self.stage, "backup session cancelled");
        self.reset();
    }

    /// Execute the current stage's exit action against the card in the
    /// slot.
    ///
    /// On a retryable error the stage is unchanged and the same action
    /// can be attempted again; otherwise the session moves to the next
    /// stage, which is returned.
    pub fn advance(
        &mut self,
        card: &mut dyn SecureCard,
        pins: &mut dyn PinSource,
    ) -> Result<Stage> {
        match self.stage {
            Stage::Idle => {
                self.reset();
                self.started_at = Some(Utc::now());
                self.stage = Stage::MasterPairing;
            }
            Stage::MasterPairing => {
                let ctx = DeviceContext::pair(card, pins, DeviceRole::Master)?;
                self.master = Some(ctx);
                self.stage = Stage::BackupPairing;
            }
            Stage::BackupPairing => self.pair_backup(card, pins)?,
            Stage::MasterExport => self.export_batch(card)?,
            Stage::BackupImport => self.import_batch(card)?,
            Stage::Report => {
                // User acknowledged the result screen
                self.reset();
            }
        }
        info!(stage = ?self.stage, "session advanced");
        Ok(self.stage)
    }

    /// Pair the backup card, reject same-device pairing, and work out
    /// what needs transferring
    fn pair_backup(&mut self, card: &mut dyn SecureCard, pins: &mut dyn PinSource) -> Result<()> {
        let master = self
            .master
            .as_ref()
            .ok_or(BackupError::InvalidStage { stage: self.stage })?;
        let master_key = master.authentikey().clone();

        let mut ctx = DeviceContext::pair(card, pins, DeviceRole::Backup)?;
        if ctx.authentikey() == &master_key {
            warn!("backup pairing presented the master card");
            return Err(BackupError::SameDevice);
        }

        let mut pending = missing(master.catalog(), ctx.catalog());
        // The backup's own identity key may sit in the master's catalog
        // from an earlier pairing; sending it back would duplicate it
        // forever and break re-runnability
        let backup_fp = ctx.authentikey().fingerprint;
        pending.retain(|h| h.fingerprint != backup_fp);

        ctx.ensure_counterpart_key_registered(card, &master_key)?;

        info!(
            pending = pending.len(),
            master_secrets = master.catalog().len(),
            backup_secrets = ctx.catalog().len(),
            "backup card paired"
        );
        self.pending = pending;
        self.backup = Some(ctx);
        self.stage = Stage::MasterExport;
        Ok(())
    }

    /// Re-verify the master and export every pending secret.
    ///
    /// Step-level failures (PIN, card swap, registering the recipient
    /// key) are retryable; once the batch starts, failures are per-item.
    fn export_batch(&mut self, card: &mut dyn SecureCard) -> Result<()> {
        let backup_key = self
            .backup
            .as_ref()
            .ok_or(BackupError::InvalidStage { stage: self.stage })?
            .authentikey()
            .clone();
        let master = self
            .master
            .as_mut()
            .ok_or(BackupError::InvalidStage { stage: self.stage })?;

        master.reauthenticate(card)?;
        let recipient = master.ensure_counterpart_key_registered(card, &backup_key)?;

        let batch: Vec<SecretHeader> = self.pending.clone();
        for header in batch {
            debug!(id = %header.id, kind = %header.kind, "exporting secret");
            match card.export_secret(header.id, recipient) {
                Ok(secret) => self.exported.push(secret),
                Err(e) => {
                    warn!(id = %header.id, label = %header.label, error = %e, "export failed");
                    self.has_error = true;
                    self.entries
                        .push(BackupLogEntry::error(header.id, &header.label, e.to_string()));
                }
            }
        }

        info!(
            exported = self.exported.len(),
            failed = self.entries.len(),
            "export batch finished"
        );
        self.stage = Stage::BackupImport;
        Ok(())
    }

    /// Re-verify the backup and import every exported secret, checking
    /// content fingerprints along the way
    fn import_batch(&mut self, card: &mut dyn SecureCard) -> Result<()> {
        let backup = self
            .backup
            .as_ref()
            .ok_or(BackupError::InvalidStage { stage: self.stage })?;

        backup.reauthenticate(card)?;
        let recipient = backup
            .counterpart_key_id()
            .ok_or(BackupError::InvalidStage { stage: self.stage })?;

        let batch: Vec<Secret> = std::mem::take(&mut self.exported);
        for secret in &batch {
            let header = &secret.header;
            debug!(id = %header.id, kind = %header.kind, "importing secret");
            match card.import_secret(secret, recipient) {
                Ok((new_id, fingerprint)) => {
                    if fingerprint == header.fingerprint {
                        self.entries
                            .push(BackupLogEntry::success(new_id, &header.label));
                    } else {
                        // Content changed between export and import
                        warn!(
                            id = %header.id,
                            expected = %header.fingerprint,
                            imported = %fingerprint,
                            "fingerprint mismatch after import"
                        );
                        self.has_error = true;
                        self.entries.push(BackupLogEntry::error(
                            new_id,
                            &header.label,
                            format!(
                                "fingerprint mismatch after import: expected {}, card reported {}",
                                header.fingerprint, fingerprint
                            ),
                        ));
                    }
                }
                Err(e) => {
                    warn!(id = %header.id, label = %header.label, error = %e, "import failed");
                    self.has_error = true;
                    self.entries
                        .push(BackupLogEntry::error(header.id, &header.label, e.to_string()));
                }
            }
        }

        let started_at = self.started_at.unwrap_or_else(Utc::now);
        let log = BackupLog {
            has_error: self.has_error,
            entries: std::mem::take(&mut self.entries),
            started_at,
            finished_at: Utc::now(),
        };
        info!(summary = %log.summary(), "backup finished");

        // Contexts are no longer needed; dropping them zeroes the PINs
        self.master = None;
        self.backup = None;
        self.pending.clear();
        self.log = Some(log);
        self.stage = Stage::Report;
        Ok(())
    }

    fn reset(&mut self) {
        // Dropping the contexts zeroes the cached PINs
        *self = Self::default();
    }
}
