//! Backup result log
//!
//! Per-secret outcomes collected while a backup runs, frozen into an
//! immutable report once the session reaches its result stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::SecretId;

/// Outcome of one secret's transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupOutcome {
    /// Secret landed on the backup card
    Success,
    /// Transfer failed; the message carries the underlying cause
    Error(String),
}

impl BackupOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, BackupOutcome::Error(_))
    }
}

/// One line of the backup report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupLogEntry {
    /// Secret id; the new id on the backup card for successes, the
    /// master-side id for failures that never produced one
    pub id: SecretId,
    /// Label of the secret
    pub label: String,
    /// What happened
    pub outcome: BackupOutcome,
}

impl BackupLogEntry {
    pub fn success(id: SecretId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            outcome: BackupOutcome::Success,
        }
    }

    pub fn error(id: SecretId, label: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            outcome: BackupOutcome::Error(message.into()),
        }
    }
}

/// Finished, immutable view of a completed backup run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupLog {
    /// Whether any entry failed
    pub has_error: bool,
    /// Per-secret outcomes in processing order
    pub entries: Vec<BackupLogEntry>,
    /// When the session left Idle
    pub started_at: DateTime<Utc>,
    /// When the last import attempt finished
    pub finished_at: DateTime<Utc>,
}

impl BackupLog {
    /// Number of failed entries
    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_error()).count()
    }

    /// Whether every attempted transfer succeeded
    pub fn is_clean(&self) -> bool {
        !self.has_error
    }

    /// One-line summary for the result screen
    pub fn summary(&self) -> String {
        if self.is_clean() {
            format!("backup completed: {} secret(s) transferred", self.entries.len())
        } else {
            format!(
                "backup completed with {} issue(s) out of {} secret(s)",
                self.error_count(),
                self.entries.len()
            )
        }
    }
}
