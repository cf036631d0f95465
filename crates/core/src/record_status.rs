//! Explicit record lifecycle for soft deletion.

use serde::{Deserialize, Serialize};

/// Whether an entity is live or soft-deleted.
///
/// Records are never physically deleted (audit history is preserved); every
/// query over a collection of records must filter on this status explicitly
/// rather than assuming a collaborator already did so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Deleted,
}

impl RecordStatus {
    pub fn is_active(self) -> bool {
        matches!(self, RecordStatus::Active)
    }
}

impl Default for RecordStatus {
    fn default() -> Self {
        RecordStatus::Active
    }
}
