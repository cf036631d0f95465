//! Human-readable document numbers.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Sequential, year-scoped document number (e.g. "PR-2026-0042").
///
/// The numbering collaborator guarantees uniqueness and monotonic assignment;
/// gap-filling is collaborator policy and is not assumed here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentNumber(String);

impl ValueObject for DocumentNumber {}

impl DocumentNumber {
    /// Build a number from prefix, year and sequence (zero-padded to 4).
    pub fn format(prefix: &str, year: i32, sequence: u32) -> DomainResult<Self> {
        if prefix.is_empty() {
            return Err(DomainError::validation("document number prefix is empty"));
        }
        if sequence == 0 {
            return Err(DomainError::validation("document sequence starts at 1"));
        }
        Ok(Self(format!("{prefix}-{year}-{sequence:04}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_zero_padded() {
        let n = DocumentNumber::format("PR", 2026, 42).unwrap();
        assert_eq!(n.as_str(), "PR-2026-0042");
    }

    #[test]
    fn rejects_zero_sequence() {
        assert!(DocumentNumber::format("PR", 2026, 0).is_err());
    }
}
