//! Year-scoped sequential document numbering.
//!
//! The numbering collaborator guarantees unique, monotonically assigned
//! numbers per document kind and year. Gap-filling (reusing a skipped
//! sequence) is a collaborator policy decision and is not implemented here.

use std::collections::HashMap;
use std::sync::Mutex;

use procureflow_core::{DocumentNumber, DomainError, DomainResult};

/// Document families with their own sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    PurchaseRequest,
    Rfq,
    SalesPo,
}

impl DocumentKind {
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentKind::PurchaseRequest => "PR",
            DocumentKind::Rfq => "RFQ",
            DocumentKind::SalesPo => "SPO",
        }
    }
}

/// Allocates the next human-readable number for a document.
pub trait NumberAllocator: Send + Sync {
    fn next_number(&self, kind: DocumentKind, year: i32) -> DomainResult<DocumentNumber>;
}

/// In-memory allocator for tests/dev; sequences restart per process.
#[derive(Debug, Default)]
pub struct InMemoryNumberAllocator {
    counters: Mutex<HashMap<(DocumentKind, i32), u32>>,
}

impl InMemoryNumberAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NumberAllocator for InMemoryNumberAllocator {
    fn next_number(&self, kind: DocumentKind, year: i32) -> DomainResult<DocumentNumber> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| DomainError::conflict("numbering lock poisoned"))?;

        let counter = counters.entry((kind, year)).or_insert(0);
        *counter = counter
            .checked_add(1)
            .ok_or_else(|| DomainError::validation("document sequence exhausted"))?;

        DocumentNumber::format(kind.prefix(), year, *counter)
    }
}
