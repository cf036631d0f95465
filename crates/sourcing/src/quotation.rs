use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procureflow_core::{AggregateId, Entity, Money, SupplierId};

/// Quotation identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotationId(pub AggregateId);

impl QuotationId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for QuotationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Quotation status lifecycle.
///
/// Only `Valid` quotations are eligible for scoring and selection; at most
/// one quotation per RFQ may hold `Selected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotationStatus {
    Draft,
    Valid,
    Rejected,
    Selected,
}

/// A supplier's price/terms offer against an RFQ.
///
/// Effectively immutable after capture, except for the status flips the RFQ
/// aggregate permits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub supplier_id: SupplierId,
    pub amount: Money,
    /// Promised delivery lead time. Missing lead time is penalized by the
    /// scorer, not excluded.
    pub lead_time_days: Option<u32>,
    pub payment_terms: Option<String>,
    pub warranty: Option<String>,
    pub status: QuotationStatus,
    pub created_at: DateTime<Utc>,
}

impl Quotation {
    pub fn is_valid(&self) -> bool {
        self.status == QuotationStatus::Valid
    }

    pub fn is_selected(&self) -> bool {
        self.status == QuotationStatus::Selected
    }
}

impl Entity for Quotation {
    type Id = QuotationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
