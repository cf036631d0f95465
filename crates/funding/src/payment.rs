use serde::{Deserialize, Serialize};

use procureflow_core::{AggregateId, Entity, Money};

/// Payment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub AggregateId);

impl PaymentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Payment status lifecycle.
///
/// Only `Done` payments count toward budget consumption; a pending or
/// cancelled payment must never inflate actual cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Done,
    Cancelled,
}

/// A payment against a purchase request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    /// The purchase request this payment settles.
    pub request_id: AggregateId,
    pub amount: Money,
    pub status: PaymentStatus,
}

impl Payment {
    pub fn is_done(&self) -> bool {
        self.status == PaymentStatus::Done
    }
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
