//! Typed notification payloads for the delivery collaborator.
//!
//! Every cross-boundary notification is an explicit tagged structure rather
//! than an open-ended map, so consumers (real-time push, persisted inbox) can
//! be checked against this contract. The core guarantees each payload is
//! emitted exactly once per successful transition; delivery is the
//! collaborator's problem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use procureflow_core::{DomainError, DomainResult, Money, SupplierId, UserId};
use procureflow_events::EventEnvelope;
use procureflow_requests::{PrEvent, PrStatus, PurchaseRequestId};

/// Aggregate type under which purchase request streams are stored.
pub const PURCHASE_REQUEST_AGGREGATE: &str = "requests.purchase_request";

/// Notification payloads, discriminated by type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    PrStatusChanged {
        pr_id: PurchaseRequestId,
        from: PrStatus,
        to: PrStatus,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    PrAssigned {
        pr_id: PurchaseRequestId,
        buyer_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    SupplierSelected {
        pr_id: PurchaseRequestId,
        supplier_id: SupplierId,
        amount: Money,
        occurred_at: DateTime<Utc>,
    },
    BudgetExceptionRaised {
        pr_id: PurchaseRequestId,
        over_amount: Money,
        over_percent: f64,
        occurred_at: DateTime<Utc>,
    },
}

impl Notification {
    /// Decode a published envelope into a notification payload.
    ///
    /// Returns `Ok(None)` for envelopes that notify nobody (other aggregate
    /// types, bookkeeping events). An undecodable purchase request payload is
    /// a collaborator bug and fails loudly.
    pub fn from_envelope(env: &EventEnvelope<JsonValue>) -> DomainResult<Option<Notification>> {
        if env.aggregate_type() != PURCHASE_REQUEST_AGGREGATE {
            return Ok(None);
        }

        let event: PrEvent = serde_json::from_value(env.payload().clone()).map_err(|e| {
            DomainError::data_integrity(format!("undecodable purchase request event: {e}"))
        })?;

        Ok(match event {
            PrEvent::StatusChanged {
                pr_id,
                from,
                to,
                actor,
                occurred_at,
                ..
            } => Some(Notification::PrStatusChanged {
                pr_id,
                from,
                to,
                actor_id: actor.user_id,
                occurred_at,
            }),
            PrEvent::Assigned {
                pr_id,
                assignment,
                occurred_at,
            } => Some(Notification::PrAssigned {
                pr_id,
                buyer_id: assignment.buyer_id,
                occurred_at,
            }),
            PrEvent::SupplierSelected {
                pr_id,
                selection,
                occurred_at,
            } => Some(Notification::SupplierSelected {
                pr_id,
                supplier_id: selection.supplier_id,
                amount: selection.amount,
                occurred_at,
            }),
            PrEvent::BudgetExceptionRaised {
                pr_id,
                over_amount,
                over_percent,
                occurred_at,
                ..
            } => Some(Notification::BudgetExceptionRaised {
                pr_id,
                over_amount,
                over_percent,
                occurred_at,
            }),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use procureflow_auth::{Actor, Role};
    use procureflow_core::AggregateId;
    use uuid::Uuid;

    fn envelope(payload: &PrEvent, aggregate_type: &str) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            AggregateId::new(),
            aggregate_type,
            1,
            serde_json::to_value(payload).unwrap(),
        )
    }

    #[test]
    fn status_change_becomes_a_typed_notification() {
        let pr_id = PurchaseRequestId::new(AggregateId::new());
        let actor = Actor::new(UserId::new(), Role::requestor());
        let event = PrEvent::StatusChanged {
            pr_id,
            from: PrStatus::Draft,
            to: PrStatus::Submitted,
            action: procureflow_requests::PrAction::Submit,
            actor: actor.clone(),
            note: None,
            occurred_at: Utc::now(),
        };

        let decoded = Notification::from_envelope(&envelope(&event, PURCHASE_REQUEST_AGGREGATE))
            .unwrap()
            .unwrap();
        match decoded {
            Notification::PrStatusChanged {
                pr_id: id,
                from,
                to,
                actor_id,
                ..
            } => {
                assert_eq!(id, pr_id);
                assert_eq!(from, PrStatus::Draft);
                assert_eq!(to, PrStatus::Submitted);
                assert_eq!(actor_id, actor.user_id);
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[test]
    fn bookkeeping_events_notify_nobody() {
        let event = PrEvent::RequestDeleted {
            pr_id: PurchaseRequestId::new(AggregateId::new()),
            occurred_at: Utc::now(),
        };

        let decoded =
            Notification::from_envelope(&envelope(&event, PURCHASE_REQUEST_AGGREGATE)).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn foreign_aggregate_types_are_skipped() {
        let event = PrEvent::RequestDeleted {
            pr_id: PurchaseRequestId::new(AggregateId::new()),
            occurred_at: Utc::now(),
        };

        let decoded = Notification::from_envelope(&envelope(&event, "sourcing.rfq")).unwrap();
        assert!(decoded.is_none());
    }
}
