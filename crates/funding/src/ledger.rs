//! Budget consumption, derived from DONE payments.
//!
//! Pure aggregation, no side effects. The ledger never mutates anything; it
//! runs against a snapshot of payments, so it is safe to call concurrently
//! with payment updates (a payment marked DONE a moment after a read is
//! simply picked up by the next read).

use serde::{Deserialize, Serialize};

use procureflow_core::{DomainError, DomainResult, Money};

use crate::payment::Payment;
use crate::sales_po::{SalesPo, SalesPoId};

/// Usage at or above this percentage means the budget is exhausted.
pub const EXCEEDED_PERCENT: f64 = 100.0;
/// Usage at or above this percentage is critical.
pub const CRITICAL_PERCENT: f64 = 90.0;
/// Usage at or above this percentage is approaching the ceiling.
pub const APPROACHING_PERCENT: f64 = 80.0;

/// Warning level derived from usage percent.
///
/// The thresholds are policy constants above, not per-call-site numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageLevel {
    Normal,
    Approaching,
    Critical,
    Exceeded,
}

impl UsageLevel {
    pub fn for_percent(usage_percent: f64) -> Self {
        if usage_percent >= EXCEEDED_PERCENT {
            UsageLevel::Exceeded
        } else if usage_percent >= CRITICAL_PERCENT {
            UsageLevel::Critical
        } else if usage_percent >= APPROACHING_PERCENT {
            UsageLevel::Approaching
        } else {
            UsageLevel::Normal
        }
    }
}

/// Budget consumption snapshot for one funding source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetUsage {
    pub budget: Money,
    pub actual_cost: Money,
    pub remaining: Money,
    pub usage_percent: f64,
}

impl BudgetUsage {
    pub fn level(&self) -> UsageLevel {
        UsageLevel::for_percent(self.usage_percent)
    }
}

/// Compute consumed/remaining budget from a payment snapshot.
///
/// `actual_cost` sums only payments with status DONE; pending or cancelled
/// payments never inflate it. A zero budget yields 0% usage (never divides
/// by zero). A payment in a different currency than the budget is a
/// collaborator bug and fails loudly.
pub fn compute_usage(budget: &Money, payments: &[Payment]) -> DomainResult<BudgetUsage> {
    let mut total: i128 = 0;
    for p in payments {
        if !p.is_done() {
            continue;
        }
        if p.amount.currency != budget.currency {
            return Err(DomainError::data_integrity(format!(
                "payment {} is in {} but the funding source is in {}",
                p.id, p.amount.currency, budget.currency
            )));
        }
        total += p.amount.amount as i128;
    }

    let actual = i64::try_from(total)
        .map_err(|_| DomainError::validation("actual cost overflows amount range"))?;
    let actual_cost = Money::new(actual, budget.currency.clone());
    let remaining = budget.sub(&actual_cost)?;
    let usage_percent = actual_cost.percent_of(budget)?;

    Ok(BudgetUsage {
        budget: budget.clone(),
        actual_cost,
        remaining,
        usage_percent,
    })
}

/// Snapshot query for DONE payments per funding source.
///
/// Implementations must return a consistent snapshot (never rows mid-update)
/// covering payments of non-deleted purchase requests that reference the
/// funding source. Eventual consistency with concurrent payment updates is
/// acceptable.
pub trait PaymentQuery {
    fn done_payments(&self, funding_source: SalesPoId) -> DomainResult<Vec<Payment>>;
}

/// Budget ledger: composes a funding source with its payment snapshot.
#[derive(Debug)]
pub struct BudgetLedger<Q> {
    query: Q,
}

impl<Q: PaymentQuery> BudgetLedger<Q> {
    pub fn new(query: Q) -> Self {
        Self { query }
    }

    pub fn compute_usage(&self, po: &SalesPo) -> DomainResult<BudgetUsage> {
        let budget = po
            .budget()
            .ok_or_else(|| DomainError::data_integrity("sales po has no amount"))?;
        let payments = self.query.done_payments(po.id_typed())?;
        let usage = compute_usage(budget, &payments)?;

        tracing::debug!(
            po = %po.id_typed(),
            actual = usage.actual_cost.amount,
            percent = usage.usage_percent,
            "computed budget usage"
        );

        Ok(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::{PaymentId, PaymentStatus};
    use procureflow_core::{AggregateId, Currency};
    use proptest::prelude::*;

    fn payment(amount: i64, status: PaymentStatus) -> Payment {
        Payment {
            id: PaymentId::new(AggregateId::new()),
            request_id: AggregateId::new(),
            amount: Money::vnd(amount),
            status,
        }
    }

    #[test]
    fn sums_only_done_payments() {
        let budget = Money::vnd(100_000_000);
        let payments = vec![
            payment(30_000_000, PaymentStatus::Done),
            payment(20_000_000, PaymentStatus::Pending),
            payment(10_000_000, PaymentStatus::Done),
            payment(5_000_000, PaymentStatus::Cancelled),
        ];

        let usage = compute_usage(&budget, &payments).unwrap();
        assert_eq!(usage.actual_cost, Money::vnd(40_000_000));
        assert_eq!(usage.remaining, Money::vnd(60_000_000));
        assert!((usage.usage_percent - 40.0).abs() < 1e-9);
        assert_eq!(usage.level(), UsageLevel::Normal);
    }

    #[test]
    fn zero_budget_reports_zero_percent() {
        let budget = Money::vnd(0);
        let payments = vec![payment(1_000, PaymentStatus::Done)];

        let usage = compute_usage(&budget, &payments).unwrap();
        assert_eq!(usage.usage_percent, 0.0);
    }

    #[test]
    fn foreign_currency_payment_is_a_data_integrity_violation() {
        let budget = Money::vnd(100);
        let bad = Payment {
            id: PaymentId::new(AggregateId::new()),
            request_id: AggregateId::new(),
            amount: Money::new(1, Currency::USD),
            status: PaymentStatus::Done,
        };

        let err = compute_usage(&budget, &[bad]).unwrap_err();
        assert!(matches!(err, DomainError::DataIntegrity(_)));
    }

    #[test]
    fn threshold_levels() {
        assert_eq!(UsageLevel::for_percent(79.9), UsageLevel::Normal);
        assert_eq!(UsageLevel::for_percent(80.0), UsageLevel::Approaching);
        assert_eq!(UsageLevel::for_percent(90.0), UsageLevel::Critical);
        assert_eq!(UsageLevel::for_percent(100.0), UsageLevel::Exceeded);
        assert_eq!(UsageLevel::for_percent(130.0), UsageLevel::Exceeded);
    }

    proptest! {
        /// Property: actual cost equals the sum of DONE payment amounts and is
        /// invariant under adding any number of non-DONE payments.
        #[test]
        fn invariant_under_non_done_mutation(
            done in prop::collection::vec(1i64..10_000_000i64, 0..10),
            noise in prop::collection::vec(1i64..10_000_000i64, 0..10),
        ) {
            let budget = Money::vnd(1_000_000_000);

            let mut payments: Vec<Payment> =
                done.iter().map(|a| payment(*a, PaymentStatus::Done)).collect();
            let baseline = compute_usage(&budget, &payments).unwrap();

            prop_assert_eq!(baseline.actual_cost.amount, done.iter().sum::<i64>());

            for a in &noise {
                payments.push(payment(*a, PaymentStatus::Pending));
                payments.push(payment(*a, PaymentStatus::Cancelled));
            }
            let with_noise = compute_usage(&budget, &payments).unwrap();

            prop_assert_eq!(baseline, with_noise);
        }
    }
}
