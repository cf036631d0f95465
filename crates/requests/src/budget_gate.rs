//! Over-budget exception gate.
//!
//! Detects when a selected quotation's value exceeds the request's originally
//! declared amount. The check is strict: a request with zero (or absent)
//! declared amount is never flagged, so legacy/incomplete data cannot produce
//! false positives.

use serde::{Deserialize, Serialize};

use procureflow_core::{DomainResult, Money};

/// Outcome of comparing a selected quotation against the declared amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverBudgetCheck {
    pub is_over_budget: bool,
    /// Amount above the declared total, when over budget.
    pub over_amount: Option<Money>,
    /// Overshoot as a percentage of the declared amount (0.0 when within).
    pub over_percent: f64,
}

impl OverBudgetCheck {
    fn within() -> Self {
        Self {
            is_over_budget: false,
            over_amount: None,
            over_percent: 0.0,
        }
    }
}

/// Compare a selected quotation amount against the declared request amount.
pub fn check_over_budget(
    declared: Option<&Money>,
    selected: &Money,
) -> DomainResult<OverBudgetCheck> {
    let declared = match declared {
        Some(d) if d.is_positive() => d,
        // Zero or missing declared amount: never flagged.
        _ => return Ok(OverBudgetCheck::within()),
    };

    if selected.amount <= declared.amount && selected.currency == declared.currency {
        return Ok(OverBudgetCheck::within());
    }

    let over_amount = selected.sub(declared)?;
    if !over_amount.is_positive() {
        return Ok(OverBudgetCheck::within());
    }
    let over_percent = over_amount.percent_of(declared)?;

    Ok(OverBudgetCheck {
        is_over_budget: true,
        over_amount: Some(over_amount),
        over_percent,
    })
}
