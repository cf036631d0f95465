//! Purchase request status machine.
//!
//! The transition table below is the single source of truth for the workflow:
//! a transition is legal only if `(from, action)` maps to an entry AND the
//! acting role is in that entry's permitted set. Nothing else in the codebase
//! decides status changes.

use serde::{Deserialize, Serialize};

use procureflow_auth::{role, Role};
use procureflow_core::{DomainError, DomainResult};

/// Purchase request workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrStatus {
    Draft,
    Submitted,
    DeptHeadPending,
    DeptHeadApproved,
    BranchManagerPending,
    BranchManagerApproved,
    AssignedToBuyer,
    RfqInProgress,
    QuotationReceived,
    SupplierSelected,
    BudgetException,
    BudgetApproved,
    BudgetRejected,
    PaymentDone,
    NeedMoreInfo,
    Cancelled,
}

impl PrStatus {
    /// Terminal statuses admit no further workflow transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, PrStatus::PaymentDone | PrStatus::Cancelled)
    }
}

/// Workflow action attempted by an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrAction {
    Submit,
    Route,
    Approve,
    ReturnForInfo,
    Resubmit,
    Assign,
    StartRfq,
    RecordQuotations,
    SelectSupplier,
    RaiseBudgetException,
    ApproveBudget,
    RejectBudget,
    ReopenSelection,
    MarkPaymentDone,
    Cancel,
}

/// One legal edge of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub from: PrStatus,
    pub action: PrAction,
    pub to: PrStatus,
    pub permitted_roles: &'static [&'static str],
}

const fn rule(
    from: PrStatus,
    action: PrAction,
    to: PrStatus,
    permitted_roles: &'static [&'static str],
) -> TransitionRule {
    TransitionRule {
        from,
        action,
        to,
        permitted_roles,
    }
}

/// Roles allowed to cancel an in-flight request.
const CANCELLERS: &[&str] = &[role::REQUESTOR, role::BRANCH_MANAGER];

/// The workflow transition table.
///
/// Cancellation edges exist for every status prior to supplier selection;
/// their absence after selection is what makes late cancellation illegal.
pub const TRANSITIONS: &[TransitionRule] = &[
    rule(
        PrStatus::Draft,
        PrAction::Submit,
        PrStatus::Submitted,
        &[role::REQUESTOR],
    ),
    rule(
        PrStatus::Submitted,
        PrAction::Route,
        PrStatus::DeptHeadPending,
        &[role::SYSTEM],
    ),
    rule(
        PrStatus::DeptHeadPending,
        PrAction::Approve,
        PrStatus::DeptHeadApproved,
        &[role::DEPARTMENT_HEAD],
    ),
    rule(
        PrStatus::DeptHeadPending,
        PrAction::ReturnForInfo,
        PrStatus::NeedMoreInfo,
        &[role::DEPARTMENT_HEAD],
    ),
    rule(
        PrStatus::DeptHeadApproved,
        PrAction::Route,
        PrStatus::BranchManagerPending,
        &[role::SYSTEM],
    ),
    rule(
        PrStatus::BranchManagerPending,
        PrAction::Approve,
        PrStatus::BranchManagerApproved,
        &[role::BRANCH_MANAGER],
    ),
    rule(
        PrStatus::BranchManagerPending,
        PrAction::ReturnForInfo,
        PrStatus::NeedMoreInfo,
        &[role::BRANCH_MANAGER],
    ),
    rule(
        PrStatus::NeedMoreInfo,
        PrAction::Resubmit,
        PrStatus::Submitted,
        &[role::REQUESTOR],
    ),
    rule(
        PrStatus::BranchManagerApproved,
        PrAction::Assign,
        PrStatus::AssignedToBuyer,
        &[role::BUYER_LEADER],
    ),
    rule(
        PrStatus::AssignedToBuyer,
        PrAction::StartRfq,
        PrStatus::RfqInProgress,
        &[role::BUYER],
    ),
    rule(
        PrStatus::RfqInProgress,
        PrAction::RecordQuotations,
        PrStatus::QuotationReceived,
        &[role::BUYER],
    ),
    rule(
        PrStatus::QuotationReceived,
        PrAction::SelectSupplier,
        PrStatus::SupplierSelected,
        &[role::BUYER_LEADER],
    ),
    rule(
        PrStatus::QuotationReceived,
        PrAction::RaiseBudgetException,
        PrStatus::BudgetException,
        &[role::BUYER_LEADER],
    ),
    rule(
        PrStatus::BudgetException,
        PrAction::ApproveBudget,
        PrStatus::BudgetApproved,
        &[role::EXECUTIVE_BOARD],
    ),
    rule(
        PrStatus::BudgetException,
        PrAction::RejectBudget,
        PrStatus::BudgetRejected,
        &[role::EXECUTIVE_BOARD],
    ),
    rule(
        PrStatus::BudgetRejected,
        PrAction::ReopenSelection,
        PrStatus::QuotationReceived,
        &[role::BUYER_LEADER],
    ),
    rule(
        PrStatus::SupplierSelected,
        PrAction::MarkPaymentDone,
        PrStatus::PaymentDone,
        &[role::FINANCE],
    ),
    rule(
        PrStatus::BudgetApproved,
        PrAction::MarkPaymentDone,
        PrStatus::PaymentDone,
        &[role::FINANCE],
    ),
    rule(PrStatus::Draft, PrAction::Cancel, PrStatus::Cancelled, CANCELLERS),
    rule(
        PrStatus::Submitted,
        PrAction::Cancel,
        PrStatus::Cancelled,
        CANCELLERS,
    ),
    rule(
        PrStatus::DeptHeadPending,
        PrAction::Cancel,
        PrStatus::Cancelled,
        CANCELLERS,
    ),
    rule(
        PrStatus::DeptHeadApproved,
        PrAction::Cancel,
        PrStatus::Cancelled,
        CANCELLERS,
    ),
    rule(
        PrStatus::BranchManagerPending,
        PrAction::Cancel,
        PrStatus::Cancelled,
        CANCELLERS,
    ),
    rule(
        PrStatus::BranchManagerApproved,
        PrAction::Cancel,
        PrStatus::Cancelled,
        CANCELLERS,
    ),
    rule(
        PrStatus::AssignedToBuyer,
        PrAction::Cancel,
        PrStatus::Cancelled,
        CANCELLERS,
    ),
    rule(
        PrStatus::RfqInProgress,
        PrAction::Cancel,
        PrStatus::Cancelled,
        CANCELLERS,
    ),
    rule(
        PrStatus::QuotationReceived,
        PrAction::Cancel,
        PrStatus::Cancelled,
        CANCELLERS,
    ),
    rule(
        PrStatus::NeedMoreInfo,
        PrAction::Cancel,
        PrStatus::Cancelled,
        CANCELLERS,
    ),
];

/// Resolve the next status for `(from, action)` if the acting role may take
/// that edge. Errors are surfaced verbatim; no silent coercion.
pub fn transition(from: PrStatus, action: PrAction, role: &Role) -> DomainResult<PrStatus> {
    let rule = TRANSITIONS
        .iter()
        .find(|r| r.from == from && r.action == action)
        .ok_or_else(|| {
            DomainError::invalid_transition(format!(
                "action {action:?} is not allowed from status {from:?}"
            ))
        })?;

    if !rule.permitted_roles.contains(&role.as_str()) {
        return Err(DomainError::invalid_transition(format!(
            "role '{role}' may not perform {action:?} from status {from:?}"
        )));
    }

    Ok(rule.to)
}
