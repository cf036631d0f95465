use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier used for workflow gating.
///
/// Roles are intentionally opaque strings at this layer; the transition table
/// matches them against its permitted-role sets. The constants below are the
/// roles the procurement workflow knows about, but nothing prevents a
/// deployment from introducing more.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

/// Submits purchase requests against a budget.
pub const REQUESTOR: &str = "requestor";
/// First approval stage.
pub const DEPARTMENT_HEAD: &str = "department_head";
/// Second approval stage.
pub const BRANCH_MANAGER: &str = "branch_manager";
/// Distributes line items to buyers and selects suppliers.
pub const BUYER_LEADER: &str = "buyer_leader";
/// Runs RFQs and collects quotations.
pub const BUYER: &str = "buyer";
/// Decides over-budget exceptions.
pub const EXECUTIVE_BOARD: &str = "executive_board";
/// Confirms payments.
pub const FINANCE: &str = "finance";
/// Automatic routing steps.
pub const SYSTEM: &str = "system";

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn requestor() -> Self {
        Self::new(REQUESTOR)
    }

    pub fn department_head() -> Self {
        Self::new(DEPARTMENT_HEAD)
    }

    pub fn branch_manager() -> Self {
        Self::new(BRANCH_MANAGER)
    }

    pub fn buyer_leader() -> Self {
        Self::new(BUYER_LEADER)
    }

    pub fn buyer() -> Self {
        Self::new(BUYER)
    }

    pub fn executive_board() -> Self {
        Self::new(EXECUTIVE_BOARD)
    }

    pub fn finance() -> Self {
        Self::new(FINANCE)
    }

    pub fn system() -> Self {
        Self::new(SYSTEM)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
