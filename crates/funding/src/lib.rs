//! Funding domain module (Sales POs, payments, budget consumption).
//!
//! This crate contains business rules for funding sources, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage). "Actual cost"
//! of a funding source is always derived from DONE payments, never stored.

pub mod ledger;
pub mod payment;
pub mod sales_po;

pub use ledger::{
    compute_usage, BudgetLedger, BudgetUsage, PaymentQuery, UsageLevel, APPROACHING_PERCENT,
    CRITICAL_PERCENT, EXCEEDED_PERCENT,
};
pub use payment::{Payment, PaymentId, PaymentStatus};
pub use sales_po::{
    ActivateSalesPo, AmendSalesPoAmount, CloseSalesPo, RegisterSalesPo, SalesPo, SalesPoCommand,
    SalesPoEvent, SalesPoId, SalesPoStatus,
};
