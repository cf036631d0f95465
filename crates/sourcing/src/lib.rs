//! Sourcing domain module (RFQs, quotations, supplier recommendation).
//!
//! This crate contains business rules for buyer-run quotation rounds,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage).

pub mod quotation;
pub mod rfq;
pub mod scorer;

pub use quotation::{Quotation, QuotationId, QuotationStatus};
pub use rfq::{
    CloseRfq, MarkQuotationValid, OpenRfq, RecordQuotation, RejectQuotation, Rfq, RfqCommand,
    RfqEvent, RfqId, RfqStatus, SelectQuotation, SendRfq,
};
pub use scorer::{rank, Ranking, ScoreWeights, ScoredQuotation, ScoringConfig};
