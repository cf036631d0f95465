use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procureflow_core::{
    Aggregate, AggregateId, AggregateRoot, DocumentNumber, DomainError, Money, SupplierId, UserId,
};
use procureflow_events::Event;

use crate::quotation::{Quotation, QuotationId, QuotationStatus};

/// RFQ identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RfqId(pub AggregateId);

impl RfqId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for RfqId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// RFQ status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfqStatus {
    Draft,
    Sent,
    QuotationReceived,
    Closed,
}

/// Aggregate root: Rfq (one per buyer-request pairing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rfq {
    id: RfqId,
    number: Option<DocumentNumber>,
    /// The purchase request this RFQ sources for.
    request_id: Option<AggregateId>,
    buyer_id: Option<UserId>,
    status: RfqStatus,
    quotations: Vec<Quotation>,
    version: u64,
    created: bool,
}

impl Rfq {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: RfqId) -> Self {
        Self {
            id,
            number: None,
            request_id: None,
            buyer_id: None,
            status: RfqStatus::Draft,
            quotations: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RfqId {
        self.id
    }

    pub fn number(&self) -> Option<&DocumentNumber> {
        self.number.as_ref()
    }

    pub fn request_id(&self) -> Option<AggregateId> {
        self.request_id
    }

    pub fn buyer_id(&self) -> Option<UserId> {
        self.buyer_id
    }

    pub fn status(&self) -> RfqStatus {
        self.status
    }

    pub fn quotations(&self) -> &[Quotation] {
        &self.quotations
    }

    pub fn quotation(&self, id: QuotationId) -> Option<&Quotation> {
        self.quotations.iter().find(|q| q.id == id)
    }

    pub fn selected_quotation(&self) -> Option<&Quotation> {
        self.quotations.iter().find(|q| q.is_selected())
    }
}

impl AggregateRoot for Rfq {
    type Id = RfqId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenRfq.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRfq {
    pub rfq_id: RfqId,
    pub number: DocumentNumber,
    pub request_id: AggregateId,
    pub buyer_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SendRfq (suppliers are solicited outside the core).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRfq {
    pub rfq_id: RfqId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordQuotation (external capture of a supplier offer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQuotation {
    pub rfq_id: RfqId,
    pub quotation_id: QuotationId,
    pub supplier_id: SupplierId,
    pub amount: Money,
    pub lead_time_days: Option<u32>,
    pub payment_terms: Option<String>,
    pub warranty: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkQuotationValid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkQuotationValid {
    pub rfq_id: RfqId,
    pub quotation_id: QuotationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectQuotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectQuotation {
    pub rfq_id: RfqId,
    pub quotation_id: QuotationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SelectQuotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectQuotation {
    pub rfq_id: RfqId,
    pub quotation_id: QuotationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseRfq.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRfq {
    pub rfq_id: RfqId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RfqCommand {
    OpenRfq(OpenRfq),
    SendRfq(SendRfq),
    RecordQuotation(RecordQuotation),
    MarkQuotationValid(MarkQuotationValid),
    RejectQuotation(RejectQuotation),
    SelectQuotation(SelectQuotation),
    CloseRfq(CloseRfq),
}

impl RfqCommand {
    /// The RFQ this command targets.
    pub fn rfq_id(&self) -> RfqId {
        match self {
            RfqCommand::OpenRfq(c) => c.rfq_id,
            RfqCommand::SendRfq(c) => c.rfq_id,
            RfqCommand::RecordQuotation(c) => c.rfq_id,
            RfqCommand::MarkQuotationValid(c) => c.rfq_id,
            RfqCommand::RejectQuotation(c) => c.rfq_id,
            RfqCommand::SelectQuotation(c) => c.rfq_id,
            RfqCommand::CloseRfq(c) => c.rfq_id,
        }
    }
}

impl procureflow_events::Command for RfqCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        self.rfq_id().0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RfqEvent {
    RfqOpened {
        rfq_id: RfqId,
        number: DocumentNumber,
        request_id: AggregateId,
        buyer_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    RfqSent {
        rfq_id: RfqId,
        occurred_at: DateTime<Utc>,
    },
    QuotationRecorded {
        rfq_id: RfqId,
        quotation: Quotation,
        occurred_at: DateTime<Utc>,
    },
    QuotationMarkedValid {
        rfq_id: RfqId,
        quotation_id: QuotationId,
        occurred_at: DateTime<Utc>,
    },
    QuotationRejected {
        rfq_id: RfqId,
        quotation_id: QuotationId,
        occurred_at: DateTime<Utc>,
    },
    QuotationSelected {
        rfq_id: RfqId,
        quotation_id: QuotationId,
        supplier_id: SupplierId,
        amount: Money,
        occurred_at: DateTime<Utc>,
    },
    RfqClosed {
        rfq_id: RfqId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for RfqEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RfqEvent::RfqOpened { .. } => "sourcing.rfq.opened",
            RfqEvent::RfqSent { .. } => "sourcing.rfq.sent",
            RfqEvent::QuotationRecorded { .. } => "sourcing.rfq.quotation_recorded",
            RfqEvent::QuotationMarkedValid { .. } => "sourcing.rfq.quotation_marked_valid",
            RfqEvent::QuotationRejected { .. } => "sourcing.rfq.quotation_rejected",
            RfqEvent::QuotationSelected { .. } => "sourcing.rfq.quotation_selected",
            RfqEvent::RfqClosed { .. } => "sourcing.rfq.closed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RfqEvent::RfqOpened { occurred_at, .. }
            | RfqEvent::RfqSent { occurred_at, .. }
            | RfqEvent::QuotationRecorded { occurred_at, .. }
            | RfqEvent::QuotationMarkedValid { occurred_at, .. }
            | RfqEvent::QuotationRejected { occurred_at, .. }
            | RfqEvent::QuotationSelected { occurred_at, .. }
            | RfqEvent::RfqClosed { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Rfq {
    type Command = RfqCommand;
    type Event = RfqEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RfqEvent::RfqOpened {
                rfq_id,
                number,
                request_id,
                buyer_id,
                ..
            } => {
                self.id = *rfq_id;
                self.number = Some(number.clone());
                self.request_id = Some(*request_id);
                self.buyer_id = Some(*buyer_id);
                self.status = RfqStatus::Draft;
                self.quotations.clear();
                self.created = true;
            }
            RfqEvent::RfqSent { .. } => {
                self.status = RfqStatus::Sent;
            }
            RfqEvent::QuotationRecorded { quotation, .. } => {
                self.quotations.push(quotation.clone());
                self.status = RfqStatus::QuotationReceived;
            }
            RfqEvent::QuotationMarkedValid { quotation_id, .. } => {
                if let Some(q) = self.quotations.iter_mut().find(|q| q.id == *quotation_id) {
                    q.status = QuotationStatus::Valid;
                }
            }
            RfqEvent::QuotationRejected { quotation_id, .. } => {
                if let Some(q) = self.quotations.iter_mut().find(|q| q.id == *quotation_id) {
                    q.status = QuotationStatus::Rejected;
                }
            }
            RfqEvent::QuotationSelected { quotation_id, .. } => {
                if let Some(q) = self.quotations.iter_mut().find(|q| q.id == *quotation_id) {
                    q.status = QuotationStatus::Selected;
                }
            }
            RfqEvent::RfqClosed { .. } => {
                self.status = RfqStatus::Closed;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RfqCommand::OpenRfq(cmd) => self.handle_open(cmd),
            RfqCommand::SendRfq(cmd) => self.handle_send(cmd),
            RfqCommand::RecordQuotation(cmd) => self.handle_record(cmd),
            RfqCommand::MarkQuotationValid(cmd) => self.handle_mark_valid(cmd),
            RfqCommand::RejectQuotation(cmd) => self.handle_reject(cmd),
            RfqCommand::SelectQuotation(cmd) => self.handle_select(cmd),
            RfqCommand::CloseRfq(cmd) => self.handle_close(cmd),
        }
    }
}

impl Rfq {
    fn ensure_rfq_id(&self, rfq_id: RfqId) -> Result<(), DomainError> {
        if self.id != rfq_id {
            return Err(DomainError::invariant("rfq_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenRfq) -> Result<Vec<RfqEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("rfq already exists"));
        }

        Ok(vec![RfqEvent::RfqOpened {
            rfq_id: cmd.rfq_id,
            number: cmd.number.clone(),
            request_id: cmd.request_id,
            buyer_id: cmd.buyer_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_send(&self, cmd: &SendRfq) -> Result<Vec<RfqEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_rfq_id(cmd.rfq_id)?;

        if self.status != RfqStatus::Draft {
            return Err(DomainError::invariant("only draft rfqs can be sent"));
        }

        Ok(vec![RfqEvent::RfqSent {
            rfq_id: cmd.rfq_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_record(&self, cmd: &RecordQuotation) -> Result<Vec<RfqEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_rfq_id(cmd.rfq_id)?;

        if !matches!(self.status, RfqStatus::Sent | RfqStatus::QuotationReceived) {
            return Err(DomainError::invariant(
                "quotations can only be recorded on a sent rfq",
            ));
        }
        if !cmd.amount.is_positive() {
            return Err(DomainError::validation("quotation amount must be positive"));
        }
        if self.quotation(cmd.quotation_id).is_some() {
            return Err(DomainError::conflict("quotation already recorded"));
        }

        let quotation = Quotation {
            id: cmd.quotation_id,
            supplier_id: cmd.supplier_id,
            amount: cmd.amount.clone(),
            lead_time_days: cmd.lead_time_days,
            payment_terms: cmd.payment_terms.clone(),
            warranty: cmd.warranty.clone(),
            status: QuotationStatus::Draft,
            created_at: cmd.occurred_at,
        };

        Ok(vec![RfqEvent::QuotationRecorded {
            rfq_id: cmd.rfq_id,
            quotation,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_mark_valid(&self, cmd: &MarkQuotationValid) -> Result<Vec<RfqEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_rfq_id(cmd.rfq_id)?;

        let q = self.quotation(cmd.quotation_id).ok_or_else(|| {
            DomainError::data_integrity(format!(
                "quotation {} does not belong to rfq {}",
                cmd.quotation_id, self.id
            ))
        })?;

        if q.status != QuotationStatus::Draft {
            return Err(DomainError::invariant(
                "only draft quotations can be marked valid",
            ));
        }

        Ok(vec![RfqEvent::QuotationMarkedValid {
            rfq_id: cmd.rfq_id,
            quotation_id: cmd.quotation_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_reject(&self, cmd: &RejectQuotation) -> Result<Vec<RfqEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_rfq_id(cmd.rfq_id)?;

        let q = self.quotation(cmd.quotation_id).ok_or_else(|| {
            DomainError::data_integrity(format!(
                "quotation {} does not belong to rfq {}",
                cmd.quotation_id, self.id
            ))
        })?;

        if !matches!(q.status, QuotationStatus::Draft | QuotationStatus::Valid) {
            return Err(DomainError::invariant(
                "only draft or valid quotations can be rejected",
            ));
        }

        Ok(vec![RfqEvent::QuotationRejected {
            rfq_id: cmd.rfq_id,
            quotation_id: cmd.quotation_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_select(&self, cmd: &SelectQuotation) -> Result<Vec<RfqEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_rfq_id(cmd.rfq_id)?;

        if self.status != RfqStatus::QuotationReceived {
            return Err(DomainError::invariant(
                "selection requires an rfq with received quotations",
            ));
        }

        let q = self.quotation(cmd.quotation_id).ok_or_else(|| {
            DomainError::data_integrity(format!(
                "quotation {} does not belong to rfq {}",
                cmd.quotation_id, self.id
            ))
        })?;

        if !q.is_valid() {
            return Err(DomainError::invariant(
                "only valid quotations can be selected",
            ));
        }
        if self.selected_quotation().is_some() {
            return Err(DomainError::invariant(
                "an rfq may hold only one selected quotation",
            ));
        }

        Ok(vec![RfqEvent::QuotationSelected {
            rfq_id: cmd.rfq_id,
            quotation_id: cmd.quotation_id,
            supplier_id: q.supplier_id,
            amount: q.amount.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_close(&self, cmd: &CloseRfq) -> Result<Vec<RfqEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_rfq_id(cmd.rfq_id)?;

        if self.status == RfqStatus::Closed {
            return Err(DomainError::invariant("rfq is already closed"));
        }

        Ok(vec![RfqEvent::RfqClosed {
            rfq_id: cmd.rfq_id,
            occurred_at: cmd.occurred_at,
        }])
    }
}
