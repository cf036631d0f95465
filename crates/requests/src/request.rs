use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procureflow_auth::{role, Actor};
use procureflow_core::{
    Aggregate, AggregateId, AggregateRoot, DepartmentId, DocumentNumber, DomainError, Money,
    RecordStatus, SupplierId, UserId,
};
use procureflow_events::Event;
use procureflow_funding::SalesPoId;
use procureflow_sourcing::{QuotationId, RfqId};

use crate::assignment::{
    coverage, ensure_complete, validate_new_assignment, Assignment, AssignmentId, AssignmentScope,
    Coverage,
};
use crate::budget_gate::{check_over_budget, OverBudgetCheck};
use crate::item::{ItemOrigin, LineItem};
use crate::status::{transition, PrAction, PrStatus};

/// Purchase request identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseRequestId(pub AggregateId);

impl PurchaseRequestId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseRequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Record of the chosen quotation for a request.
///
/// Creation is a terminal, audit-significant event; the record is immutable
/// once written (a rejected budget exception clears it via reopening, never
/// edits it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierSelection {
    pub rfq_id: RfqId,
    pub quotation_id: QuotationId,
    pub supplier_id: SupplierId,
    pub amount: Money,
    pub justification: Option<String>,
    /// Present when the selection exceeded the declared amount.
    pub over_budget: Option<OverBudgetCheck>,
}

/// Aggregate root: PurchaseRequest.
///
/// The request's status and its assignment set are the only mutable shared
/// state of the workflow; both are mutated exclusively through this
/// aggregate's commands, so concurrent transition attempts on one request
/// serialize on its event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseRequest {
    id: PurchaseRequestId,
    number: Option<DocumentNumber>,
    department: Option<DepartmentId>,
    requestor: Option<UserId>,
    declared_amount: Option<Money>,
    funding_source: Option<SalesPoId>,
    status: PrStatus,
    items: Vec<LineItem>,
    assignments: Vec<Assignment>,
    selection: Option<SupplierSelection>,
    return_count: u32,
    next_line_no: u32,
    record_status: RecordStatus,
    version: u64,
    created: bool,
}

impl PurchaseRequest {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseRequestId) -> Self {
        Self {
            id,
            number: None,
            department: None,
            requestor: None,
            declared_amount: None,
            funding_source: None,
            status: PrStatus::Draft,
            items: Vec::new(),
            assignments: Vec::new(),
            selection: None,
            return_count: 0,
            next_line_no: 1,
            record_status: RecordStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseRequestId {
        self.id
    }

    pub fn number(&self) -> Option<&DocumentNumber> {
        self.number.as_ref()
    }

    pub fn department(&self) -> Option<DepartmentId> {
        self.department
    }

    pub fn requestor(&self) -> Option<UserId> {
        self.requestor
    }

    pub fn declared_amount(&self) -> Option<&Money> {
        self.declared_amount.as_ref()
    }

    pub fn funding_source(&self) -> Option<SalesPoId> {
        self.funding_source
    }

    pub fn status(&self) -> PrStatus {
        self.status
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn selection(&self) -> Option<&SupplierSelection> {
        self.selection.as_ref()
    }

    /// How many times the request was returned for more information.
    pub fn return_count(&self) -> u32 {
        self.return_count
    }

    pub fn record_status(&self) -> RecordStatus {
        self.record_status
    }

    /// Current assignment coverage of the request's items.
    pub fn coverage_report(&self) -> Result<Coverage, DomainError> {
        coverage(&self.items, &self.assignments)
    }
}

impl AggregateRoot for PurchaseRequest {
    type Id = PurchaseRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateRequest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub pr_id: PurchaseRequestId,
    pub number: DocumentNumber,
    pub department: DepartmentId,
    pub declared_amount: Money,
    pub funding_source: Option<SalesPoId>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddItem (draft or returned-for-info only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddItem {
    pub pr_id: PurchaseRequestId,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub manufacturer: Option<String>,
    pub origin: ItemOrigin,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveItem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub pr_id: PurchaseRequestId,
    pub line_no: u32,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitRequest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub pr_id: PurchaseRequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RouteRequest (automatic routing to the next approver).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub pr_id: PurchaseRequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveStage (department head or branch manager, per status).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproveStage {
    pub pr_id: PurchaseRequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReturnForInfo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnForInfo {
    pub pr_id: PurchaseRequestId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResubmitRequest (back to Submitted, not Draft).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResubmitRequest {
    pub pr_id: PurchaseRequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignBuyer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignBuyer {
    pub pr_id: PurchaseRequestId,
    pub assignment_id: AssignmentId,
    pub buyer_id: UserId,
    pub scope: AssignmentScope,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RevokeAssignment (soft-deletes one assignment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevokeAssignment {
    pub pr_id: PurchaseRequestId,
    pub assignment_id: AssignmentId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartRfq (requires complete assignment coverage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRfq {
    pub pr_id: PurchaseRequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordQuotationsReceived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordQuotationsReceived {
    pub pr_id: PurchaseRequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SelectSupplier.
///
/// The over-budget gate runs here: an over-budget selection without a
/// non-empty justification is rejected, and an accepted one lands the
/// request in the budget-exception branch instead of SupplierSelected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectSupplier {
    pub pr_id: PurchaseRequestId,
    pub rfq_id: RfqId,
    pub quotation_id: QuotationId,
    pub supplier_id: SupplierId,
    pub amount: Money,
    pub justification: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveBudgetException.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproveBudgetException {
    pub pr_id: PurchaseRequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectBudgetException.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectBudgetException {
    pub pr_id: PurchaseRequestId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReopenSelection (after a rejected budget exception).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReopenSelection {
    pub pr_id: PurchaseRequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkPaymentDone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkPaymentDone {
    pub pr_id: PurchaseRequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelRequest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub pr_id: PurchaseRequestId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteRequest (soft delete; audit history is preserved).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub pr_id: PurchaseRequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrCommand {
    CreateRequest(CreateRequest),
    AddItem(AddItem),
    RemoveItem(RemoveItem),
    SubmitRequest(SubmitRequest),
    RouteRequest(RouteRequest),
    ApproveStage(ApproveStage),
    ReturnForInfo(ReturnForInfo),
    ResubmitRequest(ResubmitRequest),
    AssignBuyer(AssignBuyer),
    RevokeAssignment(RevokeAssignment),
    StartRfq(StartRfq),
    RecordQuotationsReceived(RecordQuotationsReceived),
    SelectSupplier(SelectSupplier),
    ApproveBudgetException(ApproveBudgetException),
    RejectBudgetException(RejectBudgetException),
    ReopenSelection(ReopenSelection),
    MarkPaymentDone(MarkPaymentDone),
    CancelRequest(CancelRequest),
    DeleteRequest(DeleteRequest),
}

impl PrCommand {
    /// The request this command targets.
    pub fn pr_id(&self) -> PurchaseRequestId {
        match self {
            PrCommand::CreateRequest(c) => c.pr_id,
            PrCommand::AddItem(c) => c.pr_id,
            PrCommand::RemoveItem(c) => c.pr_id,
            PrCommand::SubmitRequest(c) => c.pr_id,
            PrCommand::RouteRequest(c) => c.pr_id,
            PrCommand::ApproveStage(c) => c.pr_id,
            PrCommand::ReturnForInfo(c) => c.pr_id,
            PrCommand::ResubmitRequest(c) => c.pr_id,
            PrCommand::AssignBuyer(c) => c.pr_id,
            PrCommand::RevokeAssignment(c) => c.pr_id,
            PrCommand::StartRfq(c) => c.pr_id,
            PrCommand::RecordQuotationsReceived(c) => c.pr_id,
            PrCommand::SelectSupplier(c) => c.pr_id,
            PrCommand::ApproveBudgetException(c) => c.pr_id,
            PrCommand::RejectBudgetException(c) => c.pr_id,
            PrCommand::ReopenSelection(c) => c.pr_id,
            PrCommand::MarkPaymentDone(c) => c.pr_id,
            PrCommand::CancelRequest(c) => c.pr_id,
            PrCommand::DeleteRequest(c) => c.pr_id,
        }
    }
}

impl procureflow_events::Command for PrCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        self.pr_id().0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrEvent {
    RequestCreated {
        pr_id: PurchaseRequestId,
        number: DocumentNumber,
        department: DepartmentId,
        requestor: UserId,
        declared_amount: Money,
        funding_source: Option<SalesPoId>,
        occurred_at: DateTime<Utc>,
    },
    ItemAdded {
        pr_id: PurchaseRequestId,
        item: LineItem,
        occurred_at: DateTime<Utc>,
    },
    ItemRemoved {
        pr_id: PurchaseRequestId,
        line_no: u32,
        occurred_at: DateTime<Utc>,
    },
    /// Emitted exactly once per successful status transition.
    StatusChanged {
        pr_id: PurchaseRequestId,
        from: PrStatus,
        to: PrStatus,
        action: PrAction,
        actor: Actor,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    Assigned {
        pr_id: PurchaseRequestId,
        assignment: Assignment,
        occurred_at: DateTime<Utc>,
    },
    AssignmentRevoked {
        pr_id: PurchaseRequestId,
        assignment_id: AssignmentId,
        occurred_at: DateTime<Utc>,
    },
    SupplierSelected {
        pr_id: PurchaseRequestId,
        selection: SupplierSelection,
        occurred_at: DateTime<Utc>,
    },
    BudgetExceptionRaised {
        pr_id: PurchaseRequestId,
        declared_amount: Money,
        selected_amount: Money,
        over_amount: Money,
        over_percent: f64,
        occurred_at: DateTime<Utc>,
    },
    RequestDeleted {
        pr_id: PurchaseRequestId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for PrEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PrEvent::RequestCreated { .. } => "requests.pr.created",
            PrEvent::ItemAdded { .. } => "requests.pr.item_added",
            PrEvent::ItemRemoved { .. } => "requests.pr.item_removed",
            PrEvent::StatusChanged { .. } => "requests.pr.status_changed",
            PrEvent::Assigned { .. } => "requests.pr.assigned",
            PrEvent::AssignmentRevoked { .. } => "requests.pr.assignment_revoked",
            PrEvent::SupplierSelected { .. } => "requests.pr.supplier_selected",
            PrEvent::BudgetExceptionRaised { .. } => "requests.pr.budget_exception_raised",
            PrEvent::RequestDeleted { .. } => "requests.pr.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PrEvent::RequestCreated { occurred_at, .. }
            | PrEvent::ItemAdded { occurred_at, .. }
            | PrEvent::ItemRemoved { occurred_at, .. }
            | PrEvent::StatusChanged { occurred_at, .. }
            | PrEvent::Assigned { occurred_at, .. }
            | PrEvent::AssignmentRevoked { occurred_at, .. }
            | PrEvent::SupplierSelected { occurred_at, .. }
            | PrEvent::BudgetExceptionRaised { occurred_at, .. }
            | PrEvent::RequestDeleted { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for PurchaseRequest {
    type Command = PrCommand;
    type Event = PrEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PrEvent::RequestCreated {
                pr_id,
                number,
                department,
                requestor,
                declared_amount,
                funding_source,
                ..
            } => {
                self.id = *pr_id;
                self.number = Some(number.clone());
                self.department = Some(*department);
                self.requestor = Some(*requestor);
                self.declared_amount = Some(declared_amount.clone());
                self.funding_source = *funding_source;
                self.status = PrStatus::Draft;
                self.items.clear();
                self.assignments.clear();
                self.record_status = RecordStatus::Active;
                self.created = true;
            }
            PrEvent::ItemAdded { item, .. } => {
                self.next_line_no = self.next_line_no.max(item.line_no + 1);
                self.items.push(item.clone());
            }
            PrEvent::ItemRemoved { line_no, .. } => {
                self.items.retain(|i| i.line_no != *line_no);
            }
            PrEvent::StatusChanged { to, action, .. } => {
                self.status = *to;
                match action {
                    PrAction::ReturnForInfo => self.return_count += 1,
                    // Reopening discards the rejected selection so a new
                    // quotation can be chosen.
                    PrAction::ReopenSelection => self.selection = None,
                    _ => {}
                }
            }
            PrEvent::Assigned { assignment, .. } => {
                self.assignments.push(assignment.clone());
            }
            PrEvent::AssignmentRevoked { assignment_id, .. } => {
                if let Some(a) = self.assignments.iter_mut().find(|a| a.id == *assignment_id) {
                    a.record_status = RecordStatus::Deleted;
                }
            }
            PrEvent::SupplierSelected { selection, .. } => {
                self.selection = Some(selection.clone());
            }
            PrEvent::BudgetExceptionRaised { .. } => {}
            PrEvent::RequestDeleted { .. } => {
                self.record_status = RecordStatus::Deleted;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PrCommand::CreateRequest(cmd) => self.handle_create(cmd),
            PrCommand::AddItem(cmd) => self.handle_add_item(cmd),
            PrCommand::RemoveItem(cmd) => self.handle_remove_item(cmd),
            PrCommand::SubmitRequest(cmd) => self.handle_submit(cmd),
            PrCommand::RouteRequest(cmd) => self.handle_route(cmd),
            PrCommand::ApproveStage(cmd) => self.handle_approve(cmd),
            PrCommand::ReturnForInfo(cmd) => self.handle_return(cmd),
            PrCommand::ResubmitRequest(cmd) => self.handle_resubmit(cmd),
            PrCommand::AssignBuyer(cmd) => self.handle_assign(cmd),
            PrCommand::RevokeAssignment(cmd) => self.handle_revoke(cmd),
            PrCommand::StartRfq(cmd) => self.handle_start_rfq(cmd),
            PrCommand::RecordQuotationsReceived(cmd) => self.handle_quotations_received(cmd),
            PrCommand::SelectSupplier(cmd) => self.handle_select(cmd),
            PrCommand::ApproveBudgetException(cmd) => self.handle_approve_budget(cmd),
            PrCommand::RejectBudgetException(cmd) => self.handle_reject_budget(cmd),
            PrCommand::ReopenSelection(cmd) => self.handle_reopen(cmd),
            PrCommand::MarkPaymentDone(cmd) => self.handle_payment_done(cmd),
            PrCommand::CancelRequest(cmd) => self.handle_cancel(cmd),
            PrCommand::DeleteRequest(cmd) => self.handle_delete(cmd),
        }
    }
}

impl PurchaseRequest {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_pr_id(&self, pr_id: PurchaseRequestId) -> Result<(), DomainError> {
        if self.id != pr_id {
            return Err(DomainError::invariant("pr_id mismatch"));
        }
        Ok(())
    }

    fn ensure_live(&self, pr_id: PurchaseRequestId) -> Result<(), DomainError> {
        self.ensure_created()?;
        self.ensure_pr_id(pr_id)?;
        if !self.record_status.is_active() {
            return Err(DomainError::invariant("purchase request is soft-deleted"));
        }
        Ok(())
    }

    /// Perform a table transition and produce its status-change event.
    fn status_change(
        &self,
        action: PrAction,
        actor: &Actor,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<PrEvent, DomainError> {
        let next = transition(self.status, action, &actor.role)?;
        Ok(PrEvent::StatusChanged {
            pr_id: self.id,
            from: self.status,
            to: next,
            action,
            actor: actor.clone(),
            note,
            occurred_at,
        })
    }

    fn handle_create(&self, cmd: &CreateRequest) -> Result<Vec<PrEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase request already exists"));
        }
        if cmd.actor.role.as_str() != role::REQUESTOR {
            return Err(DomainError::Unauthorized);
        }
        if cmd.declared_amount.amount < 0 {
            return Err(DomainError::validation(
                "declared amount must not be negative",
            ));
        }

        Ok(vec![PrEvent::RequestCreated {
            pr_id: cmd.pr_id,
            number: cmd.number.clone(),
            department: cmd.department,
            requestor: cmd.actor.user_id,
            declared_amount: cmd.declared_amount.clone(),
            funding_source: cmd.funding_source,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn ensure_editable(&self, actor: &Actor) -> Result<(), DomainError> {
        if !matches!(self.status, PrStatus::Draft | PrStatus::NeedMoreInfo) {
            return Err(DomainError::invalid_transition(format!(
                "line items cannot be edited while the request is {:?}",
                self.status
            )));
        }
        if actor.role.as_str() != role::REQUESTOR {
            return Err(DomainError::invalid_transition(format!(
                "role '{}' may not edit line items",
                actor.role
            )));
        }
        Ok(())
    }

    fn handle_add_item(&self, cmd: &AddItem) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;
        self.ensure_editable(&cmd.actor)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if !cmd.unit_price.is_positive() {
            return Err(DomainError::validation("unit price must be positive"));
        }
        if cmd.description.trim().is_empty() {
            return Err(DomainError::validation("item description is required"));
        }

        let item = LineItem {
            line_no: self.next_line_no,
            description: cmd.description.clone(),
            quantity: cmd.quantity,
            unit_price: cmd.unit_price.clone(),
            manufacturer: cmd.manufacturer.clone(),
            origin: cmd.origin,
        };
        // Surface overflow at capture time rather than at totalling.
        item.amount()?;

        Ok(vec![PrEvent::ItemAdded {
            pr_id: cmd.pr_id,
            item,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_remove_item(&self, cmd: &RemoveItem) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;
        self.ensure_editable(&cmd.actor)?;

        if !self.items.iter().any(|i| i.line_no == cmd.line_no) {
            return Err(DomainError::validation(format!(
                "line item {} does not belong to the request",
                cmd.line_no
            )));
        }
        // A returned request must stay submittable without re-running
        // draft-only validations.
        if self.status == PrStatus::NeedMoreInfo && self.items.len() == 1 {
            return Err(DomainError::invariant(
                "a returned request must keep at least one line item",
            ));
        }

        Ok(vec![PrEvent::ItemRemoved {
            pr_id: cmd.pr_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_submit(&self, cmd: &SubmitRequest) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;

        // Draft-only validations; resubmission after return skips these.
        if self.items.is_empty() {
            return Err(DomainError::validation(
                "cannot submit a request without line items",
            ));
        }

        Ok(vec![self.status_change(
            PrAction::Submit,
            &cmd.actor,
            None,
            cmd.occurred_at,
        )?])
    }

    fn handle_route(&self, cmd: &RouteRequest) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;
        Ok(vec![self.status_change(
            PrAction::Route,
            &cmd.actor,
            None,
            cmd.occurred_at,
        )?])
    }

    fn handle_approve(&self, cmd: &ApproveStage) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;
        Ok(vec![self.status_change(
            PrAction::Approve,
            &cmd.actor,
            None,
            cmd.occurred_at,
        )?])
    }

    fn handle_return(&self, cmd: &ReturnForInfo) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("a return reason is required"));
        }
        Ok(vec![self.status_change(
            PrAction::ReturnForInfo,
            &cmd.actor,
            Some(cmd.reason.clone()),
            cmd.occurred_at,
        )?])
    }

    fn handle_resubmit(&self, cmd: &ResubmitRequest) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;
        Ok(vec![self.status_change(
            PrAction::Resubmit,
            &cmd.actor,
            None,
            cmd.occurred_at,
        )?])
    }

    fn handle_assign(&self, cmd: &AssignBuyer) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;
        validate_new_assignment(&self.items, &self.assignments, &cmd.scope)?;

        let assignment = Assignment {
            id: cmd.assignment_id,
            buyer_id: cmd.buyer_id,
            scope: cmd.scope.clone(),
            record_status: RecordStatus::Active,
        };
        let assigned = PrEvent::Assigned {
            pr_id: cmd.pr_id,
            assignment,
            occurred_at: cmd.occurred_at,
        };

        match self.status {
            // First assignment moves the request into the buyer stage.
            PrStatus::BranchManagerApproved => {
                let status_changed =
                    self.status_change(PrAction::Assign, &cmd.actor, None, cmd.occurred_at)?;
                Ok(vec![assigned, status_changed])
            }
            // Further splits while the request stays in the buyer stage.
            PrStatus::AssignedToBuyer => {
                if cmd.actor.role.as_str() != role::BUYER_LEADER {
                    return Err(DomainError::invalid_transition(format!(
                        "role '{}' may not assign buyers",
                        cmd.actor.role
                    )));
                }
                Ok(vec![assigned])
            }
            other => Err(DomainError::invalid_transition(format!(
                "buyers cannot be assigned while the request is {other:?}"
            ))),
        }
    }

    fn handle_revoke(&self, cmd: &RevokeAssignment) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;

        if self.status != PrStatus::AssignedToBuyer {
            return Err(DomainError::invalid_transition(format!(
                "assignments cannot be revoked while the request is {:?}",
                self.status
            )));
        }
        if cmd.actor.role.as_str() != role::BUYER_LEADER {
            return Err(DomainError::invalid_transition(format!(
                "role '{}' may not revoke assignments",
                cmd.actor.role
            )));
        }

        let assignment = self
            .assignments
            .iter()
            .find(|a| a.id == cmd.assignment_id)
            .ok_or(DomainError::NotFound)?;
        if !assignment.is_active() {
            return Err(DomainError::invariant("assignment is already revoked"));
        }

        Ok(vec![PrEvent::AssignmentRevoked {
            pr_id: cmd.pr_id,
            assignment_id: cmd.assignment_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_start_rfq(&self, cmd: &StartRfq) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;
        let status_changed =
            self.status_change(PrAction::StartRfq, &cmd.actor, None, cmd.occurred_at)?;

        // Every item must be covered by exactly one active assignment before
        // the request leaves the assignment stage.
        ensure_complete(&self.items, &self.assignments)?;

        Ok(vec![status_changed])
    }

    fn handle_quotations_received(
        &self,
        cmd: &RecordQuotationsReceived,
    ) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;
        Ok(vec![self.status_change(
            PrAction::RecordQuotations,
            &cmd.actor,
            None,
            cmd.occurred_at,
        )?])
    }

    fn handle_select(&self, cmd: &SelectSupplier) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;

        if !cmd.amount.is_positive() {
            return Err(DomainError::validation(
                "selected quotation amount must be positive",
            ));
        }

        let check = check_over_budget(self.declared_amount.as_ref(), &cmd.amount)?;

        let justification = cmd
            .justification
            .as_deref()
            .map(str::trim)
            .filter(|j| !j.is_empty())
            .map(str::to_string);

        let (action, over_budget) = if check.is_over_budget {
            if justification.is_none() {
                return Err(DomainError::MissingJustification);
            }
            (PrAction::RaiseBudgetException, Some(check.clone()))
        } else {
            (PrAction::SelectSupplier, None)
        };

        let status_changed = self.status_change(action, &cmd.actor, None, cmd.occurred_at)?;

        let selection = SupplierSelection {
            rfq_id: cmd.rfq_id,
            quotation_id: cmd.quotation_id,
            supplier_id: cmd.supplier_id,
            amount: cmd.amount.clone(),
            justification,
            over_budget,
        };
        let mut events = vec![PrEvent::SupplierSelected {
            pr_id: cmd.pr_id,
            selection,
            occurred_at: cmd.occurred_at,
        }];

        if check.is_over_budget {
            let declared = self
                .declared_amount
                .clone()
                .ok_or_else(|| DomainError::data_integrity("over budget without declared amount"))?;
            let over_amount = check
                .over_amount
                .clone()
                .ok_or_else(|| DomainError::data_integrity("over budget without over amount"))?;
            events.push(PrEvent::BudgetExceptionRaised {
                pr_id: cmd.pr_id,
                declared_amount: declared,
                selected_amount: cmd.amount.clone(),
                over_amount,
                over_percent: check.over_percent,
                occurred_at: cmd.occurred_at,
            });
        }

        events.push(status_changed);
        Ok(events)
    }

    fn handle_approve_budget(
        &self,
        cmd: &ApproveBudgetException,
    ) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;
        Ok(vec![self.status_change(
            PrAction::ApproveBudget,
            &cmd.actor,
            None,
            cmd.occurred_at,
        )?])
    }

    fn handle_reject_budget(
        &self,
        cmd: &RejectBudgetException,
    ) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("a rejection reason is required"));
        }
        Ok(vec![self.status_change(
            PrAction::RejectBudget,
            &cmd.actor,
            Some(cmd.reason.clone()),
            cmd.occurred_at,
        )?])
    }

    fn handle_reopen(&self, cmd: &ReopenSelection) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;
        Ok(vec![self.status_change(
            PrAction::ReopenSelection,
            &cmd.actor,
            None,
            cmd.occurred_at,
        )?])
    }

    fn handle_payment_done(&self, cmd: &MarkPaymentDone) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;
        Ok(vec![self.status_change(
            PrAction::MarkPaymentDone,
            &cmd.actor,
            None,
            cmd.occurred_at,
        )?])
    }

    fn handle_cancel(&self, cmd: &CancelRequest) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_live(cmd.pr_id)?;
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("a cancellation reason is required"));
        }
        Ok(vec![self.status_change(
            PrAction::Cancel,
            &cmd.actor,
            Some(cmd.reason.clone()),
            cmd.occurred_at,
        )?])
    }

    fn handle_delete(&self, cmd: &DeleteRequest) -> Result<Vec<PrEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_pr_id(cmd.pr_id)?;
        if !self.record_status.is_active() {
            return Err(DomainError::invariant("purchase request is already deleted"));
        }
        if cmd.actor.role.as_str() != role::REQUESTOR {
            return Err(DomainError::Unauthorized);
        }
        // Deleting an in-flight request would orphan its approval chain.
        if !(self.status == PrStatus::Draft || self.status.is_terminal()) {
            return Err(DomainError::invariant(
                "only draft or finished requests can be deleted",
            ));
        }

        Ok(vec![PrEvent::RequestDeleted {
            pr_id: cmd.pr_id,
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procureflow_auth::Role;
    use procureflow_core::Currency;
    use procureflow_events::execute;
    use std::collections::BTreeSet;

    fn actor(role: Role) -> Actor {
        Actor::new(UserId::new(), role)
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn vnd(amount: i64) -> Money {
        Money::vnd(amount)
    }

    /// A draft request with three items and a declared amount of 100M VND.
    fn draft_request() -> (PurchaseRequest, Actor) {
        let pr_id = PurchaseRequestId::new(AggregateId::new());
        let requestor = actor(Role::requestor());
        let mut pr = PurchaseRequest::empty(pr_id);

        execute(
            &mut pr,
            &PrCommand::CreateRequest(CreateRequest {
                pr_id,
                number: DocumentNumber::format("PR", 2026, 1).unwrap(),
                department: DepartmentId::new(),
                declared_amount: vnd(100_000_000),
                funding_source: Some(SalesPoId::new(AggregateId::new())),
                actor: requestor.clone(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        for (desc, origin) in [
            ("steel profiles", ItemOrigin::Domestic),
            ("fasteners", ItemOrigin::Domestic),
            ("hydraulic pump", ItemOrigin::Overseas),
        ] {
            execute(
                &mut pr,
                &PrCommand::AddItem(AddItem {
                    pr_id,
                    description: desc.to_string(),
                    quantity: 10,
                    unit_price: vnd(1_000_000),
                    manufacturer: None,
                    origin,
                    actor: requestor.clone(),
                    occurred_at: test_time(),
                }),
            )
            .unwrap();
        }

        (pr, requestor)
    }

    fn step(pr: &mut PurchaseRequest, cmd: PrCommand) {
        execute(pr, &cmd).unwrap();
    }

    /// Drive a request through both approvals.
    fn approved_request() -> (PurchaseRequest, Actor) {
        let (mut pr, requestor) = draft_request();
        let pr_id = pr.id_typed();

        step(
            &mut pr,
            PrCommand::SubmitRequest(SubmitRequest {
                pr_id,
                actor: requestor.clone(),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::RouteRequest(RouteRequest {
                pr_id,
                actor: actor(Role::system()),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::ApproveStage(ApproveStage {
                pr_id,
                actor: actor(Role::department_head()),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::RouteRequest(RouteRequest {
                pr_id,
                actor: actor(Role::system()),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::ApproveStage(ApproveStage {
                pr_id,
                actor: actor(Role::branch_manager()),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(pr.status(), PrStatus::BranchManagerApproved);

        (pr, requestor)
    }

    /// Drive a request all the way to QuotationReceived.
    fn quotation_ready_request() -> PurchaseRequest {
        let (mut pr, _) = approved_request();
        let pr_id = pr.id_typed();

        step(
            &mut pr,
            PrCommand::AssignBuyer(AssignBuyer {
                pr_id,
                assignment_id: AssignmentId::new(AggregateId::new()),
                buyer_id: UserId::new(),
                scope: AssignmentScope::Full,
                actor: actor(Role::buyer_leader()),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::StartRfq(StartRfq {
                pr_id,
                actor: actor(Role::buyer()),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::RecordQuotationsReceived(RecordQuotationsReceived {
                pr_id,
                actor: actor(Role::buyer()),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(pr.status(), PrStatus::QuotationReceived);

        pr
    }

    fn select_cmd(pr_id: PurchaseRequestId, amount: i64, justification: Option<&str>) -> PrCommand {
        PrCommand::SelectSupplier(SelectSupplier {
            pr_id,
            rfq_id: RfqId::new(AggregateId::new()),
            quotation_id: QuotationId::new(AggregateId::new()),
            supplier_id: SupplierId::new(),
            amount: vnd(amount),
            justification: justification.map(str::to_string),
            actor: actor(Role::buyer_leader()),
            occurred_at: test_time(),
        })
    }

    #[test]
    fn create_emits_request_created_and_starts_draft() {
        let (pr, _) = draft_request();
        assert_eq!(pr.status(), PrStatus::Draft);
        assert_eq!(pr.items().len(), 3);
        assert_eq!(pr.items()[2].line_no, 3);
        assert_eq!(pr.declared_amount(), Some(&vnd(100_000_000)));
    }

    #[test]
    fn submit_requires_line_items() {
        let pr_id = PurchaseRequestId::new(AggregateId::new());
        let requestor = actor(Role::requestor());
        let mut pr = PurchaseRequest::empty(pr_id);
        step(
            &mut pr,
            PrCommand::CreateRequest(CreateRequest {
                pr_id,
                number: DocumentNumber::format("PR", 2026, 9).unwrap(),
                department: DepartmentId::new(),
                declared_amount: vnd(1_000_000),
                funding_source: None,
                actor: requestor.clone(),
                occurred_at: test_time(),
            }),
        );

        let err = pr
            .handle(&PrCommand::SubmitRequest(SubmitRequest {
                pr_id,
                actor: requestor,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn statuses_cannot_be_skipped() {
        let (mut pr, requestor) = draft_request();
        let pr_id = pr.id_typed();
        step(
            &mut pr,
            PrCommand::SubmitRequest(SubmitRequest {
                pr_id,
                actor: requestor,
                occurred_at: test_time(),
            }),
        );

        // Straight from Submitted to supplier selection: not an edge.
        let err = pr.handle(&select_cmd(pr_id, 95_000_000, None)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn approval_is_role_gated() {
        let (mut pr, requestor) = draft_request();
        let pr_id = pr.id_typed();
        step(
            &mut pr,
            PrCommand::SubmitRequest(SubmitRequest {
                pr_id,
                actor: requestor.clone(),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::RouteRequest(RouteRequest {
                pr_id,
                actor: actor(Role::system()),
                occurred_at: test_time(),
            }),
        );

        let err = pr
            .handle(&PrCommand::ApproveStage(ApproveStage {
                pr_id,
                actor: requestor,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn return_for_info_keeps_data_and_resubmits_to_submitted() {
        let (mut pr, requestor) = draft_request();
        let pr_id = pr.id_typed();
        step(
            &mut pr,
            PrCommand::SubmitRequest(SubmitRequest {
                pr_id,
                actor: requestor.clone(),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::RouteRequest(RouteRequest {
                pr_id,
                actor: actor(Role::system()),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::ReturnForInfo(ReturnForInfo {
                pr_id,
                reason: "missing specs for the pump".to_string(),
                actor: actor(Role::department_head()),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(pr.status(), PrStatus::NeedMoreInfo);
        assert_eq!(pr.return_count(), 1);
        // Requestor-entered data is retained.
        assert_eq!(pr.items().len(), 3);

        step(
            &mut pr,
            PrCommand::ResubmitRequest(ResubmitRequest {
                pr_id,
                actor: requestor,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(pr.status(), PrStatus::Submitted);
    }

    #[test]
    fn start_rfq_requires_complete_coverage() {
        let (mut pr, _) = approved_request();
        let pr_id = pr.id_typed();

        // Partial assignment covering items 1 and 2 only.
        step(
            &mut pr,
            PrCommand::AssignBuyer(AssignBuyer {
                pr_id,
                assignment_id: AssignmentId::new(AggregateId::new()),
                buyer_id: UserId::new(),
                scope: AssignmentScope::Partial(BTreeSet::from([1, 2])),
                actor: actor(Role::buyer_leader()),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(pr.status(), PrStatus::AssignedToBuyer);

        let report = pr.coverage_report().unwrap();
        assert!(!report.complete);
        assert_eq!(report.unassigned_line_nos, vec![3]);

        let err = pr
            .handle(&PrCommand::StartRfq(StartRfq {
                pr_id,
                actor: actor(Role::buyer()),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::IncompleteAssignment(vec![3]));

        // Cover the remaining item; the RFQ may start.
        step(
            &mut pr,
            PrCommand::AssignBuyer(AssignBuyer {
                pr_id,
                assignment_id: AssignmentId::new(AggregateId::new()),
                buyer_id: UserId::new(),
                scope: AssignmentScope::Partial(BTreeSet::from([3])),
                actor: actor(Role::buyer_leader()),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::StartRfq(StartRfq {
                pr_id,
                actor: actor(Role::buyer()),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(pr.status(), PrStatus::RfqInProgress);
    }

    #[test]
    fn within_budget_selection_goes_straight_to_supplier_selected() {
        let mut pr = quotation_ready_request();

        // Declared 100M, selected 95M: no exception branch.
        let cmd = select_cmd(pr.id_typed(), 95_000_000, None);
        let events = execute(&mut pr, &cmd).unwrap();
        assert_eq!(pr.status(), PrStatus::SupplierSelected);
        assert!(pr.selection().unwrap().over_budget.is_none());
        assert!(!events
            .iter()
            .any(|e| matches!(e, PrEvent::BudgetExceptionRaised { .. })));
    }

    #[test]
    fn over_budget_selection_without_justification_is_rejected() {
        let pr = quotation_ready_request();

        let err = pr
            .handle(&select_cmd(pr.id_typed(), 120_000_000, None))
            .unwrap_err();
        assert_eq!(err, DomainError::MissingJustification);

        let err = pr
            .handle(&select_cmd(pr.id_typed(), 120_000_000, Some("   ")))
            .unwrap_err();
        assert_eq!(err, DomainError::MissingJustification);
    }

    #[test]
    fn over_budget_selection_with_justification_raises_an_exception() {
        let mut pr = quotation_ready_request();

        let cmd = select_cmd(pr.id_typed(), 120_000_000, Some("market price increase"));
        let events = execute(&mut pr, &cmd).unwrap();
        assert_eq!(pr.status(), PrStatus::BudgetException);

        let raised = events
            .iter()
            .find_map(|e| match e {
                PrEvent::BudgetExceptionRaised {
                    over_amount,
                    over_percent,
                    ..
                } => Some((over_amount.clone(), *over_percent)),
                _ => None,
            })
            .expect("budget exception event");
        assert_eq!(raised.0, vnd(20_000_000));
        assert!((raised.1 - 20.0).abs() < 1e-9);

        let selection = pr.selection().unwrap();
        assert_eq!(selection.justification.as_deref(), Some("market price increase"));
        assert!(selection.over_budget.as_ref().unwrap().is_over_budget);

        // Executive board approves; payment can then complete.
        let pr_id = pr.id_typed();
        step(
            &mut pr,
            PrCommand::ApproveBudgetException(ApproveBudgetException {
                pr_id,
                actor: actor(Role::executive_board()),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(pr.status(), PrStatus::BudgetApproved);
        step(
            &mut pr,
            PrCommand::MarkPaymentDone(MarkPaymentDone {
                pr_id,
                actor: actor(Role::finance()),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(pr.status(), PrStatus::PaymentDone);
    }

    #[test]
    fn rejected_budget_exception_reopens_selection() {
        let mut pr = quotation_ready_request();
        let pr_id = pr.id_typed();

        step(
            &mut pr,
            select_cmd(pr_id, 130_000_000, Some("sole supplier available")),
        );
        step(
            &mut pr,
            PrCommand::RejectBudgetException(RejectBudgetException {
                pr_id,
                reason: "renegotiate or find alternatives".to_string(),
                actor: actor(Role::executive_board()),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(pr.status(), PrStatus::BudgetRejected);

        step(
            &mut pr,
            PrCommand::ReopenSelection(ReopenSelection {
                pr_id,
                actor: actor(Role::buyer_leader()),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(pr.status(), PrStatus::QuotationReceived);
        assert!(pr.selection().is_none());

        // A within-budget second round completes normally.
        step(&mut pr, select_cmd(pr_id, 99_000_000, None));
        assert_eq!(pr.status(), PrStatus::SupplierSelected);
    }

    #[test]
    fn zero_declared_amount_is_never_over_budget() {
        let pr_id = PurchaseRequestId::new(AggregateId::new());
        let requestor = actor(Role::requestor());
        let mut pr = PurchaseRequest::empty(pr_id);
        step(
            &mut pr,
            PrCommand::CreateRequest(CreateRequest {
                pr_id,
                number: DocumentNumber::format("PR", 2026, 2).unwrap(),
                department: DepartmentId::new(),
                declared_amount: vnd(0),
                funding_source: None,
                actor: requestor.clone(),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::AddItem(AddItem {
                pr_id,
                description: "legacy import".to_string(),
                quantity: 1,
                unit_price: vnd(1),
                manufacturer: None,
                origin: ItemOrigin::Domestic,
                actor: requestor.clone(),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::SubmitRequest(SubmitRequest {
                pr_id,
                actor: requestor,
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::RouteRequest(RouteRequest {
                pr_id,
                actor: actor(Role::system()),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::ApproveStage(ApproveStage {
                pr_id,
                actor: actor(Role::department_head()),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::RouteRequest(RouteRequest {
                pr_id,
                actor: actor(Role::system()),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::ApproveStage(ApproveStage {
                pr_id,
                actor: actor(Role::branch_manager()),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::AssignBuyer(AssignBuyer {
                pr_id,
                assignment_id: AssignmentId::new(AggregateId::new()),
                buyer_id: UserId::new(),
                scope: AssignmentScope::Full,
                actor: actor(Role::buyer_leader()),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::StartRfq(StartRfq {
                pr_id,
                actor: actor(Role::buyer()),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::RecordQuotationsReceived(RecordQuotationsReceived {
                pr_id,
                actor: actor(Role::buyer()),
                occurred_at: test_time(),
            }),
        );

        // Any quotation amount passes the gate.
        step(&mut pr, select_cmd(pr_id, 999_000_000, None));
        assert_eq!(pr.status(), PrStatus::SupplierSelected);
    }

    #[test]
    fn cancellation_is_blocked_after_supplier_selection() {
        let mut pr = quotation_ready_request();
        let pr_id = pr.id_typed();
        step(&mut pr, select_cmd(pr_id, 95_000_000, None));

        let err = pr
            .handle(&PrCommand::CancelRequest(CancelRequest {
                pr_id,
                reason: "no longer needed".to_string(),
                actor: actor(Role::branch_manager()),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn cancellation_before_selection_is_allowed() {
        let (mut pr, requestor) = draft_request();
        let pr_id = pr.id_typed();
        step(
            &mut pr,
            PrCommand::CancelRequest(CancelRequest {
                pr_id,
                reason: "duplicate request".to_string(),
                actor: requestor,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(pr.status(), PrStatus::Cancelled);
    }

    #[test]
    fn currency_mismatch_at_the_gate_is_surfaced() {
        let pr = quotation_ready_request();
        let cmd = PrCommand::SelectSupplier(SelectSupplier {
            pr_id: pr.id_typed(),
            rfq_id: RfqId::new(AggregateId::new()),
            quotation_id: QuotationId::new(AggregateId::new()),
            supplier_id: SupplierId::new(),
            amount: Money::new(5_000, Currency::USD),
            justification: None,
            actor: actor(Role::buyer_leader()),
            occurred_at: test_time(),
        });

        let err = pr.handle(&cmd).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn soft_delete_only_from_draft_or_terminal() {
        let (mut pr, requestor) = approved_request();
        let pr_id = pr.id_typed();

        let err = pr
            .handle(&PrCommand::DeleteRequest(DeleteRequest {
                pr_id,
                actor: requestor.clone(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        step(
            &mut pr,
            PrCommand::CancelRequest(CancelRequest {
                pr_id,
                reason: "scope moved to another project".to_string(),
                actor: actor(Role::branch_manager()),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::DeleteRequest(DeleteRequest {
                pr_id,
                actor: requestor,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(pr.record_status(), RecordStatus::Deleted);

        // A deleted request accepts no further work.
        let err = pr
            .handle(&PrCommand::RouteRequest(RouteRequest {
                pr_id,
                actor: actor(Role::system()),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn line_numbers_are_never_reused() {
        let (mut pr, requestor) = draft_request();
        let pr_id = pr.id_typed();

        step(
            &mut pr,
            PrCommand::RemoveItem(RemoveItem {
                pr_id,
                line_no: 3,
                actor: requestor.clone(),
                occurred_at: test_time(),
            }),
        );
        step(
            &mut pr,
            PrCommand::AddItem(AddItem {
                pr_id,
                description: "replacement pump".to_string(),
                quantity: 1,
                unit_price: vnd(5_000_000),
                manufacturer: Some("KSB".to_string()),
                origin: ItemOrigin::Overseas,
                actor: requestor,
                occurred_at: test_time(),
            }),
        );

        let line_nos: Vec<u32> = pr.items().iter().map(|i| i.line_no).collect();
        assert_eq!(line_nos, vec![1, 2, 4]);
    }

    #[test]
    fn every_status_change_produces_exactly_one_status_event() {
        let (mut pr, requestor) = draft_request();
        let pr_id = pr.id_typed();

        let events = execute(
            &mut pr,
            &PrCommand::SubmitRequest(SubmitRequest {
                pr_id,
                actor: requestor,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let status_events: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, PrEvent::StatusChanged { .. }))
            .collect();
        assert_eq!(status_events.len(), 1);
        match status_events[0] {
            PrEvent::StatusChanged { from, to, .. } => {
                assert_eq!(*from, PrStatus::Draft);
                assert_eq!(*to, PrStatus::Submitted);
            }
            _ => unreachable!(),
        }
    }
}
