use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procureflow_core::{
    Aggregate, AggregateId, AggregateRoot, DocumentNumber, DomainError, Money,
};
use procureflow_events::Event;

/// Sales PO identifier (the funding source referenced by purchase requests).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalesPoId(pub AggregateId);

impl SalesPoId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SalesPoId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Sales PO status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesPoStatus {
    Draft,
    Active,
    Closed,
}

/// Aggregate root: SalesPo (customer order funding internal purchases).
///
/// Note: SalesPo does NOT hold its consumed amount; actual cost is derived
/// by the budget ledger from DONE payments on referencing requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesPo {
    id: SalesPoId,
    number: Option<DocumentNumber>,
    amount: Option<Money>,
    status: SalesPoStatus,
    version: u64,
    created: bool,
}

impl SalesPo {
    /// Empty aggregate for rehydration.
    pub fn empty(id: SalesPoId) -> Self {
        Self {
            id,
            number: None,
            amount: None,
            status: SalesPoStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SalesPoId {
        self.id
    }

    pub fn number(&self) -> Option<&DocumentNumber> {
        self.number.as_ref()
    }

    /// Budget ceiling for requests funded by this PO.
    pub fn budget(&self) -> Option<&Money> {
        self.amount.as_ref()
    }

    pub fn status(&self) -> SalesPoStatus {
        self.status
    }

    /// Whether new purchase requests may reference this PO.
    pub fn accepts_requests(&self) -> bool {
        self.status == SalesPoStatus::Active
    }
}

impl AggregateRoot for SalesPo {
    type Id = SalesPoId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterSalesPo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSalesPo {
    pub po_id: SalesPoId,
    pub number: DocumentNumber,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AmendSalesPoAmount (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendSalesPoAmount {
    pub po_id: SalesPoId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ActivateSalesPo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateSalesPo {
    pub po_id: SalesPoId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseSalesPo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseSalesPo {
    pub po_id: SalesPoId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesPoCommand {
    RegisterSalesPo(RegisterSalesPo),
    AmendSalesPoAmount(AmendSalesPoAmount),
    ActivateSalesPo(ActivateSalesPo),
    CloseSalesPo(CloseSalesPo),
}

impl SalesPoCommand {
    /// The sales PO this command targets.
    pub fn po_id(&self) -> SalesPoId {
        match self {
            SalesPoCommand::RegisterSalesPo(c) => c.po_id,
            SalesPoCommand::AmendSalesPoAmount(c) => c.po_id,
            SalesPoCommand::ActivateSalesPo(c) => c.po_id,
            SalesPoCommand::CloseSalesPo(c) => c.po_id,
        }
    }
}

impl procureflow_events::Command for SalesPoCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        self.po_id().0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesPoEvent {
    SalesPoRegistered {
        po_id: SalesPoId,
        number: DocumentNumber,
        amount: Money,
        occurred_at: DateTime<Utc>,
    },
    SalesPoAmountAmended {
        po_id: SalesPoId,
        amount: Money,
        occurred_at: DateTime<Utc>,
    },
    SalesPoActivated {
        po_id: SalesPoId,
        occurred_at: DateTime<Utc>,
    },
    SalesPoClosed {
        po_id: SalesPoId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for SalesPoEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SalesPoEvent::SalesPoRegistered { .. } => "funding.sales_po.registered",
            SalesPoEvent::SalesPoAmountAmended { .. } => "funding.sales_po.amount_amended",
            SalesPoEvent::SalesPoActivated { .. } => "funding.sales_po.activated",
            SalesPoEvent::SalesPoClosed { .. } => "funding.sales_po.closed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SalesPoEvent::SalesPoRegistered { occurred_at, .. }
            | SalesPoEvent::SalesPoAmountAmended { occurred_at, .. }
            | SalesPoEvent::SalesPoActivated { occurred_at, .. }
            | SalesPoEvent::SalesPoClosed { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for SalesPo {
    type Command = SalesPoCommand;
    type Event = SalesPoEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SalesPoEvent::SalesPoRegistered {
                po_id,
                number,
                amount,
                ..
            } => {
                self.id = *po_id;
                self.number = Some(number.clone());
                self.amount = Some(amount.clone());
                self.status = SalesPoStatus::Draft;
                self.created = true;
            }
            SalesPoEvent::SalesPoAmountAmended { amount, .. } => {
                self.amount = Some(amount.clone());
            }
            SalesPoEvent::SalesPoActivated { .. } => {
                self.status = SalesPoStatus::Active;
            }
            SalesPoEvent::SalesPoClosed { .. } => {
                self.status = SalesPoStatus::Closed;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SalesPoCommand::RegisterSalesPo(cmd) => self.handle_register(cmd),
            SalesPoCommand::AmendSalesPoAmount(cmd) => self.handle_amend(cmd),
            SalesPoCommand::ActivateSalesPo(cmd) => self.handle_activate(cmd),
            SalesPoCommand::CloseSalesPo(cmd) => self.handle_close(cmd),
        }
    }
}

impl SalesPo {
    fn ensure_po_id(&self, po_id: SalesPoId) -> Result<(), DomainError> {
        if self.id != po_id {
            return Err(DomainError::invariant("po_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterSalesPo) -> Result<Vec<SalesPoEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sales po already exists"));
        }
        if cmd.amount.amount < 0 {
            return Err(DomainError::validation("sales po amount must not be negative"));
        }

        Ok(vec![SalesPoEvent::SalesPoRegistered {
            po_id: cmd.po_id,
            number: cmd.number.clone(),
            amount: cmd.amount.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_amend(&self, cmd: &AmendSalesPoAmount) -> Result<Vec<SalesPoEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_po_id(cmd.po_id)?;

        if self.status != SalesPoStatus::Draft {
            return Err(DomainError::invariant(
                "sales po amount can only be amended while draft",
            ));
        }
        if cmd.amount.amount < 0 {
            return Err(DomainError::validation("sales po amount must not be negative"));
        }

        Ok(vec![SalesPoEvent::SalesPoAmountAmended {
            po_id: cmd.po_id,
            amount: cmd.amount.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_activate(&self, cmd: &ActivateSalesPo) -> Result<Vec<SalesPoEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_po_id(cmd.po_id)?;

        if self.status != SalesPoStatus::Draft {
            return Err(DomainError::invariant("only draft sales pos can be activated"));
        }

        Ok(vec![SalesPoEvent::SalesPoActivated {
            po_id: cmd.po_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_close(&self, cmd: &CloseSalesPo) -> Result<Vec<SalesPoEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_po_id(cmd.po_id)?;

        if self.status != SalesPoStatus::Active {
            return Err(DomainError::invariant("only active sales pos can be closed"));
        }

        Ok(vec![SalesPoEvent::SalesPoClosed {
            po_id: cmd.po_id,
            occurred_at: cmd.occurred_at,
        }])
    }
}
