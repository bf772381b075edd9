use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use wms_core::{
    Aggregate, AggregateRoot, ContainerId, DomainError, MaterialCode, Quantity, VoucherId,
};
use wms_events::Event;

/// Stream type under which voucher events are committed.
pub const VOUCHER_STREAM: &str = "receiving.voucher";

/// Append-only record of part of a line placed into a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub container_id: ContainerId,
    pub quantity: i64,
}

/// One material entry of a voucher.
///
/// Invariant: `pending_quantity + allocated_quantity() == original_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoucherLine {
    material: MaterialCode,
    original_quantity: i64,
    pending_quantity: i64,
    allocations: Vec<Allocation>,
}

impl VoucherLine {
    fn new(material: MaterialCode, quantity: Quantity) -> Self {
        Self {
            material,
            original_quantity: quantity.get(),
            pending_quantity: quantity.get(),
            allocations: Vec::new(),
        }
    }

    pub fn material(&self) -> &MaterialCode {
        &self.material
    }

    pub fn original_quantity(&self) -> i64 {
        self.original_quantity
    }

    pub fn pending_quantity(&self) -> i64 {
        self.pending_quantity
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    pub fn allocated_quantity(&self) -> i64 {
        self.allocations.iter().map(|a| a.quantity).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.pending_quantity + self.allocated_quantity() == self.original_quantity
    }
}

/// Intake record for one expected material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeLine {
    pub material: MaterialCode,
    pub quantity: i64,
}

/// Intake record as delivered by the receipt feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherIntake {
    pub id: VoucherId,
    pub supplier: String,
    pub date: NaiveDate,
    pub lines: Vec<IntakeLine>,
}

/// Aggregate root: Voucher (receiving task).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voucher {
    id: VoucherId,
    supplier: String,
    date: NaiveDate,
    lines: Vec<VoucherLine>,
    #[serde(skip)]
    version: u64,
    #[serde(skip)]
    finalized: bool,
}

impl Voucher {
    /// Open a voucher from an intake record; original quantities are fixed here.
    pub fn open(intake: VoucherIntake) -> Result<Self, DomainError> {
        if intake.lines.is_empty() {
            return Err(DomainError::validation(format!(
                "voucher {} has no lines",
                intake.id
            )));
        }

        let lines = intake
            .lines
            .into_iter()
            .map(|l| Quantity::new(l.quantity).map(|q| VoucherLine::new(l.material, q)))
            .collect::<Result<Vec<_>, _>>()?;

        // Keeps `pending_total` and every per-line sum in range.
        let total = lines
            .iter()
            .try_fold(0i64, |acc, l| acc.checked_add(l.original_quantity));
        if total.is_none() {
            return Err(DomainError::invalid_quantity(format!(
                "voucher {} expects more units than can be counted",
                intake.id
            )));
        }

        Ok(Self {
            id: intake.id,
            supplier: intake.supplier,
            date: intake.date,
            lines,
            version: 0,
            finalized: false,
        })
    }

    pub fn supplier(&self) -> &str {
        &self.supplier
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn lines(&self) -> &[VoucherLine] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&VoucherLine> {
        self.lines.get(index)
    }

    /// Units still waiting to be allocated, across all lines. Bounded by the
    /// intake total checked in [`Voucher::open`].
    pub fn pending_total(&self) -> i64 {
        self.lines.iter().map(|l| l.pending_quantity).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.lines.iter().all(|l| l.pending_quantity == 0)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl AggregateRoot for Voucher {
    type Id = VoucherId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AllocateStock.
///
/// `quantity` is raw operator input; anything above the line's pending quantity
/// is clamped down to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateStock {
    pub voucher_id: VoucherId,
    pub line_index: usize,
    pub container_id: ContainerId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FinalizeVoucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeVoucher {
    pub voucher_id: VoucherId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceivingCommand {
    AllocateStock(AllocateStock),
    FinalizeVoucher(FinalizeVoucher),
}

/// Event: StockAllocated.
///
/// Carries the material so the inventory index can credit the container
/// without looking the voucher up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAllocated {
    pub voucher_id: VoucherId,
    pub line_index: usize,
    pub material: MaterialCode,
    pub container_id: ContainerId,
    pub requested: i64,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VoucherFinalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherFinalized {
    pub voucher_id: VoucherId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceivingEvent {
    StockAllocated(StockAllocated),
    VoucherFinalized(VoucherFinalized),
}

impl Event for ReceivingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReceivingEvent::StockAllocated(_) => "receiving.voucher.stock_allocated",
            ReceivingEvent::VoucherFinalized(_) => "receiving.voucher.finalized",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReceivingEvent::StockAllocated(e) => e.occurred_at,
            ReceivingEvent::VoucherFinalized(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Voucher {
    type Command = ReceivingCommand;
    type Event = ReceivingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReceivingEvent::StockAllocated(e) => {
                if let Some(line) = self.lines.get_mut(e.line_index) {
                    line.pending_quantity -= e.quantity;
                    line.allocations.push(Allocation {
                        container_id: e.container_id.clone(),
                        quantity: e.quantity,
                    });
                }
            }
            ReceivingEvent::VoucherFinalized(_) => {
                self.finalized = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReceivingCommand::AllocateStock(cmd) => self.handle_allocate(cmd),
            ReceivingCommand::FinalizeVoucher(cmd) => self.handle_finalize(cmd),
        }
    }
}

impl Voucher {
    fn ensure_active(&self, voucher_id: &VoucherId) -> Result<(), DomainError> {
        if self.id != *voucher_id {
            return Err(DomainError::invariant("voucher_id mismatch"));
        }
        // A finalized voucher has left the active set.
        if self.finalized {
            return Err(DomainError::not_found(format!("voucher {voucher_id}")));
        }
        Ok(())
    }

    fn handle_allocate(&self, cmd: &AllocateStock) -> Result<Vec<ReceivingEvent>, DomainError> {
        self.ensure_active(&cmd.voucher_id)?;

        let line = self.lines.get(cmd.line_index).ok_or_else(|| {
            DomainError::not_found(format!("line {} of voucher {}", cmd.line_index, self.id))
        })?;

        let requested = Quantity::new(cmd.quantity)?;
        let applied = requested.clamp_to(line.pending_quantity).ok_or_else(|| {
            DomainError::invalid_quantity(format!(
                "line {} of voucher {} has nothing pending",
                cmd.line_index, self.id
            ))
        })?;

        Ok(vec![ReceivingEvent::StockAllocated(StockAllocated {
            voucher_id: cmd.voucher_id.clone(),
            line_index: cmd.line_index,
            material: line.material.clone(),
            container_id: cmd.container_id.clone(),
            requested: requested.get(),
            quantity: applied.get(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_finalize(&self, cmd: &FinalizeVoucher) -> Result<Vec<ReceivingEvent>, DomainError> {
        self.ensure_active(&cmd.voucher_id)?;

        let pending = self.pending_total();
        if pending > 0 {
            return Err(DomainError::PendingItemsRemain {
                voucher: self.id.to_string(),
                pending,
            });
        }

        Ok(vec![ReceivingEvent::VoucherFinalized(VoucherFinalized {
            voucher_id: cmd.voucher_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
