//! Receiving ledger: the active vouchers and the allocation of their lines.
//!
//! Each voucher sits behind its own mutex; the mutex is held from decision to
//! commit, so two allocations against the same voucher never both see the same
//! pending quantity. Vouchers are independent of each other.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use wms_core::{
    Aggregate, AggregateRoot, ContainerId, DomainError, ExpectedVersion, MaterialCode, VoucherId,
};
use wms_events::{EventBus, EventEnvelope};
use wms_receiving::{
    AllocateStock, Allocation, FinalizeVoucher, ReceivingCommand, ReceivingEvent, VOUCHER_STREAM,
    Voucher,
};

use crate::error::{LedgerError, LedgerResult};
use crate::event_store::{EventStore, InMemoryEventStore, StoredEvent};
use crate::journal::{EnvelopeBus, Journal};

/// Result of a successful allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationRecord {
    pub voucher_id: VoucherId,
    pub line_index: usize,
    pub material: MaterialCode,
    /// The appended allocation; its quantity is the clamped one.
    pub allocation: Allocation,
    pub requested: i64,
    pub pending_after: i64,
    pub position: u64,
    pub recorded_at: DateTime<Utc>,
}

impl AllocationRecord {
    pub fn was_clamped(&self) -> bool {
        self.allocation.quantity < self.requested
    }
}

/// Result of a successful finalize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoucherCompleted {
    pub voucher_id: VoucherId,
    pub position: u64,
    pub recorded_at: DateTime<Utc>,
}

type VoucherSlot = Arc<Mutex<Voucher>>;

#[derive(Debug)]
pub struct ReceivingLedger<S = InMemoryEventStore, B = EnvelopeBus> {
    journal: Arc<Journal<S, B>>,
    vouchers: RwLock<BTreeMap<VoucherId, VoucherSlot>>,
}

impl<S, B> ReceivingLedger<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(journal: Arc<Journal<S, B>>) -> Self {
        Self {
            journal,
            vouchers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Ledger seeded with intake vouchers.
    pub fn with_vouchers(
        journal: Arc<Journal<S, B>>,
        vouchers: impl IntoIterator<Item = Voucher>,
    ) -> LedgerResult<Self> {
        let ledger = Self::new(journal);
        for voucher in vouchers {
            ledger.register(voucher)?;
        }
        Ok(ledger)
    }

    /// Add a voucher from the intake feed.
    ///
    /// Ids are unique for the life of the log: an id that is active, or that
    /// already has committed events, is a conflict.
    pub fn register(&self, voucher: Voucher) -> LedgerResult<()> {
        let id = voucher.id().clone();
        let mut vouchers = self
            .vouchers
            .write()
            .map_err(|_| LedgerError::Poisoned("voucher registry"))?;

        if vouchers.contains_key(&id)
            || self.journal.stream_version(VOUCHER_STREAM, id.as_str())? > 0
        {
            return Err(DomainError::conflict(format!("voucher {id} already registered")).into());
        }

        info!(
            voucher = %id,
            supplier = %voucher.supplier(),
            lines = voucher.lines().len(),
            pending = voucher.pending_total(),
            "voucher registered"
        );
        vouchers.insert(id, Arc::new(Mutex::new(voucher)));
        Ok(())
    }

    /// Active vouchers ordered by id, optionally filtered by id substring.
    pub fn list_vouchers(&self, filter: Option<&str>) -> LedgerResult<Vec<Voucher>> {
        let slots: Vec<VoucherSlot> = {
            let vouchers = self
                .vouchers
                .read()
                .map_err(|_| LedgerError::Poisoned("voucher registry"))?;
            vouchers
                .iter()
                .filter(|(id, _)| filter.is_none_or(|f| id.as_str().contains(f)))
                .map(|(_, slot)| Arc::clone(slot))
                .collect()
        };

        let mut listed = Vec::with_capacity(slots.len());
        for slot in slots {
            let voucher = lock(&slot)?;
            if !voucher.is_finalized() {
                listed.push(voucher.clone());
            }
        }
        Ok(listed)
    }

    pub fn get_voucher(&self, id: &VoucherId) -> LedgerResult<Voucher> {
        let slot = self.slot(id)?;
        let voucher = lock(&slot)?;
        if voucher.is_finalized() {
            return Err(not_found(id));
        }
        Ok(voucher.clone())
    }

    /// Allocate part of a line's pending quantity into a container.
    ///
    /// A quantity above what is pending is clamped down to it; the record shows
    /// both the requested and the applied quantity.
    pub fn allocate(
        &self,
        voucher_id: &VoucherId,
        line_index: usize,
        container_id: &ContainerId,
        quantity: i64,
    ) -> LedgerResult<AllocationRecord> {
        let slot = self.slot(voucher_id)?;
        let mut voucher = lock(&slot)?;

        let command = ReceivingCommand::AllocateStock(AllocateStock {
            voucher_id: voucher_id.clone(),
            line_index,
            container_id: container_id.clone(),
            quantity,
            occurred_at: Utc::now(),
        });

        let (event, stored) = self.execute(&mut voucher, &command).inspect_err(|err| {
            debug!(
                voucher = %voucher_id,
                line = line_index,
                container = %container_id,
                quantity,
                error = %err,
                "allocation rejected"
            );
        })?;

        let ReceivingEvent::StockAllocated(allocated) = event else {
            return Err(DomainError::invariant("allocation produced no StockAllocated").into());
        };
        let pending_after = voucher
            .line(line_index)
            .map(|l| l.pending_quantity())
            .unwrap_or(0);

        info!(
            voucher = %voucher_id,
            line = line_index,
            material = %allocated.material,
            container = %container_id,
            requested = allocated.requested,
            quantity = allocated.quantity,
            pending = pending_after,
            position = stored.position,
            "stock allocated"
        );

        Ok(AllocationRecord {
            voucher_id: voucher_id.clone(),
            line_index,
            material: allocated.material,
            allocation: Allocation {
                container_id: allocated.container_id,
                quantity: allocated.quantity,
            },
            requested: allocated.requested,
            pending_after,
            position: stored.position,
            recorded_at: stored.recorded_at,
        })
    }

    /// Close a voucher whose lines are all fully allocated and drop it from
    /// the active set.
    pub fn finalize(&self, voucher_id: &VoucherId) -> LedgerResult<VoucherCompleted> {
        let slot = self.slot(voucher_id)?;

        let stored = {
            let mut voucher = lock(&slot)?;
            let command = ReceivingCommand::FinalizeVoucher(FinalizeVoucher {
                voucher_id: voucher_id.clone(),
                occurred_at: Utc::now(),
            });
            let (_, stored) = self.execute(&mut voucher, &command).inspect_err(|err| {
                debug!(voucher = %voucher_id, error = %err, "finalize rejected");
            })?;
            stored
        };

        // The voucher is already marked finalized, so anyone racing us between
        // the unlock above and the removal below gets NotFound.
        self.vouchers
            .write()
            .map_err(|_| LedgerError::Poisoned("voucher registry"))?
            .remove(voucher_id);

        info!(voucher = %voucher_id, position = stored.position, "voucher finalized");

        Ok(VoucherCompleted {
            voucher_id: voucher_id.clone(),
            position: stored.position,
            recorded_at: stored.recorded_at,
        })
    }

    fn slot(&self, id: &VoucherId) -> LedgerResult<VoucherSlot> {
        let vouchers = self
            .vouchers
            .read()
            .map_err(|_| LedgerError::Poisoned("voucher registry"))?;
        vouchers.get(id).cloned().ok_or_else(|| not_found(id))
    }

    /// Decide, commit, then evolve the in-memory voucher.
    fn execute(
        &self,
        voucher: &mut Voucher,
        command: &ReceivingCommand,
    ) -> LedgerResult<(ReceivingEvent, StoredEvent)> {
        let events = voucher.handle(command)?;
        let committed = self.journal.commit(
            VOUCHER_STREAM,
            voucher.id().as_str(),
            ExpectedVersion::Exact(voucher.version()),
            &events,
        )?;

        for event in &events {
            voucher.apply(event);
        }

        match (events.into_iter().next(), committed.into_iter().next()) {
            (Some(event), Some(stored)) => Ok((event, stored)),
            _ => Err(DomainError::invariant("command produced no events").into()),
        }
    }
}

fn lock(slot: &Mutex<Voucher>) -> LedgerResult<MutexGuard<'_, Voucher>> {
    slot.lock().map_err(|_| LedgerError::Poisoned("voucher"))
}

fn not_found(id: &VoucherId) -> LedgerError {
    DomainError::not_found(format!("voucher {id}")).into()
}
