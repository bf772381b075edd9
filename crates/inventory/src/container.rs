use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wms_core::{
    Aggregate, AggregateRoot, ContainerId, DomainError, MaterialCode, MaterialQuantity, Quantity,
};
use wms_events::Event;

use crate::location::LocationId;

/// Stream type under which container movements are committed.
pub const CONTAINER_STREAM: &str = "inventory.container";

/// Aggregate root: Container (license plate number).
///
/// Containers are never registered explicitly; the first event that mentions
/// one brings it into existence. State is loaded from the inventory index at
/// command time rather than rehydrated from the container's own stream, because
/// allocations credit containers from voucher streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    id: ContainerId,
    location: Option<LocationId>,
    stock: BTreeMap<MaterialCode, i64>,
    version: u64,
}

impl Container {
    /// Empty, never-referenced container.
    pub fn empty(id: ContainerId) -> Self {
        Self {
            id,
            location: None,
            stock: BTreeMap::new(),
            version: 0,
        }
    }

    /// Container state as currently known to the read side.
    pub fn from_snapshot(
        id: ContainerId,
        location: Option<LocationId>,
        stock: impl IntoIterator<Item = (MaterialCode, i64)>,
    ) -> Self {
        Self {
            id,
            location,
            stock: stock.into_iter().filter(|(_, q)| *q > 0).collect(),
            version: 0,
        }
    }

    pub fn location(&self) -> Option<&LocationId> {
        self.location.as_ref()
    }

    pub fn available(&self, material: &MaterialCode) -> i64 {
        self.stock.get(material).copied().unwrap_or(0)
    }

    pub fn stock(&self) -> &BTreeMap<MaterialCode, i64> {
        &self.stock
    }

    fn take(&mut self, material: &MaterialCode, quantity: i64) {
        if let Some(held) = self.stock.get_mut(material) {
            *held -= quantity;
            if *held <= 0 {
                self.stock.remove(material);
            }
        }
    }

    fn put(&mut self, material: &MaterialCode, quantity: i64) {
        let held = self.stock.entry(material.clone()).or_insert(0);
        *held = held.saturating_add(quantity);
    }
}

impl AggregateRoot for Container {
    type Id = ContainerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: DispatchStock (container → consumption sink).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStock {
    pub container_id: ContainerId,
    pub lines: Vec<MaterialQuantity>,
    pub destination: LocationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RelocateContainer (container → storage slot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocateContainer {
    pub container_id: ContainerId,
    pub to: LocationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RelocateMaterial (container → container).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocateMaterial {
    pub source: ContainerId,
    pub destination: ContainerId,
    pub lines: Vec<MaterialQuantity>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerCommand {
    DispatchStock(DispatchStock),
    RelocateContainer(RelocateContainer),
    RelocateMaterial(RelocateMaterial),
}

/// Event: StockDispatched. The quantities leave inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDispatched {
    pub container_id: ContainerId,
    pub destination: LocationId,
    pub lines: Vec<MaterialQuantity>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ContainerRelocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRelocated {
    pub container_id: ContainerId,
    pub from: Option<LocationId>,
    pub to: LocationId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MaterialRelocated. Quantity-neutral transfer between containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRelocated {
    pub source: ContainerId,
    pub destination: ContainerId,
    pub lines: Vec<MaterialQuantity>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerEvent {
    StockDispatched(StockDispatched),
    ContainerRelocated(ContainerRelocated),
    MaterialRelocated(MaterialRelocated),
}

impl Event for ContainerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ContainerEvent::StockDispatched(_) => "inventory.container.stock_dispatched",
            ContainerEvent::ContainerRelocated(_) => "inventory.container.relocated",
            ContainerEvent::MaterialRelocated(_) => "inventory.container.material_relocated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ContainerEvent::StockDispatched(e) => e.occurred_at,
            ContainerEvent::ContainerRelocated(e) => e.occurred_at,
            ContainerEvent::MaterialRelocated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Container {
    type Command = ContainerCommand;
    type Event = ContainerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ContainerEvent::StockDispatched(e) => {
                for line in &e.lines {
                    self.take(&line.material, line.quantity);
                }
            }
            ContainerEvent::ContainerRelocated(e) => {
                self.location = Some(e.to.clone());
            }
            ContainerEvent::MaterialRelocated(e) => {
                for line in &e.lines {
                    if e.source == self.id {
                        self.take(&line.material, line.quantity);
                    }
                    if e.destination == self.id {
                        self.put(&line.material, line.quantity);
                    }
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ContainerCommand::DispatchStock(cmd) => self.handle_dispatch(cmd),
            ContainerCommand::RelocateContainer(cmd) => self.handle_relocate(cmd),
            ContainerCommand::RelocateMaterial(cmd) => self.handle_relocate_material(cmd),
        }
    }
}

impl Container {
    fn ensure_container_id(&self, container_id: &ContainerId) -> Result<(), DomainError> {
        if self.id != *container_id {
            return Err(DomainError::invariant("container_id mismatch"));
        }
        Ok(())
    }

    /// Validate a selection and check it against current stock.
    ///
    /// Duplicate materials are summed. Any line exceeding what is held rejects
    /// the whole selection.
    fn check_selection(
        &self,
        lines: &[MaterialQuantity],
    ) -> Result<Vec<MaterialQuantity>, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::invalid_quantity("nothing selected"));
        }

        let mut merged: BTreeMap<&MaterialCode, Quantity> = BTreeMap::new();
        for line in lines {
            let q = Quantity::new(line.quantity)?;
            let total = match merged.get(&line.material) {
                Some(sum) => sum.checked_add(q).ok_or_else(|| {
                    DomainError::invalid_quantity(format!(
                        "selected quantity of {} is out of range",
                        line.material
                    ))
                })?,
                None => q,
            };
            merged.insert(&line.material, total);
        }

        for (material, requested) in &merged {
            let requested = requested.get();
            let available = self.available(material);
            if requested > available {
                return Err(DomainError::InsufficientQuantity {
                    container: self.id.to_string(),
                    material: material.to_string(),
                    requested,
                    available,
                });
            }
        }

        Ok(merged
            .into_iter()
            .map(|(material, quantity)| MaterialQuantity::new(material.clone(), quantity.get()))
            .collect())
    }

    fn handle_dispatch(&self, cmd: &DispatchStock) -> Result<Vec<ContainerEvent>, DomainError> {
        self.ensure_container_id(&cmd.container_id)?;
        let lines = self.check_selection(&cmd.lines)?;

        Ok(vec![ContainerEvent::StockDispatched(StockDispatched {
            container_id: cmd.container_id.clone(),
            destination: cmd.destination.clone(),
            lines,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_relocate(&self, cmd: &RelocateContainer) -> Result<Vec<ContainerEvent>, DomainError> {
        self.ensure_container_id(&cmd.container_id)?;

        Ok(vec![ContainerEvent::ContainerRelocated(ContainerRelocated {
            container_id: cmd.container_id.clone(),
            from: self.location.clone(),
            to: cmd.to.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_relocate_material(
        &self,
        cmd: &RelocateMaterial,
    ) -> Result<Vec<ContainerEvent>, DomainError> {
        self.ensure_container_id(&cmd.source)?;

        if cmd.source == cmd.destination {
            return Err(DomainError::SameContainer(cmd.source.to_string()));
        }

        let lines = self.check_selection(&cmd.lines)?;

        Ok(vec![ContainerEvent::MaterialRelocated(MaterialRelocated {
            source: cmd.source.clone(),
            destination: cmd.destination.clone(),
            lines,
            occurred_at: cmd.occurred_at,
        })])
    }
}
