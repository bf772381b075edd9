use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use wms_core::{ContainerId, MaterialCode, MaterialQuantity};
use wms_inventory::{CONTAINER_STREAM, Container, ContainerEvent, LocationId};
use wms_receiving::{ReceivingEvent, VOUCHER_STREAM};

use crate::event_store::{StoredEvent, UncommittedEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("failed to decode {event_type} at position {position}: {reason}")]
    Decode {
        event_type: String,
        position: u64,
        reason: String,
    },

    #[error("non-monotonic position (last={last}, found={found})")]
    NonMonotonicPosition { last: u64, found: u64 },

    #[error("{material} in {container} would drop to {would_be}")]
    NegativeStock {
        container: ContainerId,
        material: MaterialCode,
        would_be: i64,
    },

    #[error("quantity of {material} exceeds the representable range")]
    Overflow { material: MaterialCode },
}

/// What the index knows about one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerEntry {
    pub location: Option<LocationId>,
    pub stock: BTreeMap<MaterialCode, i64>,
}

/// One `byMaterial` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub container: ContainerId,
    pub location: Option<LocationId>,
    pub quantity: i64,
}

/// Derived read model over containers, materials and locations.
///
/// Folded from committed events. Every cell kept is strictly positive; a cell
/// that reaches zero is removed. Containers stay known once referenced, even
/// when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryIndex {
    containers: BTreeMap<ContainerId, ContainerEntry>,
    by_material: BTreeMap<MaterialCode, BTreeMap<ContainerId, i64>>,
    position: u64,
}

/// Stock change on one `(container, material)` cell.
struct Delta<'a> {
    container: &'a ContainerId,
    material: &'a MaterialCode,
    amount: i64,
}

/// Validated effect of one event, ready to be written.
#[derive(Debug)]
enum Change {
    Nothing,
    Stock(BTreeMap<(ContainerId, MaterialCode), i64>),
    Location {
        container: ContainerId,
        to: LocationId,
    },
}

impl InventoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the whole log into a fresh index.
    ///
    /// Events are applied in `(recorded_at, position)` order, which is also the
    /// order they were committed in.
    pub fn rebuild(events: impl IntoIterator<Item = StoredEvent>) -> Result<Self, IndexError> {
        let mut events: Vec<_> = events.into_iter().collect();
        events.sort_by_key(|e| (e.recorded_at, e.position));

        let mut index = Self::new();
        for event in &events {
            index.apply(event)?;
        }
        Ok(index)
    }

    /// Global position of the last applied event (0 = nothing applied).
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Apply one committed event.
    ///
    /// Events at or below the cursor are ignored (replays). A gap in positions
    /// is an error. A rejected event leaves the index untouched.
    pub fn apply(&mut self, event: &StoredEvent) -> Result<(), IndexError> {
        if event.position <= self.position {
            return Ok(());
        }
        if event.position != self.position + 1 {
            return Err(IndexError::NonMonotonicPosition {
                last: self.position,
                found: event.position,
            });
        }

        let change = self.plan(
            &event.stream_type,
            &event.event_type,
            event.position,
            &event.payload,
        )?;
        self.write(change);
        self.position = event.position;
        Ok(())
    }

    /// Check that `events`, committed next and in order, would be accepted.
    /// The index itself is not changed.
    pub fn check(&self, events: &[UncommittedEvent]) -> Result<(), IndexError> {
        let next = self.position + 1;
        match events {
            [] => Ok(()),
            [event] => self
                .plan(&event.stream_type, &event.event_type, next, &event.payload)
                .map(|_| ()),
            _ => {
                let mut staged = self.clone();
                for (position, event) in (next..).zip(events) {
                    let change =
                        staged.plan(&event.stream_type, &event.event_type, position, &event.payload)?;
                    staged.write(change);
                }
                Ok(())
            }
        }
    }

    fn plan(
        &self,
        stream_type: &str,
        event_type: &str,
        position: u64,
        payload: &JsonValue,
    ) -> Result<Change, IndexError> {
        match stream_type {
            VOUCHER_STREAM => match decode::<ReceivingEvent>(event_type, position, payload)? {
                ReceivingEvent::StockAllocated(e) => {
                    positive(event_type, position, e.quantity)?;
                    self.plan_stock(&[Delta {
                        container: &e.container_id,
                        material: &e.material,
                        amount: e.quantity,
                    }])
                }
                ReceivingEvent::VoucherFinalized(_) => Ok(Change::Nothing),
            },
            CONTAINER_STREAM => match decode::<ContainerEvent>(event_type, position, payload)? {
                ContainerEvent::StockDispatched(e) => {
                    for l in &e.lines {
                        positive(event_type, position, l.quantity)?;
                    }
                    let deltas: Vec<_> = debits(&e.container_id, &e.lines).collect();
                    self.plan_stock(&deltas)
                }
                ContainerEvent::ContainerRelocated(e) => Ok(Change::Location {
                    container: e.container_id,
                    to: e.to,
                }),
                ContainerEvent::MaterialRelocated(e) => {
                    for l in &e.lines {
                        positive(event_type, position, l.quantity)?;
                    }
                    let mut deltas: Vec<_> = debits(&e.source, &e.lines).collect();
                    deltas.extend(e.lines.iter().map(|l| Delta {
                        container: &e.destination,
                        material: &l.material,
                        amount: l.quantity,
                    }));
                    self.plan_stock(&deltas)
                }
            },
            // Streams this index does not fold.
            _ => Ok(Change::Nothing),
        }
    }

    /// Resulting cell values for a set of deltas.
    ///
    /// Every cell stays non-negative and every material total stays
    /// representable, so later sums over the index cannot overflow.
    fn plan_stock(&self, deltas: &[Delta<'_>]) -> Result<Change, IndexError> {
        let mut after: BTreeMap<(ContainerId, MaterialCode), i64> = BTreeMap::new();
        let mut net: BTreeMap<&MaterialCode, i64> = BTreeMap::new();

        for d in deltas {
            let key = (d.container.clone(), d.material.clone());
            let current = match after.get(&key) {
                Some(q) => *q,
                None => self.held(d.container, d.material),
            };
            let next = current
                .checked_add(d.amount)
                .ok_or_else(|| IndexError::Overflow {
                    material: d.material.clone(),
                })?;
            if next < 0 {
                return Err(IndexError::NegativeStock {
                    container: d.container.clone(),
                    material: d.material.clone(),
                    would_be: next,
                });
            }
            after.insert(key, next);

            let sum = net.entry(d.material).or_insert(0);
            *sum = sum.checked_add(d.amount).ok_or_else(|| IndexError::Overflow {
                material: d.material.clone(),
            })?;
        }

        for (material, change) in net {
            if self.material_total(material).checked_add(change).is_none() {
                return Err(IndexError::Overflow {
                    material: material.clone(),
                });
            }
        }

        Ok(Change::Stock(after))
    }

    fn write(&mut self, change: Change) {
        match change {
            Change::Nothing => {}
            Change::Location { container, to } => {
                self.containers.entry(container).or_default().location = Some(to);
            }
            Change::Stock(after) => {
                for ((container, material), quantity) in after {
                    let per_material = self.by_material.entry(material.clone()).or_default();
                    if quantity == 0 {
                        per_material.remove(&container);
                        if per_material.is_empty() {
                            self.by_material.remove(&material);
                        }
                        self.containers
                            .entry(container)
                            .or_default()
                            .stock
                            .remove(&material);
                    } else {
                        per_material.insert(container.clone(), quantity);
                        self.containers
                            .entry(container)
                            .or_default()
                            .stock
                            .insert(material, quantity);
                    }
                }
            }
        }
    }

    fn held(&self, container: &ContainerId, material: &MaterialCode) -> i64 {
        self.containers
            .get(container)
            .and_then(|c| c.stock.get(material))
            .copied()
            .unwrap_or(0)
    }

    /// `byContainer`; `None` if the container was never referenced.
    pub fn container(&self, id: &ContainerId) -> Option<&ContainerEntry> {
        self.containers.get(id)
    }

    /// Container aggregate state as of the last applied event.
    pub fn container_state(&self, id: &ContainerId) -> Container {
        match self.containers.get(id) {
            Some(entry) => Container::from_snapshot(
                id.clone(),
                entry.location.clone(),
                entry.stock.iter().map(|(m, q)| (m.clone(), *q)),
            ),
            None => Container::empty(id.clone()),
        }
    }

    /// `byMaterial`: every container holding `material`, ordered by container id.
    pub fn placements(&self, material: &MaterialCode) -> Vec<Placement> {
        let Some(holders) = self.by_material.get(material) else {
            return Vec::new();
        };
        holders
            .iter()
            .map(|(container, quantity)| Placement {
                container: container.clone(),
                location: self
                    .containers
                    .get(container)
                    .and_then(|c| c.location.clone()),
                quantity: *quantity,
            })
            .collect()
    }

    pub fn available(&self, container: &ContainerId, material: &MaterialCode) -> i64 {
        self.held(container, material)
    }

    pub fn material_total(&self, material: &MaterialCode) -> i64 {
        self.by_material
            .get(material)
            .map(|holders| holders.values().sum())
            .unwrap_or(0)
    }

    /// Total held per material, across all containers.
    pub fn totals(&self) -> BTreeMap<MaterialCode, i64> {
        self.by_material
            .iter()
            .map(|(m, holders)| (m.clone(), holders.values().sum()))
            .collect()
    }

    pub fn containers(&self) -> impl Iterator<Item = (&ContainerId, &ContainerEntry)> {
        self.containers.iter()
    }
}

fn debits<'a>(
    container: &'a ContainerId,
    lines: &'a [MaterialQuantity],
) -> impl Iterator<Item = Delta<'a>> {
    lines.iter().map(move |l| Delta {
        container,
        material: &l.material,
        amount: -l.quantity,
    })
}

/// Movement quantities in the log are strictly positive.
fn positive(event_type: &str, position: u64, quantity: i64) -> Result<(), IndexError> {
    if quantity > 0 {
        return Ok(());
    }
    Err(IndexError::Decode {
        event_type: event_type.to_string(),
        position,
        reason: format!("non-positive quantity {quantity}"),
    })
}

fn decode<T: serde::de::DeserializeOwned>(
    event_type: &str,
    position: u64,
    payload: &JsonValue,
) -> Result<T, IndexError> {
    T::deserialize(payload).map_err(|e| IndexError::Decode {
        event_type: event_type.to_string(),
        position,
        reason: e.to_string(),
    })
}

/// Index shared between the commit pipeline (writer) and readers.
///
/// Readers take short read locks or clone a snapshot; the writer holds the
/// write lock only while folding one commit, so no reader sees half of it.
#[derive(Debug, Clone, Default)]
pub struct SharedIndex {
    inner: Arc<RwLock<InventoryIndex>>,
}

impl SharedIndex {
    pub fn new(index: InventoryIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    /// Short read access. A poisoned lock still yields the last complete state,
    /// since every apply validates before it mutates.
    pub fn read(&self) -> RwLockReadGuard<'_, InventoryIndex> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> InventoryIndex {
        self.read().clone()
    }

    /// Apply a committed batch as one unit.
    pub fn apply_batch(&self, events: &[StoredEvent]) -> Result<(), IndexError> {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // A single event is applied all-or-nothing already.
        if let [event] = events {
            return guard.apply(event);
        }

        let mut next = guard.clone();
        for event in events {
            next.apply(event)?;
        }
        *guard = next;
        Ok(())
    }

    pub fn replace(&self, index: InventoryIndex) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = index;
    }
}
