//! Movement engine: dispatch to consumption and relocation.
//!
//! Container state is read from the inventory index while the container's
//! lock is held, so the availability check and the commit see the same stock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use wms_core::{Aggregate, ContainerId, DomainError, ExpectedVersion, MaterialQuantity};
use wms_events::{EventBus, EventEnvelope};
use wms_inventory::{
    CONTAINER_STREAM, ContainerCommand, ContainerEvent, DispatchStock, LocationId, LocationNamer,
    RelocateContainer, RelocateMaterial,
};

use crate::error::{LedgerError, LedgerResult};
use crate::event_store::{EventStore, InMemoryEventStore, StoredEvent};
use crate::journal::{EnvelopeBus, Journal};
use crate::locks::KeyedLocks;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchRecord {
    pub container_id: ContainerId,
    pub destination: LocationId,
    /// Dispatched lines, one per material.
    pub lines: Vec<MaterialQuantity>,
    pub position: u64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelocationTarget {
    /// The whole container moved to a storage slot.
    Location {
        from: Option<LocationId>,
        to: LocationId,
    },
    /// Selected material moved into another container.
    Container {
        destination: ContainerId,
        lines: Vec<MaterialQuantity>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocationRecord {
    pub container_id: ContainerId,
    pub target: RelocationTarget,
    pub position: u64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct MovementEngine<S = InMemoryEventStore, B = EnvelopeBus> {
    journal: Arc<Journal<S, B>>,
    namer: LocationNamer,
    locks: KeyedLocks<ContainerId>,
}

impl<S, B> MovementEngine<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(journal: Arc<Journal<S, B>>, namer: LocationNamer) -> Self {
        Self {
            journal,
            namer,
            locks: KeyedLocks::new(),
        }
    }

    pub fn namer(&self) -> &LocationNamer {
        &self.namer
    }

    /// Send the selected quantities to the consumption sink.
    ///
    /// All or nothing: one line over what the container holds rejects the lot.
    pub fn dispatch(
        &self,
        container_id: &ContainerId,
        selections: &[MaterialQuantity],
    ) -> LedgerResult<DispatchRecord> {
        let destination = self.namer.consumption();
        let command = ContainerCommand::DispatchStock(DispatchStock {
            container_id: container_id.clone(),
            lines: selections.to_vec(),
            destination: destination.clone(),
            occurred_at: Utc::now(),
        });

        let (event, stored) = self
            .locks
            .with_lock(container_id, || self.execute(container_id, &command))
            .inspect_err(|err| {
                debug!(container = %container_id, error = %err, "dispatch rejected");
            })?;

        let ContainerEvent::StockDispatched(dispatched) = event else {
            return Err(unexpected("StockDispatched"));
        };

        info!(
            container = %container_id,
            destination = %destination,
            lines = ?dispatched.lines,
            position = stored.position,
            "stock dispatched"
        );

        Ok(DispatchRecord {
            container_id: container_id.clone(),
            destination,
            lines: dispatched.lines,
            position: stored.position,
            recorded_at: stored.recorded_at,
        })
    }

    /// Move a container to a storage slot. Held quantities are untouched.
    pub fn relocate_container(
        &self,
        container_id: &ContainerId,
        new_location: &str,
    ) -> LedgerResult<RelocationRecord> {
        let to = self.namer.location(new_location).inspect_err(|err| {
            debug!(container = %container_id, location = new_location, error = %err, "relocation rejected");
        })?;

        let command = ContainerCommand::RelocateContainer(RelocateContainer {
            container_id: container_id.clone(),
            to,
            occurred_at: Utc::now(),
        });

        let (event, stored) = self
            .locks
            .with_lock(container_id, || self.execute(container_id, &command))?;

        let ContainerEvent::ContainerRelocated(relocated) = event else {
            return Err(unexpected("ContainerRelocated"));
        };

        info!(
            container = %container_id,
            from = ?relocated.from.as_ref().map(LocationId::as_str),
            to = %relocated.to,
            position = stored.position,
            "container relocated"
        );

        Ok(RelocationRecord {
            container_id: container_id.clone(),
            target: RelocationTarget::Location {
                from: relocated.from,
                to: relocated.to,
            },
            position: stored.position,
            recorded_at: stored.recorded_at,
        })
    }

    /// Transfer selected quantities from one container into another.
    ///
    /// The destination is created on first use. Both containers are locked,
    /// in id order.
    pub fn relocate_material(
        &self,
        source: &ContainerId,
        selections: &[MaterialQuantity],
        destination: &ContainerId,
    ) -> LedgerResult<RelocationRecord> {
        if source == destination {
            debug!(container = %source, "material relocation into the same container rejected");
            return Err(DomainError::SameContainer(source.to_string()).into());
        }

        let command = ContainerCommand::RelocateMaterial(RelocateMaterial {
            source: source.clone(),
            destination: destination.clone(),
            lines: selections.to_vec(),
            occurred_at: Utc::now(),
        });

        let (event, stored) = self
            .locks
            .with_locks(&[source, destination], || self.execute(source, &command))
            .inspect_err(|err| {
                debug!(source = %source, destination = %destination, error = %err, "material relocation rejected");
            })?;

        let ContainerEvent::MaterialRelocated(relocated) = event else {
            return Err(unexpected("MaterialRelocated"));
        };

        info!(
            source = %source,
            destination = %destination,
            lines = ?relocated.lines,
            position = stored.position,
            "material relocated"
        );

        Ok(RelocationRecord {
            container_id: source.clone(),
            target: RelocationTarget::Container {
                destination: relocated.destination,
                lines: relocated.lines,
            },
            position: stored.position,
            recorded_at: stored.recorded_at,
        })
    }

    /// Load, decide and commit against `container_id`. Caller holds its lock.
    fn execute(
        &self,
        container_id: &ContainerId,
        command: &ContainerCommand,
    ) -> LedgerResult<(ContainerEvent, StoredEvent)> {
        let container = {
            let index = self.journal.index().read();
            // Relocating a container may bring it into existence; taking stock
            // out of one requires that it was referenced before.
            let must_exist = !matches!(command, ContainerCommand::RelocateContainer(_));
            if must_exist && index.container(container_id).is_none() {
                return Err(DomainError::not_found(format!("container {container_id}")).into());
            }
            index.container_state(container_id)
        };
        let events = container.handle(command)?;

        // Container locks serialize writers; the stream version is not the
        // concurrency token because allocations credit containers from voucher
        // streams.
        let committed = self.journal.commit(
            CONTAINER_STREAM,
            container_id.as_str(),
            ExpectedVersion::Any,
            &events,
        )?;

        match (events.into_iter().next(), committed.into_iter().next()) {
            (Some(event), Some(stored)) => Ok((event, stored)),
            _ => Err(DomainError::invariant("movement produced no events").into()),
        }
    }
}

fn unexpected(wanted: &str) -> LedgerError {
    DomainError::invariant(format!("movement did not produce {wanted}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wms_core::{MaterialCode, VoucherId};
    use wms_receiving::{ReceivingEvent, StockAllocated, VOUCHER_STREAM};

    fn cid(raw: &str) -> ContainerId {
        ContainerId::new(raw).unwrap()
    }

    fn mat(raw: &str) -> MaterialCode {
        MaterialCode::new(raw).unwrap()
    }

    fn line(material: &str, quantity: i64) -> MaterialQuantity {
        MaterialQuantity::new(mat(material), quantity)
    }

    /// Engine whose log already credits `container` with `stock`.
    fn engine_with(container: &str, stock: &[(&str, i64)]) -> MovementEngine {
        let journal = Arc::new(Journal::in_memory());
        for (i, (material, quantity)) in stock.iter().enumerate() {
            let event = ReceivingEvent::StockAllocated(StockAllocated {
                voucher_id: VoucherId::new("SEED").unwrap(),
                line_index: i,
                material: mat(material),
                container_id: cid(container),
                requested: *quantity,
                quantity: *quantity,
                occurred_at: Utc::now(),
            });
            journal
                .commit(VOUCHER_STREAM, "SEED", ExpectedVersion::Any, &[event])
                .unwrap();
        }
        MovementEngine::new(journal, LocationNamer::default())
    }

    fn held(engine: &MovementEngine, container: &str, material: &str) -> i64 {
        engine
            .journal
            .index()
            .read()
            .available(&cid(container), &mat(material))
    }

    #[test]
    fn dispatch_goes_to_the_consumption_sink() {
        let engine = engine_with("C1", &[("M1", 5)]);
        let record = engine.dispatch(&cid("C1"), &[line("M1", 2)]).unwrap();

        assert_eq!(record.destination.as_str(), "ALM01-CON01-EST01-NIV01");
        assert_eq!(record.lines, vec![line("M1", 2)]);
        assert_eq!(held(&engine, "C1", "M1"), 3);
    }

    #[test]
    fn moving_stock_out_of_an_unknown_container_is_not_found() {
        let engine = engine_with("C1", &[("M1", 5)]);

        let err = engine.dispatch(&cid("C9"), &[line("M1", 1)]).unwrap_err();
        assert_eq!(
            err.domain(),
            Some(&DomainError::NotFound("container C9".to_string()))
        );

        let err = engine
            .relocate_material(&cid("C9"), &[line("M1", 1)], &cid("C1"))
            .unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::NotFound(_))));
        assert_eq!(held(&engine, "C1", "M1"), 5);
        assert!(engine.journal.index().read().container(&cid("C9")).is_none());
    }

    #[test]
    fn known_but_empty_container_reports_insufficient_quantity() {
        let engine = engine_with("C1", &[("M1", 1)]);
        engine.dispatch(&cid("C1"), &[line("M1", 1)]).unwrap();

        let err = engine.dispatch(&cid("C1"), &[line("M1", 1)]).unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(DomainError::InsufficientQuantity { available: 0, .. })
        ));
    }

    #[test]
    fn container_locks_are_released_after_each_movement() {
        let engine = engine_with("C1", &[("M1", 10)]);
        for n in 2..7 {
            engine
                .relocate_material(&cid("C1"), &[line("M1", 1)], &cid(&format!("C{n}")))
                .unwrap();
            engine
                .relocate_container(&cid(&format!("C{n}")), "ALM01-ZNA01-EST01-NIV01")
                .unwrap();
        }
        engine.dispatch(&cid("C1"), &[line("M1", 5)]).unwrap();

        assert!(engine.locks.is_empty());
    }

    #[test]
    fn relocate_container_validates_and_keeps_stock() {
        let engine = engine_with("C1", &[("M1", 5)]);

        let err = engine
            .relocate_container(&cid("C1"), "ALM01-CON01-EST01-NIV01")
            .unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::MalformedLocation(_))));

        let record = engine
            .relocate_container(&cid("C1"), "ALM01-ZNC15-EST03-NIV02")
            .unwrap();
        assert_eq!(
            record.target,
            RelocationTarget::Location {
                from: None,
                to: engine.namer().location("ALM01-ZNC15-EST03-NIV02").unwrap(),
            }
        );
        assert_eq!(held(&engine, "C1", "M1"), 5);
    }

    #[test]
    fn relocate_material_creates_the_destination() {
        let engine = engine_with("C1", &[("M1", 5), ("M2", 2)]);

        engine
            .relocate_material(&cid("C1"), &[line("M1", 5), line("M2", 1)], &cid("C2"))
            .unwrap();

        assert_eq!(held(&engine, "C1", "M1"), 0);
        assert_eq!(held(&engine, "C1", "M2"), 1);
        assert_eq!(held(&engine, "C2", "M1"), 5);
        assert_eq!(held(&engine, "C2", "M2"), 1);
    }

    #[test]
    fn same_container_is_checked_before_quantities() {
        let engine = engine_with("C1", &[("M1", 5)]);
        let err = engine
            .relocate_material(&cid("C1"), &[line("M1", 0)], &cid("C1"))
            .unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::SameContainer("C1".to_string())));
    }
}
