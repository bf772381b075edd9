//! Inventory domain module (event-sourced).
//!
//! Location naming and container movements (dispatch to consumption,
//! relocation of containers and of material between containers), implemented
//! purely as deterministic domain logic (no IO, no locks, no clock).

pub mod container;
pub mod location;

pub use container::{
    CONTAINER_STREAM, Container, ContainerCommand, ContainerEvent, ContainerRelocated,
    DispatchStock, MaterialRelocated, RelocateContainer, RelocateMaterial, StockDispatched,
};
pub use location::{
    DEFAULT_WAREHOUSE, LocationId, LocationNamer, StorageSlot, Zone, ZoneGroup,
};
