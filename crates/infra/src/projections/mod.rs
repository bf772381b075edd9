//! Read models folded from the event log.
//!
//! Projections are:
//! - **Rebuildable**: can be reconstructed from the full log at any time
//! - **Idempotent**: events at or below the cursor are ignored

pub mod inventory_index;

pub use inventory_index::{ContainerEntry, IndexError, InventoryIndex, Placement, SharedIndex};
