//! `wms-core`: domain foundation building blocks for the warehouse ledger.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod quantity;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{ContainerId, MaterialCode, VoucherId};
pub use quantity::{MaterialQuantity, Quantity};
