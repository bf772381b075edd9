//! Warehouse host: wiring, demo data and the operator-script runner.

pub mod fixtures;
pub mod script;
pub mod warehouse;

pub use script::{Operation, Outcome};
pub use warehouse::Warehouse;
