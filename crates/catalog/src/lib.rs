//! Material catalog: read-only descriptive metadata keyed by material code.
//!
//! The catalog never blocks an operation. Callers use it for display only and
//! fall back to the bare code when an entry is missing.

pub mod catalog;
pub mod material;

pub use catalog::{Catalog, CatalogError, InMemoryCatalog};
pub use material::Material;
