//! Infrastructure layer: event log, commit pipeline, read model and the
//! ledger services built on top of them.

pub mod config;
pub mod error;
pub mod event_store;
pub mod journal;
pub mod locks;
pub mod movement_engine;
pub mod projections;
pub mod query_service;
pub mod receiving_ledger;

mod integration_tests;

pub use config::{ConfigError, WarehouseConfig};
pub use error::{LedgerError, LedgerResult};
pub use journal::{EnvelopeBus, Journal};
pub use movement_engine::{DispatchRecord, MovementEngine, RelocationRecord, RelocationTarget};
pub use projections::{IndexError, InventoryIndex, SharedIndex};
pub use query_service::{
    ContainerLine, ContainerReport, InventoryReport, MaterialReport, PlacementRow, QueryService,
};
pub use receiving_ledger::{AllocationRecord, ReceivingLedger, VoucherCompleted};
