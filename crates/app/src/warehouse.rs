//! Application wiring: one journal shared by the ledger, the engine and the
//! query side.

use std::sync::Arc;

use anyhow::Context;

use wms_catalog::Catalog;
use wms_infra::{Journal, MovementEngine, QueryService, ReceivingLedger, WarehouseConfig};
use wms_receiving::Voucher;

use crate::fixtures;

#[derive(Debug)]
pub struct Warehouse {
    journal: Arc<Journal>,
    ledger: ReceivingLedger,
    engine: MovementEngine,
    query: QueryService,
}

impl Warehouse {
    pub fn new(
        config: &WarehouseConfig,
        catalog: Arc<dyn Catalog>,
        vouchers: impl IntoIterator<Item = Voucher>,
    ) -> anyhow::Result<Self> {
        let namer = config.namer()?;
        let journal = Arc::new(Journal::in_memory());

        let ledger = ReceivingLedger::with_vouchers(Arc::clone(&journal), vouchers)
            .context("registering intake vouchers")?;
        let engine = MovementEngine::new(Arc::clone(&journal), namer);
        let query = QueryService::new(journal.index().clone(), catalog);

        Ok(Self {
            journal,
            ledger,
            engine,
            query,
        })
    }

    /// Load catalog and vouchers as configured (demo data when unset).
    pub fn from_config(config: &WarehouseConfig) -> anyhow::Result<Self> {
        let catalog = fixtures::load_catalog(config.catalog_path.as_deref())?;
        let vouchers = fixtures::load_vouchers(config.vouchers_path.as_deref())?;
        Self::new(config, Arc::new(catalog), vouchers)
    }

    /// Default warehouse with the demo catalog and vouchers.
    pub fn demo() -> anyhow::Result<Self> {
        Self::from_config(&WarehouseConfig::default())
    }

    pub fn ledger(&self) -> &ReceivingLedger {
        &self.ledger
    }

    pub fn engine(&self) -> &MovementEngine {
        &self.engine
    }

    pub fn query(&self) -> &QueryService {
        &self.query
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }
}
