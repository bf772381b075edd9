use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use wms_app::script::{self, Outcome};
use wms_app::{Warehouse, fixtures};
use wms_infra::{InventoryReport, WarehouseConfig};
use wms_receiving::Voucher;

/// What the run leaves behind, printed to stdout.
#[derive(Debug, Serialize)]
struct RunReport {
    outcomes: Vec<Outcome>,
    open_vouchers: Vec<Voucher>,
    inventory: InventoryReport,
    index_consistent: bool,
}

fn main() -> anyhow::Result<()> {
    wms_observability::init();

    let config = WarehouseConfig::from_env()?;
    let catalog = fixtures::load_catalog(config.catalog_path.as_deref())?;
    let vouchers = fixtures::load_vouchers(config.vouchers_path.as_deref())?;
    info!(
        warehouse = %config.warehouse_code,
        materials = catalog.len(),
        vouchers = vouchers.len(),
        "warehouse loaded"
    );

    let warehouse = Warehouse::new(&config, Arc::new(catalog), vouchers)?;

    let outcomes = match &config.script_path {
        Some(path) => {
            let operations = script::load(path)?;
            script::run(&warehouse, &operations)
        }
        None => Vec::new(),
    };
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    info!(steps = outcomes.len(), failed, "script finished");

    let report = RunReport {
        outcomes,
        open_vouchers: warehouse.ledger().list_vouchers(None)?,
        inventory: warehouse.query().inventory(),
        index_consistent: warehouse.journal().verify_index()?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
