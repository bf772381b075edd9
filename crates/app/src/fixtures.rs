//! Catalog and voucher intake: from JSON files, or the built-in demo data.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;

use wms_catalog::{InMemoryCatalog, Material};
use wms_core::{MaterialCode, VoucherId};
use wms_receiving::{IntakeLine, Voucher, VoucherIntake};

pub const STAPLE_REMOVER: &str = "MS130.9000.8404";
pub const CLIP_HOLDER: &str = "MS130.9000.6501";

pub fn demo_catalog() -> anyhow::Result<InMemoryCatalog> {
    let materials = [
        (STAPLE_REMOVER, "Sacagrapas metal"),
        (CLIP_HOLDER, "Porta clips"),
    ]
    .into_iter()
    .map(|(code, description)| -> anyhow::Result<Material> {
        Ok(Material::new(MaterialCode::new(code)?, description))
    })
    .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(InMemoryCatalog::from_materials(materials)?)
}

pub fn demo_intake() -> anyhow::Result<Vec<VoucherIntake>> {
    let date = NaiveDate::from_ymd_opt(2025, 8, 20).context("invalid demo date")?;
    let intake = |id: &str, supplier: &str, lines: &[(&str, i64)]| -> anyhow::Result<VoucherIntake> {
        Ok(VoucherIntake {
            id: VoucherId::new(id)?,
            supplier: supplier.to_string(),
            date,
            lines: lines
                .iter()
                .map(|(material, quantity)| -> anyhow::Result<IntakeLine> {
                    Ok(IntakeLine {
                        material: MaterialCode::new(material)?,
                        quantity: *quantity,
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()?,
        })
    };

    Ok(vec![
        intake("2025-0044356", "ABC", &[(STAPLE_REMOVER, 3), (CLIP_HOLDER, 1)])?,
        intake("2025-0044330", "Y", &[(STAPLE_REMOVER, 5)])?,
        intake("2025-0044321", "Z", &[(CLIP_HOLDER, 1)])?,
    ])
}

/// Catalog from `path`, or the demo catalog when unset.
pub fn load_catalog(path: Option<&Path>) -> anyhow::Result<InMemoryCatalog> {
    let Some(path) = path else {
        return demo_catalog();
    };
    let file = File::open(path).with_context(|| format!("opening catalog {}", path.display()))?;
    InMemoryCatalog::from_reader(BufReader::new(file))
        .with_context(|| format!("loading catalog {}", path.display()))
}

/// Vouchers from `path` (JSON array of intake records), or the demo set.
pub fn load_vouchers(path: Option<&Path>) -> anyhow::Result<Vec<Voucher>> {
    let intake = match path {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("opening vouchers {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("parsing vouchers {}", path.display()))?
        }
        None => demo_intake()?,
    };

    intake
        .into_iter()
        .map(|i: VoucherIntake| {
            let id = i.id.clone();
            Voucher::open(i).with_context(|| format!("opening voucher {id}"))
        })
        .collect()
}
