//! Operator scripts: a JSON array of tagged operations run in order.
//!
//! ```json
//! [
//!   { "op": "allocate", "voucher": "2025-0044356", "line": 0, "container": "LPN-000123", "quantity": 3 },
//!   { "op": "relocate_container", "container": "LPN-000123", "location": "ALM01-ZNC15-EST03-NIV02" },
//!   { "op": "query_material", "material": "MS130.9000.8404" }
//! ]
//! ```
//!
//! Identifiers are raw operator input and go through the same validation as
//! scanned tokens. Quantities may be numbers or numeric text.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use wms_core::{ContainerId, MaterialCode, MaterialQuantity, Quantity, VoucherId};
use wms_infra::LedgerError;

use crate::warehouse::Warehouse;

/// Quantity as typed: a number, or text that must parse as one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuantityInput {
    Number(i64),
    Text(String),
}

impl QuantityInput {
    fn resolve(&self) -> Result<i64, LedgerError> {
        match self {
            QuantityInput::Number(n) => Ok(*n),
            QuantityInput::Text(raw) => Ok(raw.parse::<Quantity>()?.get()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionInput {
    pub material: String,
    pub quantity: QuantityInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    ListVouchers {
        #[serde(default)]
        filter: Option<String>,
    },
    Allocate {
        voucher: String,
        line: usize,
        container: String,
        quantity: QuantityInput,
    },
    Finalize {
        voucher: String,
    },
    Dispatch {
        container: String,
        lines: Vec<SelectionInput>,
    },
    RelocateContainer {
        container: String,
        location: String,
    },
    RelocateMaterial {
        source: String,
        destination: String,
        lines: Vec<SelectionInput>,
    },
    QueryMaterial {
        material: String,
    },
    QueryContainer {
        container: String,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ListVouchers { .. } => "list_vouchers",
            Operation::Allocate { .. } => "allocate",
            Operation::Finalize { .. } => "finalize",
            Operation::Dispatch { .. } => "dispatch",
            Operation::RelocateContainer { .. } => "relocate_container",
            Operation::RelocateMaterial { .. } => "relocate_material",
            Operation::QueryMaterial { .. } => "query_material",
            Operation::QueryContainer { .. } => "query_container",
        }
    }
}

/// Result of one script step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub step: usize,
    pub op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub fn parse(json: &str) -> anyhow::Result<Vec<Operation>> {
    serde_json::from_str(json).context("parsing operator script")
}

pub fn load(path: &Path) -> anyhow::Result<Vec<Operation>> {
    let file = File::open(path).with_context(|| format!("opening script {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing script {}", path.display()))
}

/// Run every operation in order. A failing step is reported and the run continues.
pub fn run(warehouse: &Warehouse, operations: &[Operation]) -> Vec<Outcome> {
    operations
        .iter()
        .enumerate()
        .map(|(step, operation)| {
            let outcome = match execute(warehouse, operation) {
                Ok(result) => Outcome {
                    step,
                    op: operation.name(),
                    result: Some(result),
                    error: None,
                },
                Err(err) => Outcome {
                    step,
                    op: operation.name(),
                    result: None,
                    error: Some(format!("{err:#}")),
                },
            };

            match &outcome.error {
                None => info!(step, op = outcome.op, "script step succeeded"),
                Some(error) => warn!(step, op = outcome.op, %error, "script step failed"),
            }
            outcome
        })
        .collect()
}

fn execute(warehouse: &Warehouse, operation: &Operation) -> anyhow::Result<JsonValue> {
    let value = match operation {
        Operation::ListVouchers { filter } => {
            to_json(&warehouse.ledger().list_vouchers(filter.as_deref())?)?
        }
        Operation::Allocate {
            voucher,
            line,
            container,
            quantity,
        } => to_json(&warehouse.ledger().allocate(
            &VoucherId::new(voucher)?,
            *line,
            &ContainerId::new(container)?,
            quantity.resolve()?,
        )?)?,
        Operation::Finalize { voucher } => {
            to_json(&warehouse.ledger().finalize(&VoucherId::new(voucher)?)?)?
        }
        Operation::Dispatch { container, lines } => to_json(
            &warehouse
                .engine()
                .dispatch(&ContainerId::new(container)?, &selections(lines)?)?,
        )?,
        Operation::RelocateContainer {
            container,
            location,
        } => to_json(
            &warehouse
                .engine()
                .relocate_container(&ContainerId::new(container)?, location)?,
        )?,
        Operation::RelocateMaterial {
            source,
            destination,
            lines,
        } => to_json(&warehouse.engine().relocate_material(
            &ContainerId::new(source)?,
            &selections(lines)?,
            &ContainerId::new(destination)?,
        )?)?,
        Operation::QueryMaterial { material } => {
            to_json(&warehouse.query().by_material(&MaterialCode::new(material)?))?
        }
        Operation::QueryContainer { container } => {
            to_json(&warehouse.query().by_container(&ContainerId::new(container)?)?)?
        }
    };
    Ok(value)
}

fn selections(lines: &[SelectionInput]) -> Result<Vec<MaterialQuantity>, LedgerError> {
    lines
        .iter()
        .map(|l| -> Result<MaterialQuantity, LedgerError> {
            Ok(MaterialQuantity::new(
                MaterialCode::new(&l.material)?,
                l.quantity.resolve()?,
            ))
        })
        .collect()
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<JsonValue> {
    serde_json::to_value(value).context("serializing step result")
}
