//! Read-only queries over the inventory index.
//!
//! Every query copies what it needs under one short read lock and enriches it
//! with catalog descriptions after the lock is released.

use std::sync::Arc;

use serde::Serialize;

use wms_catalog::Catalog;
use wms_core::{ContainerId, DomainError, MaterialCode};
use wms_inventory::LocationId;

use crate::error::LedgerResult;
use crate::projections::SharedIndex;

/// One place a material is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacementRow {
    pub location: Option<LocationId>,
    pub container: ContainerId,
    pub quantity: i64,
}

/// Answer to "where is material X".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterialReport {
    pub material: MaterialCode,
    pub description: Option<String>,
    pub placements: Vec<PlacementRow>,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerLine {
    pub material: MaterialCode,
    pub description: Option<String>,
    pub quantity: i64,
}

/// Answer to "what is in container Y".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerReport {
    pub container: ContainerId,
    pub location: Option<LocationId>,
    pub lines: Vec<ContainerLine>,
}

/// Everything currently held, by material and by container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryReport {
    pub position: u64,
    pub materials: Vec<MaterialReport>,
    pub containers: Vec<ContainerReport>,
}

#[derive(Clone)]
pub struct QueryService {
    index: SharedIndex,
    catalog: Arc<dyn Catalog>,
}

impl core::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QueryService").finish_non_exhaustive()
    }
}

impl QueryService {
    pub fn new(index: SharedIndex, catalog: Arc<dyn Catalog>) -> Self {
        Self { index, catalog }
    }

    /// Every container holding `code`. Unknown materials yield an empty report.
    pub fn by_material(&self, code: &MaterialCode) -> MaterialReport {
        let placements = self.index.read().placements(code);
        self.material_report(code, placements)
    }

    /// Contents of one container; `NotFound` if it was never referenced.
    pub fn by_container(&self, id: &ContainerId) -> LedgerResult<ContainerReport> {
        let entry = self
            .index
            .read()
            .container(id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("container {id}")))?;

        Ok(ContainerReport {
            container: id.clone(),
            location: entry.location,
            lines: entry
                .stock
                .into_iter()
                .map(|(material, quantity)| ContainerLine {
                    description: self.catalog.describe(&material),
                    material,
                    quantity,
                })
                .collect(),
        })
    }

    pub fn inventory(&self) -> InventoryReport {
        let index = self.index.snapshot();

        let materials = index
            .totals()
            .into_keys()
            .map(|code| {
                let placements = index.placements(&code);
                self.material_report(&code, placements)
            })
            .collect();

        let containers = index
            .containers()
            .map(|(id, entry)| ContainerReport {
                container: id.clone(),
                location: entry.location.clone(),
                lines: entry
                    .stock
                    .iter()
                    .map(|(material, quantity)| ContainerLine {
                        material: material.clone(),
                        description: self.catalog.describe(material),
                        quantity: *quantity,
                    })
                    .collect(),
            })
            .collect();

        InventoryReport {
            position: index.position(),
            materials,
            containers,
        }
    }

    fn material_report(
        &self,
        code: &MaterialCode,
        placements: Vec<crate::projections::Placement>,
    ) -> MaterialReport {
        let placements: Vec<PlacementRow> = placements
            .into_iter()
            .map(|p| PlacementRow {
                location: p.location,
                container: p.container,
                quantity: p.quantity,
            })
            .collect();

        MaterialReport {
            material: code.clone(),
            description: self.catalog.describe(code),
            total: placements.iter().map(|p| p.quantity).sum(),
            placements,
        }
    }
}
