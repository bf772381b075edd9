use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use thiserror::Error;

use wms_core::{DomainError, DomainResult, MaterialCode};

use crate::material::Material;

/// Read-only material lookup service.
pub trait Catalog: Send + Sync {
    /// Look up a material by code; `NotFound` when absent.
    fn lookup(&self, code: &MaterialCode) -> DomainResult<Material>;

    /// Description for display, `None` when the code is not catalogued.
    fn describe(&self, code: &MaterialCode) -> Option<String> {
        self.lookup(code).ok().map(|m| m.description)
    }
}

impl<C> Catalog for Arc<C>
where
    C: Catalog + ?Sized,
{
    fn lookup(&self, code: &MaterialCode) -> DomainResult<Material> {
        (**self).lookup(code)
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate material code in catalog: {0}")]
    Duplicate(MaterialCode),
}

/// Catalog held in memory, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    materials: HashMap<MaterialCode, Material>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entries; a repeated code is rejected.
    pub fn from_materials(
        materials: impl IntoIterator<Item = Material>,
    ) -> Result<Self, CatalogError> {
        let mut map = HashMap::new();
        for m in materials {
            if map.contains_key(&m.code) {
                return Err(CatalogError::Duplicate(m.code));
            }
            map.insert(m.code.clone(), m);
        }
        Ok(Self { materials: map })
    }

    /// Load a JSON array of `{"code", "description"}` records.
    pub fn from_reader(reader: impl Read) -> Result<Self, CatalogError> {
        let materials: Vec<Material> = serde_json::from_reader(reader)?;
        Self::from_materials(materials)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

impl Catalog for InMemoryCatalog {
    fn lookup(&self, code: &MaterialCode) -> DomainResult<Material> {
        self.materials
            .get(code)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("material {code}")))
    }
}
