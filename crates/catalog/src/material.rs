use serde::{Deserialize, Serialize};

use wms_core::MaterialCode;

/// Catalog entry. Identity = code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Material {
    pub code: MaterialCode,
    pub description: String,
}

impl Material {
    pub fn new(code: MaterialCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }
}
