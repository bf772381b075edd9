//! Configuration loading and representation.
//!
//! Values come from environment variables; unset or blank variables fall back
//! to defaults.

use std::path::PathBuf;

use thiserror::Error;

use wms_inventory::{DEFAULT_WAREHOUSE, LocationNamer};

pub const WAREHOUSE_CODE_VAR: &str = "WMS_WAREHOUSE_CODE";
pub const CATALOG_PATH_VAR: &str = "WMS_CATALOG_PATH";
pub const VOUCHERS_PATH_VAR: &str = "WMS_VOUCHERS_PATH";
pub const SCRIPT_PATH_VAR: &str = "WMS_SCRIPT_PATH";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    pub warehouse_code: String,
    /// JSON catalog; `None` = built-in demo catalog.
    pub catalog_path: Option<PathBuf>,
    /// JSON voucher intake; `None` = built-in demo vouchers.
    pub vouchers_path: Option<PathBuf>,
    pub script_path: Option<PathBuf>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            warehouse_code: DEFAULT_WAREHOUSE.to_string(),
            catalog_path: None,
            vouchers_path: None,
            script_path: None,
        }
    }
}

impl WarehouseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let warehouse_code = get(WAREHOUSE_CODE_VAR).unwrap_or_else(|| DEFAULT_WAREHOUSE.to_string());
        LocationNamer::new(warehouse_code.clone()).map_err(|e| ConfigError::Invalid {
            key: WAREHOUSE_CODE_VAR,
            reason: e.to_string(),
        })?;

        Ok(Self {
            warehouse_code,
            catalog_path: get(CATALOG_PATH_VAR).map(PathBuf::from),
            vouchers_path: get(VOUCHERS_PATH_VAR).map(PathBuf::from),
            script_path: get(SCRIPT_PATH_VAR).map(PathBuf::from),
        })
    }

    pub fn namer(&self) -> Result<LocationNamer, ConfigError> {
        LocationNamer::new(self.warehouse_code.clone()).map_err(|e| ConfigError::Invalid {
            key: WAREHOUSE_CODE_VAR,
            reason: e.to_string(),
        })
    }
}
