//! Error type of the ledger services.

use thiserror::Error;

use wms_core::DomainError;

use crate::event_store::EventStoreError;
use crate::projections::IndexError;

/// Failure of a ledger, movement or query operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Deterministic business rejection; nothing was written.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] EventStoreError),

    /// The index refused a batch. Raised before the append, so nothing was written.
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("lock poisoned: {0}")]
    Poisoned(&'static str),
}

impl LedgerError {
    /// The business error, if this is one.
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            LedgerError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
