//! Failure Ledger
//!
//! Persists, per probe, the length of the current failure streak and the
//! time of the last alert. The ledger lives in a single YAML file that is
//! read and rewritten as a whole under an advisory file lock.

mod key;
mod record;
mod store;

pub use key::ProbeKey;
pub use record::{Ledger, LedgerEntry};
pub use store::{CorruptPolicy, FailureLedger};

use std::path::PathBuf;
use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The backing file could not be read, written, locked or replaced
    #[error("ledger store {} is unavailable: {source}", .path.display())]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but is not a valid ledger document
    #[error("ledger store {} is corrupt: {source}", .path.display())]
    CorruptStore {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    /// A probe key that is not of the form `group.check`
    #[error("Invalid probe key: {0}")]
    InvalidKey(String),
}

impl LedgerError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LedgerError::StoreUnavailable {
            path: path.into(),
            source,
        }
    }
}
