//! Probe Runner
//!
//! Executes declaratively configured probes (shell commands, TCP ports)
//! under a timeout and reduces each probe to a single [`alerting::Outcome`].
//! Probe problems never surface as errors; they become failure outcomes.

mod definition;
mod runner;

pub use definition::{Check, ProbeDefinition};
pub use runner::{run_check, run_probe};

use thiserror::Error;

/// Probe configuration errors
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Invalid probe {probe}: {reason}")]
    Invalid { probe: String, reason: String },

    #[error(transparent)]
    Key(#[from] ledger::LedgerError),
}
