//! Alerting System
//!
//! Turns per-invocation probe outcomes into a bounded stream of alert and
//! recovery notifications, using the failure ledger to carry streak length
//! and cooldown state between invocations.

mod coordinator;
mod notify;

pub use coordinator::{Action, AlertConfig, AlertCoordinator, Outcome};
pub use notify::{Notifier, NotifyError, Severity};
