//! Trigger drivers
//!
//! - [`one_shot`]: resolve configured records, reconcile once, exit
//! - [`gate`]: server-mode idempotency gate in front of the reconciler
//!
//! The HTTP adapter that feeds the gate lives in the daemon.

pub mod gate;
pub mod one_shot;

pub use gate::{ReportGate, ReportOutcome};
pub use one_shot::{resolve_desired, run_once, split_records};
