//! Reconciliation between the FMX source calendar and the Employee App
//! calendar.
//!
//! `engine` decides and applies per-key actions; `retention` is the
//! separate stale-event sweep; `audit` is the repair surface for
//! ledger/remote mismatches.

pub mod audit;
pub mod engine;
pub mod retention;
pub mod types;


pub use audit::{audit, AuditReport};
pub use engine::{classify, Action, PlannedAction, SyncEngine};
pub use retention::{prune, PruneSummary};
pub use types::{KeyResult, Outcome, RunSummary};
