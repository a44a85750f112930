//! Core library for fmxmirror.
//!
//! Mirrors the event set of an FMX facility-scheduling calendar into the
//! Employee App calendar API:
//! - `fmx` is the read-only source adapter (agenda scrape -> typed events)
//! - `apprise` is the read-write remote client
//! - `ledger` is the durable source -> remote mapping (SQLite)
//! - `sync` is the reconciliation engine plus the retention sweep and the
//!   consistency audit
//! - `runlock` keeps passes from overlapping

pub mod apprise;
pub mod config;
pub mod error;
pub mod event;
pub mod fmx;
pub mod ledger;
pub mod runlock;
pub mod sync;

pub use config::Config;
pub use error::CoreError;
pub use event::{EventSnapshot, NaturalKey, SourceEvent};
