//! Source-event types and canonical time handling.
//!
//! Everything downstream of the source adapter works in UTC instants.
//! The one place wall-clock time enters the system is here, when a raw
//! FMX timestamp is localized and converted; in particular the implicit
//! end-of-day instant for events without an explicit end is derived by
//! `end_of_source_day` at snapshot-build time and nowhere else, so the
//! same event always produces byte-identical snapshots across runs.

use std::fmt;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Stable identity of one event occurrence across runs: the FMX event id
/// plus the occurrence id of this instance within its series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub event_id: String,
    pub occurrence_id: String,
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.event_id, self.occurrence_id)
    }
}

/// The content that must match between source and remote. Equality over
/// this struct is the engine's modification check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub title: String,
    pub notes: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
}

/// One occurrence as published by the source calendar for the current run.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEvent {
    pub key: NaturalKey,
    pub canceled: bool,
    pub snapshot: EventSnapshot,
}

/// End instant used when the source publishes no explicit end: 23:59:59
/// on the event's start date, in the source calendar's local zone.
pub fn end_of_source_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date
        .and_hms_opt(23, 59, 59)
        .expect("23:59:59 is a valid wall-clock time");
    local_to_utc(naive, tz)
}

/// Localize a naive wall-clock time in `tz` and convert to UTC.
///
/// Total by construction: ambiguous times (DST fold) resolve to the earlier
/// instant, and times skipped by a DST gap are shifted forward an hour.
pub fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = naive + Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) => dt.with_timezone(&Utc),
                LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
                LocalResult::None => Utc.from_utc_datetime(&naive),
            }
        }
    }
}
