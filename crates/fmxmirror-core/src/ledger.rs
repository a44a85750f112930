//! SQLite-backed sync ledger.
//!
//! The ledger remembers, per natural key, which remote event mirrors the
//! source occurrence and the content last confirmed on the remote side.
//! The reconciliation engine is its only writer. Records are never
//! deleted: retraction clears the remote id and the row stays behind as
//! audit history for the key.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::LedgerError;
use crate::event::{EventSnapshot, NaturalKey};

/// The ledger's memory of one previously handled source occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRecord {
    pub key: NaturalKey,
    /// `None` while no remote event exists for this key (never published,
    /// or retracted).
    pub remote_id: Option<String>,
    /// Content last confirmed mirrored on the remote side.
    pub snapshot: EventSnapshot,
    pub canceled: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerStats {
    pub total: u64,
    /// Records currently claiming a live remote event.
    pub tracked: u64,
    pub retracted: u64,
}

/// SQLite database mapping natural keys to sync records.
pub struct Ledger {
    conn: Connection,
}

impl Ledger {
    /// Open (and migrate) the ledger at `path`, creating it if needed.
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(path).map_err(|source| LedgerError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let ledger = Self { conn };
        ledger.migrate()?;
        Ok(ledger)
    }

    /// Open an in-memory ledger (for tests).
    pub fn open_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory().map_err(|source| LedgerError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        let ledger = Self { conn };
        ledger.migrate()?;
        Ok(ledger)
    }

    fn migrate(&self) -> Result<(), LedgerError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS events (
                    fmx_id        TEXT NOT NULL,
                    occurrence_id TEXT NOT NULL,
                    remote_id     TEXT,
                    title         TEXT NOT NULL DEFAULT '',
                    notes         TEXT NOT NULL DEFAULT '',
                    start_at      TEXT NOT NULL,
                    end_at        TEXT NOT NULL,
                    all_day       INTEGER NOT NULL DEFAULT 0,
                    canceled      INTEGER NOT NULL DEFAULT 0,
                    created_at    TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at    TEXT NOT NULL DEFAULT (datetime('now')),
                    PRIMARY KEY (fmx_id, occurrence_id)
                );

                CREATE INDEX IF NOT EXISTS idx_events_remote_id ON events(remote_id);",
            )
            .map_err(|e| LedgerError::MigrationFailed(e.to_string()))
    }

    /// Look up the record for a natural key.
    pub fn find(&self, key: &NaturalKey) -> Result<Option<LedgerRecord>, LedgerError> {
        let mut stmt = self.conn.prepare(
            "SELECT remote_id, title, notes, start_at, end_at, all_day, canceled
             FROM events
             WHERE fmx_id = ?1 AND occurrence_id = ?2",
        )?;

        let row = stmt
            .query_row(params![key.event_id, key.occurrence_id], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, bool>(5)?,
                    row.get::<_, bool>(6)?,
                ))
            })
            .optional()?;

        let Some((remote_id, title, notes, start_at, end_at, all_day, canceled)) = row else {
            return Ok(None);
        };

        Ok(Some(LedgerRecord {
            key: key.clone(),
            remote_id: remote_id.filter(|id| !id.is_empty()),
            snapshot: EventSnapshot {
                title,
                notes,
                start: parse_stored(&start_at)?,
                end: parse_stored(&end_at)?,
                all_day,
            },
            canceled,
        }))
    }

    /// Insert or overwrite the record for its key. Idempotent; keeps
    /// `created_at` from the first insert and bumps `updated_at`.
    pub fn upsert(&self, record: &LedgerRecord) -> Result<(), LedgerError> {
        self.conn.execute(
            "INSERT INTO events
                (fmx_id, occurrence_id, remote_id, title, notes, start_at, end_at, all_day, canceled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (fmx_id, occurrence_id) DO UPDATE SET
                remote_id = excluded.remote_id,
                title     = excluded.title,
                notes     = excluded.notes,
                start_at  = excluded.start_at,
                end_at    = excluded.end_at,
                all_day   = excluded.all_day,
                canceled  = excluded.canceled,
                updated_at = datetime('now')",
            params![
                record.key.event_id,
                record.key.occurrence_id,
                record.remote_id,
                record.snapshot.title,
                record.snapshot.notes,
                record.snapshot.start.to_rfc3339(),
                record.snapshot.end.to_rfc3339(),
                record.snapshot.all_day,
                record.canceled,
            ],
        )?;
        Ok(())
    }

    /// All remote ids the ledger currently claims are live (for audit).
    pub fn live_remote_ids(&self) -> Result<HashSet<String>, LedgerError> {
        let mut stmt = self
            .conn
            .prepare("SELECT remote_id FROM events WHERE remote_id IS NOT NULL AND remote_id != ''")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = HashSet::new();
        for id in rows {
            ids.insert(id?);
        }
        Ok(ids)
    }

    pub fn stats(&self) -> Result<LedgerStats, LedgerError> {
        self.conn
            .query_row(
                "SELECT COUNT(*),
                        COUNT(CASE WHEN remote_id IS NOT NULL AND remote_id != '' THEN 1 END),
                        COUNT(CASE WHEN canceled THEN 1 END)
                 FROM events",
                [],
                |row| {
                    Ok(LedgerStats {
                        total: row.get(0)?,
                        tracked: row.get(1)?,
                        retracted: row.get(2)?,
                    })
                },
            )
            .map_err(Into::into)
    }
}

fn parse_stored(value: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::QueryFailed(format!("bad stored timestamp '{value}': {e}")))
}
