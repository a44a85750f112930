//! The reconciliation engine.
//!
//! One pass walks the source batch sequentially and, per natural key,
//! performs at most one remote mutation followed by at most one ledger
//! write. The ledger write must land before the key is reported
//! successful; a ledger write that fails *after* a successful remote
//! mutation leaves the two sides disagreeing and is logged as a
//! reconciliation hazard (never silently swallowed).
//!
//! Per-key failures do not abort the batch. Nothing is retried within a
//! pass: after a failure the ledger still reads "needs this action", so
//! the next scheduled pass re-attempts it naturally.

use tracing::{error, info, warn};

use crate::apprise::ApiClient;
use crate::error::{LedgerError, RemoteError};
use crate::event::{NaturalKey, SourceEvent};
use crate::ledger::{Ledger, LedgerRecord};
use crate::sync::types::{KeyResult, Outcome, RunSummary};

/// Remote mutation chosen for one source event.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// No live remote event and the occurrence is active.
    Create,
    /// Tracked and the content changed.
    Update { remote_id: String },
    /// Tracked and the source canceled the occurrence.
    Retract { remote_id: String },
    /// Tracked and unchanged, or canceled without ever being published.
    Skip,
}

/// Decide what a single source event needs, given its ledger state.
///
/// This is the decision table the rest of the engine executes; it never
/// touches the remote or the ledger.
pub fn classify(record: Option<&LedgerRecord>, event: &SourceEvent) -> Action {
    match record.and_then(|r| r.remote_id.as_deref()) {
        None if event.canceled => Action::Skip,
        None => Action::Create,
        Some(remote_id) if event.canceled => Action::Retract {
            remote_id: remote_id.to_string(),
        },
        Some(remote_id) => {
            let unchanged = record.is_some_and(|r| r.snapshot == event.snapshot);
            if unchanged {
                Action::Skip
            } else {
                Action::Update {
                    remote_id: remote_id.to_string(),
                }
            }
        }
    }
}

/// A classified event, as shown by `sync --dry-run`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAction {
    pub key: NaturalKey,
    pub title: String,
    pub action: Action,
}

/// Reconciles one batch of source events against the remote calendar,
/// keeping the ledger consistent with the outcome.
pub struct SyncEngine<'a> {
    remote: &'a ApiClient,
    ledger: &'a Ledger,
}

impl<'a> SyncEngine<'a> {
    pub fn new(remote: &'a ApiClient, ledger: &'a Ledger) -> Self {
        Self { remote, ledger }
    }

    /// Classification only; no remote or ledger mutations.
    pub fn plan(&self, events: &[SourceEvent]) -> Result<Vec<PlannedAction>, LedgerError> {
        events
            .iter()
            .map(|event| {
                let record = self.ledger.find(&event.key)?;
                Ok(PlannedAction {
                    key: event.key.clone(),
                    title: event.snapshot.title.clone(),
                    action: classify(record.as_ref(), event),
                })
            })
            .collect()
    }

    /// One full reconciliation pass.
    ///
    /// Ledger *lookups* failing means the ledger itself is unusable, which
    /// is fatal to the run; everything past the lookup is isolated per key.
    pub async fn run_pass(&self, events: &[SourceEvent]) -> Result<RunSummary, LedgerError> {
        let mut results = Vec::with_capacity(events.len());
        for event in events {
            let record = self.ledger.find(&event.key)?;
            results.push(self.apply(event, record).await);
        }
        Ok(RunSummary::from_results(results))
    }

    async fn apply(&self, event: &SourceEvent, record: Option<LedgerRecord>) -> KeyResult {
        match classify(record.as_ref(), event) {
            Action::Skip => KeyResult {
                key: event.key.clone(),
                title: event.snapshot.title.clone(),
                outcome: Outcome::Unchanged,
                hazard: false,
            },
            Action::Create => self.create(event).await,
            Action::Update { remote_id } => self.update(event, &remote_id).await,
            Action::Retract { remote_id } => {
                // classify only yields Retract for a tracked key
                let record = record.expect("retract requires a ledger record");
                self.retract(event, record, &remote_id).await
            }
        }
    }

    async fn create(&self, event: &SourceEvent) -> KeyResult {
        let key = event.key.clone();
        let title = event.snapshot.title.clone();

        let created = match self.remote.create_event(&event.snapshot).await {
            Ok(created) => created,
            Err(e) => {
                log_remote_failure("create", &key, &e);
                return KeyResult {
                    key,
                    title,
                    outcome: Outcome::CreateFailed(e.to_string()),
                    hazard: false,
                };
            }
        };

        info!(key = %key, remote_id = %created.id, "created remote event");

        // The API may normalize fields; its confirmed copy is what the
        // next diff must compare against.
        let record = LedgerRecord {
            key: key.clone(),
            remote_id: Some(created.id.clone()),
            snapshot: created.snapshot(),
            canceled: false,
        };
        match self.ledger.upsert(&record) {
            Ok(()) => KeyResult {
                key,
                title,
                outcome: Outcome::Created,
                hazard: false,
            },
            Err(e) => hazard_result(key, title, &created.id, e, Outcome::CreateFailed),
        }
    }

    async fn update(&self, event: &SourceEvent, remote_id: &str) -> KeyResult {
        let key = event.key.clone();
        let title = event.snapshot.title.clone();

        let updated = match self.remote.update_event(remote_id, &event.snapshot).await {
            Ok(updated) => updated,
            Err(e) => {
                log_remote_failure("update", &key, &e);
                return KeyResult {
                    key,
                    title,
                    outcome: Outcome::UpdateFailed(e.to_string()),
                    hazard: false,
                };
            }
        };

        info!(key = %key, remote_id = %remote_id, "updated remote event");

        let record = LedgerRecord {
            key: key.clone(),
            remote_id: Some(remote_id.to_string()),
            snapshot: updated.snapshot(),
            canceled: false,
        };
        match self.ledger.upsert(&record) {
            Ok(()) => KeyResult {
                key,
                title,
                outcome: Outcome::Updated,
                hazard: false,
            },
            Err(e) => hazard_result(key, title, remote_id, e, Outcome::UpdateFailed),
        }
    }

    async fn retract(
        &self,
        event: &SourceEvent,
        record: LedgerRecord,
        remote_id: &str,
    ) -> KeyResult {
        let key = event.key.clone();
        let title = event.snapshot.title.clone();

        match self.remote.delete_event(remote_id).await {
            Ok(()) => {
                info!(key = %key, remote_id = %remote_id, "retracted remote event");
            }
            // Already absent remotely: the desired end state holds.
            Err(RemoteError::NotFound) => {
                warn!(key = %key, remote_id = %remote_id, "remote event already absent on delete");
            }
            Err(e) => {
                log_remote_failure("retract", &key, &e);
                return KeyResult {
                    key,
                    title,
                    outcome: Outcome::RetractFailed(e.to_string()),
                    hazard: false,
                };
            }
        }

        // Clear the remote id; the last mirrored content stays behind as
        // audit history for the key.
        let cleared = LedgerRecord {
            key: key.clone(),
            remote_id: None,
            snapshot: record.snapshot,
            canceled: true,
        };
        match self.ledger.upsert(&cleared) {
            Ok(()) => KeyResult {
                key,
                title,
                outcome: Outcome::Retracted,
                hazard: false,
            },
            Err(e) => hazard_result(key, title, remote_id, e, Outcome::RetractFailed),
        }
    }
}

fn log_remote_failure(operation: &str, key: &NaturalKey, e: &RemoteError) {
    if e.is_transient() {
        warn!(key = %key, error = %e, "transient {} failure; will retry next pass", operation);
    } else {
        warn!(key = %key, error = %e, "{} refused by remote; will repeat until the source content changes", operation);
    }
}

fn hazard_result(
    key: NaturalKey,
    title: String,
    remote_id: &str,
    e: LedgerError,
    failed: fn(String) -> Outcome,
) -> KeyResult {
    error!(
        key = %key,
        remote_id = %remote_id,
        error = %e,
        "reconciliation hazard: remote mutation succeeded but ledger write failed; run the audit command"
    );
    KeyResult {
        key,
        title,
        outcome: failed(format!(
            "remote mutation succeeded (remote id {remote_id}) but ledger write failed: {e}"
        )),
        hazard: true,
    }
}
