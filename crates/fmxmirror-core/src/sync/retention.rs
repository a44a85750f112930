//! Stale remote event cleanup.
//!
//! A separate sweep from reconciliation: remote events whose start has
//! fallen behind the cutoff are deleted wholesale. The ledger is not
//! consulted or written here; once the source stops publishing an
//! occurrence, the next reconciliation pass settles its bookkeeping.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::apprise::ApiClient;
use crate::error::RemoteError;

#[derive(Debug, Clone, Default)]
pub struct PruneSummary {
    pub examined: usize,
    pub deleted: usize,
    /// `(remote id, error detail)` for deletes that failed.
    pub failed: Vec<(String, String)>,
}

impl PruneSummary {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Delete remote events that started before `cutoff`. With `dry_run`,
/// count what would be deleted without calling delete.
pub async fn prune(
    client: &ApiClient,
    cutoff: DateTime<Utc>,
    dry_run: bool,
) -> Result<PruneSummary, RemoteError> {
    let events = client.list_events().await?;
    let mut summary = PruneSummary {
        examined: events.len(),
        ..Default::default()
    };

    for event in events {
        if event.start_date >= cutoff {
            continue;
        }
        if dry_run {
            summary.deleted += 1;
            continue;
        }

        match client.delete_event(&event.id).await {
            // Already gone counts as pruned.
            Ok(()) | Err(RemoteError::NotFound) => {
                info!(remote_id = %event.id, title = %event.title, "pruned stale remote event");
                summary.deleted += 1;
            }
            Err(e) => {
                warn!(remote_id = %event.id, error = %e, "failed to prune remote event");
                summary.failed.push((event.id.clone(), e.to_string()));
            }
        }
    }

    Ok(summary)
}
