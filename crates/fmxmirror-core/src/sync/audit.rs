//! Ledger/remote consistency audit.
//!
//! The repair surface for reconciliation hazards: a remote mutation can
//! succeed while the ledger write after it fails, leaving the two sides
//! claiming different realities. This pass is read-only; it lists the
//! mismatches so an operator (or a follow-up job) can adopt or delete
//! the strays.
//!
//! Listing is bounded by the API's 200-event cap, so the report covers
//! the events the API returns, which in practice is the recent window
//! reconciliation works in anyway.

use std::collections::HashSet;

use crate::apprise::{ApiClient, ApiEvent};
use crate::error::CoreError;
use crate::ledger::Ledger;

#[derive(Debug, Default)]
pub struct AuditReport {
    /// Remote events no live ledger record claims: candidates for adoption
    /// or deletion.
    pub orphan_remote: Vec<ApiEvent>,
    /// Remote ids the ledger claims are live but the remote no longer has.
    pub missing_remote: Vec<String>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_remote.is_empty() && self.missing_remote.is_empty()
    }
}

/// Compare the remote event set with the ledger's live claims.
pub async fn audit(client: &ApiClient, ledger: &Ledger) -> Result<AuditReport, CoreError> {
    let remote_events = client.list_events().await.map_err(CoreError::Remote)?;
    let live = ledger.live_remote_ids().map_err(CoreError::Ledger)?;

    let remote_ids: HashSet<&str> = remote_events.iter().map(|event| event.id.as_str()).collect();

    let orphan_remote = remote_events
        .iter()
        .filter(|event| !live.contains(&event.id))
        .cloned()
        .collect();

    let mut missing_remote: Vec<String> = live
        .into_iter()
        .filter(|id| !remote_ids.contains(id.as_str()))
        .collect();
    missing_remote.sort();

    Ok(AuditReport {
        orphan_remote,
        missing_remote,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteConfig;
    use crate::event::{EventSnapshot, NaturalKey};
    use crate::ledger::LedgerRecord;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;

    fn config(base_url: &str) -> RemoteConfig {
        RemoteConfig {
            base_url: base_url.to_string(),
            api_key: "test-key".into(),
            calendar_id: "cal-1".into(),
            access_groups: vec![],
            timeout_secs: 5,
        }
    }

    fn record(occurrence: &str, remote_id: Option<&str>) -> LedgerRecord {
        LedgerRecord {
            key: NaturalKey {
                event_id: "1".into(),
                occurrence_id: occurrence.into(),
            },
            remote_id: remote_id.map(String::from),
            snapshot: EventSnapshot {
                title: "Event".into(),
                notes: String::new(),
                start: Utc.with_ymd_and_hms(2025, 6, 10, 14, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2025, 6, 10, 15, 0, 0).unwrap(),
                all_day: false,
            },
            canceled: false,
        }
    }

    fn event_json(id: &str) -> serde_json::Value {
        serde_json::json!({
            "_id": id,
            "allday": false,
            "calendar": "cal-1",
            "startDate": "2025-06-10T14:00:00Z",
            "endDate": "2025-06-10T15:00:00Z",
            "title": "Event",
            "notes": "",
        })
    }

    #[tokio::test]
    async fn clean_when_ledger_and_remote_agree() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/events")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(serde_json::json!([event_json("r-1")]).to_string())
            .create_async()
            .await;

        let ledger = Ledger::open_memory().unwrap();
        ledger.upsert(&record("1", Some("r-1"))).unwrap();

        let client = ApiClient::new(&config(&server.url())).unwrap();
        let report = audit(&client, &ledger).await.unwrap();
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn finds_orphans_and_missing_on_both_sides() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/events")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(serde_json::json!([event_json("r-1"), event_json("r-stray")]).to_string())
            .create_async()
            .await;

        let ledger = Ledger::open_memory().unwrap();
        ledger.upsert(&record("1", Some("r-1"))).unwrap();
        ledger.upsert(&record("2", Some("r-vanished"))).unwrap();
        // retracted record: its id should not be expected remotely
        ledger.upsert(&record("3", None)).unwrap();

        let client = ApiClient::new(&config(&server.url())).unwrap();
        let report = audit(&client, &ledger).await.unwrap();

        assert_eq!(report.orphan_remote.len(), 1);
        assert_eq!(report.orphan_remote[0].id, "r-stray");
        assert_eq!(report.missing_remote, vec!["r-vanished".to_string()]);
        assert!(!report.is_clean());
    }
}
