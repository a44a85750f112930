//! FMX source adapter.
//!
//! FMX has no event API worth speaking of; the agenda page embeds the
//! event list as JSON inside a `<script data-calendar-events>` tag, and
//! cancellation is only visible as a CSS class on the rendered entry.
//! All of that parsing stays here: the rest of the crate consumes typed
//! [`SourceEvent`]s keyed by `(event id, occurrence id)` and never sees
//! markup.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::SourceConfig;
use crate::error::{CoreError, SourceError};
use crate::event::{end_of_source_day, local_to_utc, EventSnapshot, NaturalKey, SourceEvent};

/// Script tag FMX embeds the agenda's event list into.
static AGENDA_PAYLOAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<script[^>]*data-calendar-events[^>]*>(.*?)</script>")
        .expect("agenda payload pattern is valid")
});

/// Class FMX puts on canceled occurrences.
const CANCELED_CLASS: &str = "fc-event-canceled";

/// FMX renders times as zone-less local wall clock.
const FMX_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One event as embedded in the agenda page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    id: String,
    #[serde(default)]
    read_url: String,
    #[serde(default)]
    title: String,
    /// Location text in practice.
    #[serde(default)]
    subtitle: String,
    #[serde(default)]
    all_day: bool,
    #[serde(default)]
    class_name: String,
    start: String,
    #[serde(default)]
    end: Option<String>,
}

/// Read-only client for the FMX agenda.
pub struct FmxClient {
    http: Client,
    base_url: String,
    timezone: Tz,
    custom_fields: Option<String>,
}

impl FmxClient {
    pub fn new(config: &SourceConfig) -> Result<Self, CoreError> {
        let timezone = config.tz()?;
        let http = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(SourceError::Network)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timezone,
            custom_fields: config.custom_fields.clone(),
        })
    }

    /// Fetch the today-forward agenda and return its events in page order,
    /// deduplicated by natural key.
    pub async fn retrieve_events(&self) -> Result<Vec<SourceEvent>, SourceError> {
        let today = Utc::now()
            .with_timezone(&self.timezone)
            .format("%Y-%m-%d")
            .to_string();

        let mut url = format!(
            "{}/calendar?date={}&customfieldlogic=0&view=agenda",
            self.base_url, today
        );
        if let Some(fields) = &self.custom_fields {
            url.push_str("&customfields=");
            url.push_str(fields);
        }

        debug!(%url, "fetching source agenda");
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status {
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        let payload = extract_agenda_payload(&body).ok_or(SourceError::PayloadMissing)?;
        parse_agenda(payload, self.timezone)
    }
}

pub(crate) fn extract_agenda_payload(html: &str) -> Option<&str> {
    AGENDA_PAYLOAD
        .captures(html)
        .and_then(|captures| captures.get(1))
        .map(|payload| payload.as_str().trim())
        .filter(|payload| !payload.is_empty())
}

pub(crate) fn parse_agenda(json: &str, tz: Tz) -> Result<Vec<SourceEvent>, SourceError> {
    let wire: Vec<WireEvent> =
        serde_json::from_str(json).map_err(|e| SourceError::Payload(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut events = Vec::with_capacity(wire.len());
    for raw in wire {
        let event = source_event(raw, tz)?;
        if seen.insert(event.key.clone()) {
            events.push(event);
        }
    }
    Ok(events)
}

fn source_event(raw: WireEvent, tz: Tz) -> Result<SourceEvent, SourceError> {
    let key = natural_key(&raw.id, &raw.read_url)?;
    let canceled = raw.class_name.contains(CANCELED_CLASS);

    let start_local = parse_naive(&raw.start)?;
    let start = local_to_utc(start_local, tz);
    let end = match raw.end.as_deref().filter(|value| !value.is_empty()) {
        Some(value) => local_to_utc(parse_naive(value)?, tz),
        // No explicit end: derived here, once, and nowhere else.
        None => end_of_source_day(start_local.date(), tz),
    };

    Ok(SourceEvent {
        key,
        canceled,
        snapshot: EventSnapshot {
            title: raw.title,
            notes: raw.subtitle,
            start,
            end,
            all_day: raw.all_day,
        },
    })
}

/// Wire ids look like `fmx-event-12345`; the trailing segment is the stable
/// event id. The read URL's last path segment is the occurrence id.
fn natural_key(id: &str, read_url: &str) -> Result<NaturalKey, SourceError> {
    let event_id = id
        .split('-')
        .nth(2)
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| SourceError::Payload(format!("unrecognized event id '{id}'")))?;

    let occurrence_id = read_url
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| SourceError::Payload(format!("unrecognized read url '{read_url}'")))?;

    Ok(NaturalKey {
        event_id: event_id.to_string(),
        occurrence_id: occurrence_id.to_string(),
    })
}

fn parse_naive(value: &str) -> Result<NaiveDateTime, SourceError> {
    NaiveDateTime::parse_from_str(value, FMX_TIME_FORMAT).map_err(|e| SourceError::Time {
        value: value.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    const AGENDA_HTML: &str = r#"<html><body>
        <script type="text/javascript">var unrelated = 1;</script>
        <script type="application/json" data-calendar-events="">
        [{"id":"fmx-event-12345","readUrl":"/calendar/events/67890",
          "title":"Fire Safety Training","subtitle":"Room 204",
          "allDay":false,"className":"fc-event",
          "start":"2025-06-10T10:00:00","end":"2025-06-10T11:00:00"}]
        </script></body></html>"#;

    fn wire_json(entries: &[serde_json::Value]) -> String {
        serde_json::Value::Array(entries.to_vec()).to_string()
    }

    fn entry(id: &str, read_url: &str, class_name: &str, end: Option<&str>) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "readUrl": read_url,
            "title": "Fire Safety Training",
            "subtitle": "Room 204",
            "allDay": false,
            "className": class_name,
            "start": "2025-06-10T10:00:00",
            "end": end,
        })
    }

    #[test]
    fn extracts_payload_from_page() {
        let payload = extract_agenda_payload(AGENDA_HTML).unwrap();
        assert!(payload.starts_with('['));
        assert!(payload.contains("fmx-event-12345"));
    }

    #[test]
    fn missing_payload_is_detected() {
        assert_eq!(extract_agenda_payload("<html><body>nothing</body></html>"), None);
        assert_eq!(
            extract_agenda_payload(r#"<script data-calendar-events=""></script>"#),
            None
        );
    }

    #[test]
    fn parses_events_with_keys_and_instants() {
        let payload = extract_agenda_payload(AGENDA_HTML).unwrap();
        let events = parse_agenda(payload, New_York).unwrap();

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.key.event_id, "12345");
        assert_eq!(event.key.occurrence_id, "67890");
        assert!(!event.canceled);
        assert_eq!(event.snapshot.title, "Fire Safety Training");
        assert_eq!(event.snapshot.notes, "Room 204");
        // 10:00 EDT == 14:00 UTC
        assert_eq!(
            event.snapshot.start,
            Utc.with_ymd_and_hms(2025, 6, 10, 14, 0, 0).unwrap()
        );
        assert_eq!(
            event.snapshot.end,
            Utc.with_ymd_and_hms(2025, 6, 10, 15, 0, 0).unwrap()
        );
    }

    #[test]
    fn canceled_class_sets_the_flag() {
        let json = wire_json(&[entry(
            "fmx-event-1",
            "/calendar/events/10",
            "fc-event fc-event-canceled",
            Some("2025-06-10T11:00:00"),
        )]);
        let events = parse_agenda(&json, New_York).unwrap();
        assert!(events[0].canceled);
    }

    #[test]
    fn missing_end_falls_back_to_end_of_source_day() {
        let json = wire_json(&[entry("fmx-event-1", "/calendar/events/10", "fc-event", None)]);
        let events = parse_agenda(&json, New_York).unwrap();
        // 23:59:59 EDT on the start date == 03:59:59 UTC next day
        assert_eq!(
            events[0].snapshot.end,
            Utc.with_ymd_and_hms(2025, 6, 11, 3, 59, 59).unwrap()
        );
    }

    #[test]
    fn repeated_parse_of_missing_end_is_identical() {
        let json = wire_json(&[entry("fmx-event-1", "/calendar/events/10", "fc-event", None)]);
        let first = parse_agenda(&json, New_York).unwrap();
        let second = parse_agenda(&json, New_York).unwrap();
        assert_eq!(first[0].snapshot, second[0].snapshot);
    }

    #[test]
    fn duplicate_keys_are_dropped_keeping_first() {
        let json = wire_json(&[
            entry("fmx-event-1", "/calendar/events/10", "fc-event", None),
            entry("fmx-event-1", "/calendar/events/10", "fc-event fc-event-canceled", None),
            entry("fmx-event-1", "/calendar/events/11", "fc-event", None),
        ]);
        let events = parse_agenda(&json, New_York).unwrap();
        assert_eq!(events.len(), 2);
        assert!(!events[0].canceled);
        assert_eq!(events[1].key.occurrence_id, "11");
    }

    #[test]
    fn unrecognized_id_is_an_error() {
        let json = wire_json(&[entry("oddball", "/calendar/events/10", "fc-event", None)]);
        assert!(matches!(
            parse_agenda(&json, New_York),
            Err(SourceError::Payload(_))
        ));
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let mut raw = entry("fmx-event-1", "/calendar/events/10", "fc-event", None);
        raw["start"] = serde_json::json!("June 10th, 10am");
        assert!(matches!(
            parse_agenda(&wire_json(&[raw]), New_York),
            Err(SourceError::Time { .. })
        ));
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(matches!(
            parse_agenda("{not json", New_York),
            Err(SourceError::Payload(_))
        ));
    }
}
