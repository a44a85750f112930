//! Employee App calendar API client.
//!
//! Thin typed wrapper over the API's event resource. The API authenticates
//! with a `code` query parameter, answers create/update with 201 and the
//! stored event (its fields may be normalized server-side, which is why the
//! engine prefers the returned body over what it sent), and answers delete
//! with 204. Listing is capped at 200 events by the API.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::RemoteConfig;
use crate::error::RemoteError;
use crate::event::EventSnapshot;

/// Sentinel in the API's error body for an id it no longer knows.
const NOT_FOUND_SENTINEL: &str = "No object found with";

const LIST_LIMIT: u32 = 200;

/// An event as the Employee App API represents it.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEvent {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "accessGroups", default)]
    pub access_groups: Vec<String>,
    #[serde(default)]
    pub account: String,
    #[serde(rename = "allday", default)]
    pub all_day: bool,
    #[serde(rename = "calendar", default)]
    pub calendar_id: String,
    #[serde(rename = "startDate")]
    pub start_date: DateTime<Utc>,
    #[serde(rename = "endDate")]
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub notes: String,
}

impl ApiEvent {
    /// The server-confirmed content, in the engine's canonical form.
    pub fn snapshot(&self) -> EventSnapshot {
        EventSnapshot {
            title: self.title.clone(),
            notes: self.notes.clone(),
            start: self.start_date,
            end: self.end_date,
            all_day: self.all_day,
        }
    }
}

/// Create/update request body.
#[derive(Debug, Serialize)]
struct EventPayload<'a> {
    #[serde(rename = "accessGroups")]
    access_groups: &'a [String],
    #[serde(rename = "allday")]
    all_day: bool,
    calendar: &'a str,
    #[serde(rename = "startDate")]
    start_date: DateTime<Utc>,
    #[serde(rename = "endDate")]
    end_date: DateTime<Utc>,
    title: &'a str,
    notes: &'a str,
}

/// Error body the API returns on refusals.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: String,
    #[serde(rename = "originalResponse", default)]
    original_response: String,
}

/// Client for the Employee App calendar API, built from an immutable
/// [`RemoteConfig`].
pub struct ApiClient {
    http: Client,
    base_url: String,
    api_key: String,
    calendar_id: String,
    access_groups: Vec<String>,
}

impl ApiClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            calendar_id: config.calendar_id.clone(),
            access_groups: config.access_groups.clone(),
        })
    }

    /// Publish a new event; returns the stored event with its assigned id.
    pub async fn create_event(&self, snapshot: &EventSnapshot) -> Result<ApiEvent, RemoteError> {
        let url = format!("{}/events?code={}", self.base_url, self.api_key);
        let response = self
            .http
            .post(&url)
            .json(&self.payload(snapshot))
            .send()
            .await?;
        Self::expect_event(response).await
    }

    /// Overwrite an existing event's content.
    pub async fn update_event(
        &self,
        id: &str,
        snapshot: &EventSnapshot,
    ) -> Result<ApiEvent, RemoteError> {
        let url = format!("{}/events/{}?code={}", self.base_url, id, self.api_key);
        let response = self
            .http
            .put(&url)
            .json(&self.payload(snapshot))
            .send()
            .await?;
        Self::expect_event(response).await
    }

    /// Delete an event by id. `RemoteError::NotFound` is reported distinctly
    /// so callers can treat an already-absent event as done.
    pub async fn delete_event(&self, id: &str) -> Result<(), RemoteError> {
        let url = format!("{}/events/{}?code={}", self.base_url, id, self.api_key);
        let response = self.http.delete(&url).send().await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(());
        }
        Err(Self::error_from(response).await)
    }

    /// List events (the API caps this at 200).
    pub async fn list_events(&self) -> Result<Vec<ApiEvent>, RemoteError> {
        let url = format!(
            "{}/events?limit={}&code={}",
            self.base_url, LIST_LIMIT, self.api_key
        );
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        response
            .json::<Vec<ApiEvent>>()
            .await
            .map_err(|e| RemoteError::Response(e.to_string()))
    }

    fn payload<'a>(&'a self, snapshot: &'a EventSnapshot) -> EventPayload<'a> {
        EventPayload {
            access_groups: &self.access_groups,
            all_day: snapshot.all_day,
            calendar: &self.calendar_id,
            start_date: snapshot.start,
            end_date: snapshot.end,
            title: &snapshot.title,
            notes: &snapshot.notes,
        }
    }

    async fn expect_event(response: Response) -> Result<ApiEvent, RemoteError> {
        if response.status() != StatusCode::CREATED {
            return Err(Self::error_from(response).await);
        }
        response
            .json::<ApiEvent>()
            .await
            .map_err(|e| RemoteError::Response(e.to_string()))
    }

    async fn error_from(response: Response) -> RemoteError {
        let status = response.status();
        let body: ApiErrorBody = response.json().await.unwrap_or_default();

        if status == StatusCode::NOT_FOUND || body.message.contains(NOT_FOUND_SENTINEL) {
            return RemoteError::NotFound;
        }
        if status.is_server_error() {
            return RemoteError::Unavailable {
                status: status.as_u16(),
            };
        }

        let message = if body.message.is_empty() {
            format!("status {status}")
        } else if body.original_response.is_empty() {
            body.message
        } else {
            format!("{} ({})", body.message, body.original_response)
        };
        RemoteError::Rejected {
            message,
            code: body.code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::Matcher;

    fn config(base_url: &str) -> RemoteConfig {
        RemoteConfig {
            base_url: base_url.to_string(),
            api_key: "test-key".into(),
            calendar_id: "cal-1".into(),
            access_groups: vec!["group-1".into(), "group-2".into()],
            timeout_secs: 5,
        }
    }

    fn snapshot() -> EventSnapshot {
        EventSnapshot {
            title: "Fire Safety Training".into(),
            notes: "Room 204".into(),
            start: Utc.with_ymd_and_hms(2025, 6, 10, 14, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 6, 10, 15, 0, 0).unwrap(),
            all_day: false,
        }
    }

    fn event_body(id: &str) -> String {
        serde_json::json!({
            "_id": id,
            "accessGroups": ["group-1", "group-2"],
            "account": "acct-1",
            "allday": false,
            "calendar": "cal-1",
            "startDate": "2025-06-10T14:00:00Z",
            "endDate": "2025-06-10T15:00:00Z",
            "title": "Fire Safety Training",
            "notes": "Room 204",
        })
        .to_string()
    }

    #[tokio::test]
    async fn create_sends_payload_and_parses_stored_event() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/events")
            .match_query(Matcher::UrlEncoded("code".into(), "test-key".into()))
            .match_body(Matcher::PartialJsonString(
                r#"{"calendar":"cal-1","title":"Fire Safety Training","allday":false}"#.into(),
            ))
            .with_status(201)
            .with_body(event_body("r-1"))
            .create_async()
            .await;

        let client = ApiClient::new(&config(&server.url())).unwrap();
        let created = client.create_event(&snapshot()).await.unwrap();

        assert_eq!(created.id, "r-1");
        assert_eq!(created.snapshot(), snapshot());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_create_maps_to_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/events")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"message":"Validation failed","code":"invalid_event","failedValidation":true,"originalResponse":"endDate before startDate"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&config(&server.url())).unwrap();
        let err = client.create_event(&snapshot()).await.unwrap_err();

        match err {
            RemoteError::Rejected { message, code } => {
                assert!(message.contains("Validation failed"));
                assert!(message.contains("endDate before startDate"));
                assert_eq!(code, "invalid_event");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_hits_the_event_resource() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/events/r-1")
            .match_query(Matcher::UrlEncoded("code".into(), "test-key".into()))
            .with_status(201)
            .with_body(event_body("r-1"))
            .create_async()
            .await;

        let client = ApiClient::new(&config(&server.url())).unwrap();
        let updated = client.update_event("r-1", &snapshot()).await.unwrap();
        assert_eq!(updated.id, "r-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn delete_treats_204_as_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/events/r-1")
            .match_query(Matcher::Any)
            .with_status(204)
            .create_async()
            .await;

        let client = ApiClient::new(&config(&server.url())).unwrap();
        client.delete_event("r-1").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn delete_maps_missing_event_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/events/r-9")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"message":"No object found with that id","code":"not_found"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&config(&server.url())).unwrap();
        assert!(matches!(
            client.delete_event("r-9").await,
            Err(RemoteError::NotFound)
        ));
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/events")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let client = ApiClient::new(&config(&server.url())).unwrap();
        let err = client.create_event(&snapshot()).await.unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, RemoteError::Unavailable { status: 503 }));
    }

    #[tokio::test]
    async fn list_parses_events() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/events")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "200".into()),
                Matcher::UrlEncoded("code".into(), "test-key".into()),
            ]))
            .with_status(200)
            .with_body(format!("[{},{}]", event_body("r-1"), event_body("r-2")))
            .create_async()
            .await;

        let client = ApiClient::new(&config(&server.url())).unwrap();
        let events = client.list_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "r-1");
        assert_eq!(events[1].id, "r-2");
    }
}
