use crate::infrastructure::error::JournalError;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

/// Outward leg of calendar synchronization. The sync coordinator only sees
/// this trait, so a full CalDAV client can replace the built-in
/// implementations without touching the conflict logic.
#[async_trait]
pub trait CalendarTransport: Send + Sync {
    async fn publish_event(&self, uid: &str, ics_payload: &str) -> Result<(), JournalError>;
    async fn delete_event(&self, uid: &str) -> Result<(), JournalError>;
}

#[derive(Debug, Clone)]
pub struct CaldavTransport {
    client: Client,
    collection_url: Url,
}

impl CaldavTransport {
    pub fn new(collection_url: &str) -> Result<Self, JournalError> {
        let collection_url = Url::parse(collection_url).map_err(|error| {
            JournalError::Transport(format!("invalid caldav collection url: {error}"))
        })?;
        Ok(Self {
            client: Client::new(),
            collection_url,
        })
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), JournalError> {
        if value.trim().is_empty() {
            return Err(JournalError::Transport(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn event_endpoint(&self, uid: &str) -> Result<Url, JournalError> {
        let mut url = self.collection_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                JournalError::Transport("caldav collection URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.push(&format!("{uid}.ics"));
        }
        Ok(url)
    }

    fn http_error(status: reqwest::StatusCode, body: &str) -> JournalError {
        let message = if body.trim().is_empty() {
            format!("caldav server error: http {}", status.as_u16())
        } else {
            format!("caldav server error: http {}; body={body}", status.as_u16())
        };
        JournalError::Transport(message)
    }
}

#[async_trait]
impl CalendarTransport for CaldavTransport {
    async fn publish_event(&self, uid: &str, ics_payload: &str) -> Result<(), JournalError> {
        Self::ensure_non_empty(uid, "event uid")?;
        Self::ensure_non_empty(ics_payload, "ics payload")?;

        let url = self.event_endpoint(uid)?;
        let response = self
            .client
            .put(url)
            .header("Content-Type", "text/calendar; charset=utf-8")
            .body(ics_payload.to_string())
            .send()
            .await
            .map_err(|error| {
                JournalError::Transport(format!("network error while publishing calendar event: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(|error| {
                JournalError::Transport(format!("failed reading caldav response: {error}"))
            })?;
            return Err(Self::http_error(status, &body));
        }
        Ok(())
    }

    async fn delete_event(&self, uid: &str) -> Result<(), JournalError> {
        Self::ensure_non_empty(uid, "event uid")?;

        let url = self.event_endpoint(uid)?;
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|error| {
                JournalError::Transport(format!("network error while deleting calendar event: {error}"))
            })?;

        let status = response.status();
        // A missing event is an acceptable outcome for a delete.
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            let body = response.text().await.map_err(|error| {
                JournalError::Transport(format!("failed reading caldav response: {error}"))
            })?;
            return Err(Self::http_error(status, &body));
        }
        Ok(())
    }
}

/// Stand-in transport used when no CalDAV server is configured: accepts every
/// event and keeps it in memory so callers and tests can inspect what would
/// have been pushed.
#[derive(Debug, Default)]
pub struct InMemoryCalendarTransport {
    events: Mutex<HashMap<String, String>>,
}

impl InMemoryCalendarTransport {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, JournalError> {
        self.events.lock().map_err(|error| {
            JournalError::Transport(format!("calendar transport lock poisoned: {error}"))
        })
    }

    pub fn published(&self, uid: &str) -> Result<Option<String>, JournalError> {
        Ok(self.lock()?.get(uid).cloned())
    }

    pub fn published_uids(&self) -> Result<Vec<String>, JournalError> {
        let mut uids: Vec<String> = self.lock()?.keys().cloned().collect();
        uids.sort();
        Ok(uids)
    }
}

#[async_trait]
impl CalendarTransport for InMemoryCalendarTransport {
    async fn publish_event(&self, uid: &str, ics_payload: &str) -> Result<(), JournalError> {
        if uid.trim().is_empty() {
            return Err(JournalError::Transport("event uid must not be empty".to_string()));
        }
        self.lock()?
            .insert(uid.trim().to_string(), ics_payload.to_string());
        Ok(())
    }

    async fn delete_event(&self, uid: &str) -> Result<(), JournalError> {
        self.lock()?.remove(uid.trim());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_endpoint_appends_uid_under_collection() {
        let transport =
            CaldavTransport::new("https://cal.example.net/dav/user/journal/").expect("transport");
        let url = transport
            .event_endpoint("journal-entry-12@7")
            .expect("endpoint");
        assert_eq!(
            url.as_str(),
            "https://cal.example.net/dav/user/journal/journal-entry-12@7.ics"
        );

        let no_slash =
            CaldavTransport::new("https://cal.example.net/dav/user/journal").expect("transport");
        let url = no_slash.event_endpoint("abc").expect("endpoint");
        assert_eq!(url.as_str(), "https://cal.example.net/dav/user/journal/abc.ics");
    }

    #[test]
    fn rejects_unusable_collection_url() {
        assert!(CaldavTransport::new("not a url").is_err());
    }

    #[tokio::test]
    async fn in_memory_transport_records_and_forgets_events() {
        let transport = InMemoryCalendarTransport::default();
        transport
            .publish_event("journal-entry-1@7", "BEGIN:VCALENDAR")
            .await
            .expect("publish");

        assert_eq!(
            transport.published("journal-entry-1@7").expect("published"),
            Some("BEGIN:VCALENDAR".to_string())
        );
        assert_eq!(
            transport.published_uids().expect("uids"),
            vec!["journal-entry-1@7".to_string()]
        );

        transport
            .delete_event("journal-entry-1@7")
            .await
            .expect("delete");
        assert_eq!(transport.published("journal-entry-1@7").expect("published"), None);

        // Deleting an unknown uid is not an error.
        transport.delete_event("missing").await.expect("delete missing");
    }

    #[tokio::test]
    async fn in_memory_transport_rejects_blank_uid() {
        let transport = InMemoryCalendarTransport::default();
        let result = transport.publish_event("  ", "BEGIN:VCALENDAR").await;
        assert!(matches!(result, Err(JournalError::Transport(_))));
    }
}
