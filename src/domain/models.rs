use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_CONTENT_CHARS: usize = 10_000;
pub const DEFAULT_TITLE: &str = "Untitled";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    NotSynced,
    Synced,
    SyncPending,
    SyncConflict,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::NotSynced => "not_synced",
            SyncStatus::Synced => "synced",
            SyncStatus::SyncPending => "sync_pending",
            SyncStatus::SyncConflict => "sync_conflict",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim() {
            "not_synced" => Ok(SyncStatus::NotSynced),
            "synced" => Ok(SyncStatus::Synced),
            "sync_pending" => Ok(SyncStatus::SyncPending),
            "sync_conflict" => Ok(SyncStatus::SyncConflict),
            other => Err(format!("invalid sync_status value: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    NotStarted,
    InProgress,
    Completed,
    Cancelled,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::NotStarted => "not_started",
            CompletionStatus::InProgress => "in_progress",
            CompletionStatus::Completed => "completed",
            CompletionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim() {
            "not_started" => Ok(CompletionStatus::NotStarted),
            "in_progress" => Ok(CompletionStatus::InProgress),
            "completed" => Ok(CompletionStatus::Completed),
            "cancelled" => Ok(CompletionStatus::Cancelled),
            other => Err(format!("invalid completion_status value: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalEntry {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub date: NaiveDate,
    pub calendar_event_id: Option<String>,
    pub sync_status: SyncStatus,
    pub completion_status: Option<CompletionStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// External calendar event data handed to conflict detection and resolution.
/// Never persisted; the caller owns it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEventPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_status: Option<CompletionStatus>,
}

impl CalendarEventPayload {
    /// Parses `last_modified` as RFC 3339, falling back to a naive timestamp
    /// taken as UTC. Missing or unparseable values yield `None`.
    pub fn last_modified_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_modified.as_deref().map(str::trim)?;
        if raw.is_empty() {
            return None;
        }
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Blank titles collapse to the default title; everything else is trimmed.
pub fn normalize_title(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn validate_title(title: &str) -> Result<(), String> {
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(format!("title must be {MAX_TITLE_CHARS} characters or less"));
    }
    Ok(())
}

pub fn validate_content(content: &str) -> Result<(), String> {
    if content.trim().is_empty() {
        return Err("content cannot be empty".to_string());
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(format!(
            "content must be {MAX_CONTENT_CHARS} characters or less"
        ));
    }
    Ok(())
}
