use crate::application::NowProvider;
use crate::domain::models::{
    JournalEntry, SyncStatus, normalize_title, validate_content, validate_title,
};
use crate::infrastructure::entry_store::{EntryPage, EntryStore};
use crate::infrastructure::error::JournalError;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

/// Entry CRUD. Every successful edit leaves the entry `SyncPending` so the
/// next batch pass pushes it back out to the calendar.
pub struct JournalService<S>
where
    S: EntryStore,
{
    entry_store: Arc<S>,
    now_provider: NowProvider,
}

impl<S> JournalService<S>
where
    S: EntryStore,
{
    pub fn new(entry_store: Arc<S>) -> Self {
        Self {
            entry_store,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn create_entry(
        &self,
        user_id: i64,
        title: &str,
        content: &str,
        date: Option<NaiveDate>,
    ) -> Result<JournalEntry, JournalError> {
        validate_title(title).map_err(JournalError::Validation)?;
        let content = content.trim();
        validate_content(content).map_err(JournalError::Validation)?;

        let now = (self.now_provider)();
        let entry = JournalEntry {
            id: 0,
            user_id,
            title: normalize_title(title),
            content: content.to_string(),
            date: date.unwrap_or_else(|| now.date_naive()),
            calendar_event_id: None,
            sync_status: SyncStatus::NotSynced,
            completion_status: None,
            created_at: now,
            updated_at: now,
        };

        let entry = self.entry_store.insert(&entry)?;
        tracing::info!("journal entry {} created for user {user_id}", entry.id);
        Ok(entry)
    }

    pub fn get_entry(
        &self,
        entry_id: i64,
        user_id: i64,
    ) -> Result<Option<JournalEntry>, JournalError> {
        let entry = self.entry_store.get(entry_id, user_id)?;
        if entry.is_none() {
            tracing::debug!("journal entry {entry_id} not found for user {user_id}");
        }
        Ok(entry)
    }

    pub fn list_entries(
        &self,
        user_id: i64,
        date: Option<NaiveDate>,
        limit: u32,
        offset: u32,
    ) -> Result<EntryPage, JournalError> {
        self.entry_store.list_for_user(user_id, date, limit, offset)
    }

    pub fn update_entry(
        &self,
        entry_id: i64,
        user_id: i64,
        title: Option<&str>,
        content: Option<&str>,
        date: Option<NaiveDate>,
    ) -> Result<Option<JournalEntry>, JournalError> {
        let Some(mut entry) = self.entry_store.get(entry_id, user_id)? else {
            return Ok(None);
        };

        if let Some(title) = title {
            validate_title(title).map_err(JournalError::Validation)?;
            entry.title = normalize_title(title);
        }
        if let Some(content) = content {
            let content = content.trim();
            validate_content(content).map_err(JournalError::Validation)?;
            entry.content = content.to_string();
        }
        if let Some(date) = date {
            entry.date = date;
        }

        entry.updated_at = (self.now_provider)();
        entry.sync_status = SyncStatus::SyncPending;
        self.entry_store.update(&entry)?;

        tracing::info!("journal entry {entry_id} updated for user {user_id}");
        Ok(Some(entry))
    }

    pub fn delete_entry(&self, entry_id: i64, user_id: i64) -> Result<bool, JournalError> {
        let deleted = self.entry_store.delete(entry_id, user_id)?;
        if deleted {
            tracing::info!("journal entry {entry_id} deleted for user {user_id}");
        }
        Ok(deleted)
    }
}
