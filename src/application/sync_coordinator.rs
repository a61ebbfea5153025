use crate::application::NowProvider;
use crate::domain::models::{
    CalendarEventPayload, CompletionStatus, JournalEntry, SyncStatus, normalize_title,
};
use crate::infrastructure::calendar_transport::CalendarTransport;
use crate::infrastructure::connectivity::ConnectivityCheck;
use crate::infrastructure::entry_store::EntryStore;
use crate::infrastructure::error::JournalError;
use crate::infrastructure::event_codec::{event_uid, generate_ics_text};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub success: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// Owns the sync lifecycle of journal entries: pushing them out through the
/// calendar transport, resolving conflicts against inbound event data, and
/// batching pending work. Persistence failures during sync never escape as
/// errors; they are absorbed into the returned status.
pub struct SyncCoordinator<T, S, C>
where
    T: CalendarTransport,
    S: EntryStore,
    C: ConnectivityCheck,
{
    transport: Arc<T>,
    entry_store: Arc<S>,
    connectivity: Arc<C>,
    now_provider: NowProvider,
}

impl<T, S, C> SyncCoordinator<T, S, C>
where
    T: CalendarTransport,
    S: EntryStore,
    C: ConnectivityCheck,
{
    pub fn new(transport: Arc<T>, entry_store: Arc<S>, connectivity: Arc<C>) -> Self {
        Self {
            transport,
            entry_store,
            connectivity,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Pushes one entry out to the calendar. Safe to repeat: the entry ends
    /// up `Synced` with the same deterministic event id every time. On any
    /// failure the entry is left `SyncPending` for the next batch pass and
    /// its content is untouched.
    pub async fn sync_entry_to_calendar(&self, entry: &JournalEntry) -> bool {
        match self.push_entry(entry).await {
            Ok(uid) => {
                tracing::info!("synced journal entry {} to calendar as {uid}", entry.id);
                true
            }
            Err(error) => {
                tracing::error!("error syncing entry {} to calendar: {error}", entry.id);
                self.record_pending(entry);
                false
            }
        }
    }

    async fn push_entry(&self, entry: &JournalEntry) -> Result<String, JournalError> {
        let ics = generate_ics_text(std::slice::from_ref(entry))?;
        let uid = event_uid(entry);
        self.transport.publish_event(&uid, &ics).await?;

        let mut synced = entry.clone();
        synced.sync_status = SyncStatus::Synced;
        synced.calendar_event_id = Some(uid.clone());
        synced.updated_at = (self.now_provider)();
        self.entry_store.update(&synced)?;
        Ok(uid)
    }

    fn record_pending(&self, entry: &JournalEntry) {
        let mut pending = entry.clone();
        pending.sync_status = SyncStatus::SyncPending;
        if let Err(error) = self.entry_store.update(&pending) {
            tracing::warn!("could not record pending sync for entry {}: {error}", entry.id);
        }
    }

    /// A conflict exists iff the calendar side was modified strictly later
    /// than the entry, both normalized to UTC. A missing timestamp on the
    /// payload means no conflict: the local entry wins.
    pub fn detect_conflict(&self, entry: &JournalEntry, payload: &CalendarEventPayload) -> bool {
        let Some(event_updated) = payload.last_modified_utc() else {
            return false;
        };
        event_updated > entry.updated_at
    }

    /// Last-write-wins in the payload's favor (the newer side, per the
    /// detection contract). Fields absent from the payload keep the entry's
    /// values, except `completion_status` which always mirrors the payload.
    pub fn resolve_conflict(
        &self,
        entry: &JournalEntry,
        payload: &CalendarEventPayload,
    ) -> Result<JournalEntry, JournalError> {
        let mut resolved = entry.clone();
        if let Some(title) = non_blank(payload.title.as_deref()) {
            resolved.title = title.to_string();
        }
        if let Some(description) = non_blank(payload.description.as_deref()) {
            resolved.content = description.to_string();
        }
        resolved.completion_status = payload.completion_status;
        resolved.sync_status = SyncStatus::Synced;
        resolved.updated_at = (self.now_provider)();
        self.entry_store.update(&resolved)?;

        tracing::info!(
            "resolved conflict for journal entry {} using last-write-wins",
            resolved.id
        );
        Ok(resolved)
    }

    /// Applies a completion status reported by the calendar. On a store
    /// failure the write is rolled back and `false` is returned; the
    /// caller's entry is untouched either way.
    pub fn sync_completion_status(&self, entry: &JournalEntry, status: CompletionStatus) -> bool {
        let mut updated = entry.clone();
        updated.completion_status = Some(status);
        updated.sync_status = SyncStatus::Synced;
        updated.updated_at = (self.now_provider)();

        match self.entry_store.update(&updated) {
            Ok(()) => {
                tracing::info!(
                    "synced completion status '{}' for entry {}",
                    status.as_str(),
                    entry.id
                );
                true
            }
            Err(error) => {
                tracing::error!(
                    "error syncing completion status for entry {}: {error}",
                    entry.id
                );
                false
            }
        }
    }

    /// Deletes the entry paired with an externally deleted calendar event.
    /// Returns `false` when no entry is paired with the event; that is not
    /// an error.
    pub fn handle_calendar_event_deletion(&self, external_event_id: &str, user_id: i64) -> bool {
        match self.delete_paired_entry(external_event_id, user_id) {
            Ok(deleted) => deleted,
            Err(error) => {
                tracing::error!(
                    "error handling calendar event deletion {external_event_id}: {error}"
                );
                false
            }
        }
    }

    fn delete_paired_entry(
        &self,
        external_event_id: &str,
        user_id: i64,
    ) -> Result<bool, JournalError> {
        let Some(entry) = self
            .entry_store
            .find_by_external_id(external_event_id, user_id)?
        else {
            return Ok(false);
        };

        self.entry_store.delete(entry.id, user_id)?;
        tracing::info!(
            "deleted journal entry {} after its calendar event was removed",
            entry.id
        );
        Ok(true)
    }

    /// Pushes every `SyncPending` entry for the user, one at a time. One
    /// entry's failure does not abort the batch. When the device is offline
    /// the whole batch is skipped.
    pub async fn sync_all_pending(&self, user_id: i64) -> SyncReport {
        if self.connectivity.is_offline() {
            tracing::warn!("device is offline, cannot sync entries for user {user_id}");
            return SyncReport::default();
        }

        let pending = match self
            .entry_store
            .find_by_user_and_status(user_id, SyncStatus::SyncPending)
        {
            Ok(entries) => entries,
            Err(error) => {
                tracing::error!("error loading pending entries for user {user_id}: {error}");
                return SyncReport::default();
            }
        };

        let mut report = SyncReport::default();
        for entry in &pending {
            if self.sync_entry_to_calendar(entry).await {
                report.success += 1;
            } else {
                report.failed += 1;
            }
        }

        tracing::info!(
            "synced {} entries, {} failed for user {user_id}",
            report.success,
            report.failed
        );
        report
    }

    /// Inbound ingestion: a calendar event becomes a journal entry that is
    /// already `Synced` and carries the external event id.
    pub fn entry_from_calendar_event(
        &self,
        user_id: i64,
        payload: &CalendarEventPayload,
        date: Option<NaiveDate>,
        external_event_id: Option<&str>,
    ) -> Result<JournalEntry, JournalError> {
        let now = (self.now_provider)();
        let entry = JournalEntry {
            id: 0,
            user_id,
            title: normalize_title(payload.title.as_deref().unwrap_or_default()),
            content: payload
                .description
                .as_deref()
                .unwrap_or_default()
                .trim()
                .to_string(),
            date: date.unwrap_or_else(|| now.date_naive()),
            calendar_event_id: external_event_id
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned),
            sync_status: SyncStatus::Synced,
            completion_status: payload.completion_status,
            created_at: now,
            updated_at: now,
        };

        let entry = self.entry_store.insert(&entry)?;
        tracing::info!(
            "journal entry {} created from calendar event for user {user_id}",
            entry.id
        );
        Ok(entry)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
