use crate::domain::models::{CompletionStatus, JournalEntry, SyncStatus};
use crate::infrastructure::error::JournalError;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPage {
    pub entries: Vec<JournalEntry>,
    pub total: u64,
}

/// Keyed record store for journal entries. Writes are atomic per entry;
/// callers rely on that for sync bookkeeping.
pub trait EntryStore: Send + Sync {
    fn insert(&self, entry: &JournalEntry) -> Result<JournalEntry, JournalError>;
    fn update(&self, entry: &JournalEntry) -> Result<(), JournalError>;
    fn get(&self, entry_id: i64, user_id: i64) -> Result<Option<JournalEntry>, JournalError>;
    fn list_for_user(
        &self,
        user_id: i64,
        date: Option<NaiveDate>,
        limit: u32,
        offset: u32,
    ) -> Result<EntryPage, JournalError>;
    fn find_by_user_and_status(
        &self,
        user_id: i64,
        status: SyncStatus,
    ) -> Result<Vec<JournalEntry>, JournalError>;
    fn find_by_external_id(
        &self,
        external_event_id: &str,
        user_id: i64,
    ) -> Result<Option<JournalEntry>, JournalError>;
    fn delete(&self, entry_id: i64, user_id: i64) -> Result<bool, JournalError>;
}

const SELECT_COLUMNS: &str = "id, user_id, title, content, date, calendar_event_id, \
     sync_status, completion_status, created_at, updated_at";

type EntryRow = (
    i64,
    i64,
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    String,
    String,
);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn parse_date(value: &str) -> Result<NaiveDate, JournalError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|error| {
        JournalError::InvalidRecord(format!("invalid journal_entries.date '{value}': {error}"))
    })
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>, JournalError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| {
            JournalError::InvalidRecord(format!(
                "invalid journal_entries.{column} '{value}': {error}"
            ))
        })
}

fn entry_from_row(raw: EntryRow) -> Result<JournalEntry, JournalError> {
    let (
        id,
        user_id,
        title,
        content,
        date_raw,
        calendar_event_id,
        sync_status_raw,
        completion_status_raw,
        created_at_raw,
        updated_at_raw,
    ) = raw;

    let sync_status = SyncStatus::parse(&sync_status_raw).map_err(JournalError::InvalidRecord)?;
    let completion_status = completion_status_raw
        .as_deref()
        .map(CompletionStatus::parse)
        .transpose()
        .map_err(JournalError::InvalidRecord)?;

    Ok(JournalEntry {
        id,
        user_id,
        title,
        content,
        date: parse_date(&date_raw)?,
        calendar_event_id,
        sync_status,
        completion_status,
        created_at: parse_timestamp(&created_at_raw, "created_at")?,
        updated_at: parse_timestamp(&updated_at_raw, "updated_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct SqliteEntryStore {
    db_path: PathBuf,
}

impl SqliteEntryStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, JournalError> {
        Connection::open(&self.db_path).map_err(JournalError::from)
    }
}

impl EntryStore for SqliteEntryStore {
    fn insert(&self, entry: &JournalEntry) -> Result<JournalEntry, JournalError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO journal_entries
               (user_id, title, content, date, calendar_event_id,
                sync_status, completion_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.user_id,
                entry.title,
                entry.content,
                entry.date.to_string(),
                entry.calendar_event_id,
                entry.sync_status.as_str(),
                entry.completion_status.map(|status| status.as_str()),
                entry.created_at.to_rfc3339(),
                entry.updated_at.to_rfc3339(),
            ],
        )?;

        let mut inserted = entry.clone();
        inserted.id = connection.last_insert_rowid();
        Ok(inserted)
    }

    fn update(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        let connection = self.connect()?;
        let affected = connection.execute(
            "UPDATE journal_entries SET
               title = ?1, content = ?2, date = ?3, calendar_event_id = ?4,
               sync_status = ?5, completion_status = ?6, updated_at = ?7
             WHERE id = ?8 AND user_id = ?9",
            params![
                entry.title,
                entry.content,
                entry.date.to_string(),
                entry.calendar_event_id,
                entry.sync_status.as_str(),
                entry.completion_status.map(|status| status.as_str()),
                entry.updated_at.to_rfc3339(),
                entry.id,
                entry.user_id,
            ],
        )?;

        if affected == 0 {
            return Err(JournalError::InvalidRecord(format!(
                "journal entry {} not found for user {}",
                entry.id, entry.user_id
            )));
        }
        Ok(())
    }

    fn get(&self, entry_id: i64, user_id: i64) -> Result<Option<JournalEntry>, JournalError> {
        let connection = self.connect()?;
        let row = connection
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM journal_entries WHERE id = ?1 AND user_id = ?2"
                ),
                params![entry_id, user_id],
                read_row,
            )
            .optional()?;
        row.map(entry_from_row).transpose()
    }

    fn list_for_user(
        &self,
        user_id: i64,
        date: Option<NaiveDate>,
        limit: u32,
        offset: u32,
    ) -> Result<EntryPage, JournalError> {
        let connection = self.connect()?;
        let date_text = date.map(|value| value.to_string());

        let (total, rows): (u64, Vec<EntryRow>) = if let Some(date_text) = date_text {
            let total = connection.query_row(
                "SELECT COUNT(*) FROM journal_entries WHERE user_id = ?1 AND date = ?2",
                params![user_id, date_text],
                |row| row.get(0),
            )?;
            let mut statement = connection.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM journal_entries
                 WHERE user_id = ?1 AND date = ?2
                 ORDER BY date DESC, created_at DESC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = statement
                .query_map(params![user_id, date_text, limit, offset], read_row)?
                .collect::<Result<Vec<_>, _>>()?;
            (total, rows)
        } else {
            let total = connection.query_row(
                "SELECT COUNT(*) FROM journal_entries WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            let mut statement = connection.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM journal_entries
                 WHERE user_id = ?1
                 ORDER BY date DESC, created_at DESC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = statement
                .query_map(params![user_id, limit, offset], read_row)?
                .collect::<Result<Vec<_>, _>>()?;
            (total, rows)
        };

        Ok(EntryPage {
            entries: rows
                .into_iter()
                .map(entry_from_row)
                .collect::<Result<Vec<_>, _>>()?,
            total,
        })
    }

    fn find_by_user_and_status(
        &self,
        user_id: i64,
        status: SyncStatus,
    ) -> Result<Vec<JournalEntry>, JournalError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM journal_entries
             WHERE user_id = ?1 AND sync_status = ?2
             ORDER BY id"
        ))?;
        let rows = statement
            .query_map(params![user_id, status.as_str()], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(entry_from_row).collect()
    }

    fn find_by_external_id(
        &self,
        external_event_id: &str,
        user_id: i64,
    ) -> Result<Option<JournalEntry>, JournalError> {
        let connection = self.connect()?;
        let row = connection
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM journal_entries
                     WHERE calendar_event_id = ?1 AND user_id = ?2"
                ),
                params![external_event_id, user_id],
                read_row,
            )
            .optional()?;
        row.map(entry_from_row).transpose()
    }

    fn delete(&self, entry_id: i64, user_id: i64) -> Result<bool, JournalError> {
        let connection = self.connect()?;
        let affected = connection.execute(
            "DELETE FROM journal_entries WHERE id = ?1 AND user_id = ?2",
            params![entry_id, user_id],
        )?;
        Ok(affected > 0)
    }
}

#[derive(Debug, Default)]
struct InMemoryEntries {
    entries: HashMap<i64, JournalEntry>,
    next_id: i64,
}

#[derive(Debug, Default)]
pub struct InMemoryEntryStore {
    state: Mutex<InMemoryEntries>,
}

impl InMemoryEntryStore {
    fn lock(&self) -> Result<MutexGuard<'_, InMemoryEntries>, JournalError> {
        self.state
            .lock()
            .map_err(|error| JournalError::InvalidRecord(format!("entry store lock poisoned: {error}")))
    }
}

impl EntryStore for InMemoryEntryStore {
    fn insert(&self, entry: &JournalEntry) -> Result<JournalEntry, JournalError> {
        let mut state = self.lock()?;
        state.next_id += 1;
        let mut inserted = entry.clone();
        inserted.id = state.next_id;
        state.entries.insert(inserted.id, inserted.clone());
        Ok(inserted)
    }

    fn update(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        let mut state = self.lock()?;
        match state.entries.get_mut(&entry.id) {
            Some(existing) if existing.user_id == entry.user_id => {
                *existing = entry.clone();
                Ok(())
            }
            _ => Err(JournalError::InvalidRecord(format!(
                "journal entry {} not found for user {}",
                entry.id, entry.user_id
            ))),
        }
    }

    fn get(&self, entry_id: i64, user_id: i64) -> Result<Option<JournalEntry>, JournalError> {
        let state = self.lock()?;
        Ok(state
            .entries
            .get(&entry_id)
            .filter(|entry| entry.user_id == user_id)
            .cloned())
    }

    fn list_for_user(
        &self,
        user_id: i64,
        date: Option<NaiveDate>,
        limit: u32,
        offset: u32,
    ) -> Result<EntryPage, JournalError> {
        let state = self.lock()?;
        let mut matching: Vec<JournalEntry> = state
            .entries
            .values()
            .filter(|entry| entry.user_id == user_id)
            .filter(|entry| date.is_none_or(|wanted| entry.date == wanted))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let total = matching.len() as u64;
        let entries = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(EntryPage { entries, total })
    }

    fn find_by_user_and_status(
        &self,
        user_id: i64,
        status: SyncStatus,
    ) -> Result<Vec<JournalEntry>, JournalError> {
        let state = self.lock()?;
        let mut matching: Vec<JournalEntry> = state
            .entries
            .values()
            .filter(|entry| entry.user_id == user_id && entry.sync_status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|entry| entry.id);
        Ok(matching)
    }

    fn find_by_external_id(
        &self,
        external_event_id: &str,
        user_id: i64,
    ) -> Result<Option<JournalEntry>, JournalError> {
        let state = self.lock()?;
        Ok(state
            .entries
            .values()
            .find(|entry| {
                entry.user_id == user_id
                    && entry.calendar_event_id.as_deref() == Some(external_event_id)
            })
            .cloned())
    }

    fn delete(&self, entry_id: i64, user_id: i64) -> Result<bool, JournalError> {
        let mut state = self.lock()?;
        match state.entries.get(&entry_id) {
            Some(entry) if entry.user_id == user_id => {
                state.entries.remove(&entry_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
