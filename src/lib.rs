pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::NowProvider;
pub use application::bootstrap::{BootstrapResult, bootstrap_workspace};
pub use application::journal::JournalService;
pub use application::sync_coordinator::{SyncCoordinator, SyncReport};
pub use domain::models::{CalendarEventPayload, CompletionStatus, JournalEntry, SyncStatus};
pub use infrastructure::calendar_transport::{
    CaldavTransport, CalendarTransport, InMemoryCalendarTransport,
};
pub use infrastructure::connectivity::{AssumeOnline, ConnectivityCheck};
pub use infrastructure::entry_store::{EntryPage, EntryStore, InMemoryEntryStore, SqliteEntryStore};
pub use infrastructure::error::JournalError;
pub use infrastructure::event_codec::{
    event_uid, generate_calendar_from_entries, generate_event_from_entry, generate_ics_text,
    strip_formatting, truncate_text,
};
