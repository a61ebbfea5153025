use crate::domain::models::{JournalEntry, normalize_title};
use crate::infrastructure::error::JournalError;
use chrono::{Duration, NaiveDate, NaiveTime};
use icalendar::{Calendar, Component, Event, EventLike};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

pub const MAX_EVENT_TITLE_CHARS: usize = 100;
pub const MAX_EVENT_DESCRIPTION_CHARS: usize = 500;
pub const DEFAULT_ELLIPSIS: &str = "...";

const EVENT_START_HOUR: u32 = 9;
const EVENT_DURATION_MINUTES: i64 = 60;
const SAME_DAY_SPACING_MINUTES: i64 = 30;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static MARKDOWN_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid regex"));
static MARKDOWN_ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*]+)\*").expect("valid regex"));
static MARKDOWN_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));
static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^\)]+\)").expect("valid regex"));

/// Reduces HTML and markdown markup to plain text. The passes are ordered
/// (tags, bold, italic, code, links) and each one runs on the previous
/// pass's output; everything else, emoji included, passes through verbatim.
pub fn strip_formatting(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = HTML_TAG.replace_all(text, "");
    let text = MARKDOWN_BOLD.replace_all(&text, "$1");
    let text = MARKDOWN_ITALIC.replace_all(&text, "$1");
    let text = MARKDOWN_CODE.replace_all(&text, "$1");
    let text = MARKDOWN_LINK.replace_all(&text, "$1");
    text.trim().to_string()
}

/// Character-counted truncation; the ellipsis is included in the budget.
pub fn truncate_text(text: &str, max_length: usize, ellipsis: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let keep = max_length.saturating_sub(ellipsis.chars().count());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(ellipsis);
    truncated
}

/// Stable across regenerations of the same entry, unique across entries and
/// users.
pub fn event_uid(entry: &JournalEntry) -> String {
    format!("journal-entry-{}@{}", entry.id, entry.user_id)
}

pub fn generate_event_from_entry(entry: &JournalEntry, time_offset_minutes: i64) -> Event {
    let title = truncate_text(
        &strip_formatting(&normalize_title(&entry.title)),
        MAX_EVENT_TITLE_CHARS,
        DEFAULT_ELLIPSIS,
    );
    let description = truncate_text(
        &strip_formatting(&entry.content),
        MAX_EVENT_DESCRIPTION_CHARS,
        DEFAULT_ELLIPSIS,
    );

    let start_time = NaiveTime::from_hms_opt(EVENT_START_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
    let start = entry.date.and_time(start_time).and_utc() + Duration::minutes(time_offset_minutes);
    let end = start + Duration::minutes(EVENT_DURATION_MINUTES);

    let mut event = Event::new();
    event
        .uid(&event_uid(entry))
        .summary(&title)
        .description(&description)
        .starts(start)
        .ends(end);
    event.done()
}

/// Entries sharing a date are spaced 30 minutes apart in arrival order so
/// same-day entries do not collide in the generated schedule.
pub fn generate_calendar_from_entries(entries: &[JournalEntry]) -> Calendar {
    let mut calendar = Calendar::new();
    let mut seen_per_date: HashMap<NaiveDate, i64> = HashMap::new();

    for entry in entries {
        let index = seen_per_date.entry(entry.date).or_insert(0);
        let offset_minutes = *index * SAME_DAY_SPACING_MINUTES;
        *index += 1;
        calendar.push(generate_event_from_entry(entry, offset_minutes));
    }
    calendar.done()
}

pub fn generate_ics_text(entries: &[JournalEntry]) -> Result<String, JournalError> {
    if entries.is_empty() {
        return Err(JournalError::Validation(
            "cannot export an empty set of journal entries".to_string(),
        ));
    }
    Ok(generate_calendar_from_entries(entries).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SyncStatus;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_entry(id: i64, title: &str, content: &str, date: &str) -> JournalEntry {
        JournalEntry {
            id,
            user_id: 7,
            title: title.to_string(),
            content: content.to_string(),
            date: date.parse().expect("valid date"),
            calendar_event_id: None,
            sync_status: SyncStatus::NotSynced,
            completion_status: None,
            created_at: fixed_time("2024-01-15T08:00:00Z"),
            updated_at: fixed_time("2024-01-15T08:00:00Z"),
        }
    }

    fn dtstart_lines(ics: &str) -> Vec<String> {
        ics.lines()
            .filter(|line| line.starts_with("DTSTART"))
            .map(|line| line.trim().to_string())
            .collect()
    }

    #[test]
    fn strip_formatting_removes_markup_in_order() {
        assert_eq!(strip_formatting("<b>Bold</b> *x*"), "Bold x");
        assert_eq!(strip_formatting("**bold** and `code`"), "bold and code");
        assert_eq!(
            strip_formatting("read [the docs](https://example.net/docs) today"),
            "read the docs today"
        );
        assert_eq!(strip_formatting("<p>para</p>"), "para");
        assert_eq!(strip_formatting(""), "");
    }

    #[test]
    fn strip_formatting_preserves_emoji_and_non_ascii() {
        assert_eq!(strip_formatting("🌙 *night* walk"), "🌙 night walk");
        assert_eq!(strip_formatting("café **réunion**"), "café réunion");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate_text("ééééé", 4, DEFAULT_ELLIPSIS), "é...");
        assert_eq!(truncate_text("ééééé", 5, DEFAULT_ELLIPSIS), "ééééé");
    }

    proptest! {
        #[test]
        fn truncate_respects_budget_and_marks_overflow(
            text in "[a-zA-Z0-9 àé🌙]{0,60}",
            max_length in 3usize..40usize
        ) {
            let result = truncate_text(&text, max_length, DEFAULT_ELLIPSIS);
            prop_assert!(result.chars().count() <= max_length);
            let overflowed = text.chars().count() > max_length;
            prop_assert_eq!(result.ends_with(DEFAULT_ELLIPSIS), overflowed);
            if !overflowed {
                prop_assert_eq!(result, text);
            }
        }
    }

    #[test]
    fn blank_title_becomes_untitled_event_at_nine_utc() {
        let entry = sample_entry(12, "", "Hello", "2024-01-15");
        let mut calendar = Calendar::new();
        calendar.push(generate_event_from_entry(&entry, 0));
        let ics = calendar.done().to_string();

        assert!(ics.contains("SUMMARY:Untitled"));
        assert!(ics.contains("DESCRIPTION:Hello"));
        assert!(ics.contains("UID:journal-entry-12@7"));
        assert!(ics.contains("DTSTART:20240115T090000Z"));
        assert!(ics.contains("DTEND:20240115T100000Z"));
    }

    #[test]
    fn event_titles_and_descriptions_are_truncated() {
        let entry = sample_entry(1, &"t".repeat(150), &"c".repeat(600), "2024-01-15");
        let event = generate_event_from_entry(&entry, 0);
        let summary = event.get_summary().expect("summary").to_string();
        let description = event.get_description().expect("description").to_string();

        assert_eq!(summary.chars().count(), MAX_EVENT_TITLE_CHARS);
        assert!(summary.ends_with(DEFAULT_ELLIPSIS));
        assert_eq!(description.chars().count(), MAX_EVENT_DESCRIPTION_CHARS);
        assert!(description.ends_with(DEFAULT_ELLIPSIS));
    }

    #[test]
    fn same_day_entries_are_spaced_thirty_minutes_apart() {
        let entries = vec![
            sample_entry(1, "A", "first", "2024-01-15"),
            sample_entry(2, "B", "second", "2024-01-16"),
            sample_entry(3, "C", "third", "2024-01-15"),
        ];
        let ics = generate_ics_text(&entries).expect("ics text");
        let starts = dtstart_lines(&ics);

        assert_eq!(starts.len(), 3);
        assert!(starts.contains(&"DTSTART:20240115T090000Z".to_string()));
        assert!(starts.contains(&"DTSTART:20240115T093000Z".to_string()));
        assert!(starts.contains(&"DTSTART:20240116T090000Z".to_string()));
    }

    proptest! {
        #[test]
        fn same_day_offsets_follow_arrival_order(count in 1usize..6usize) {
            let entries: Vec<JournalEntry> = (0..count)
                .map(|index| sample_entry(index as i64 + 1, &format!("Entry {index}"), "text", "2024-01-15"))
                .collect();
            let ics = generate_ics_text(&entries).expect("ics text");
            let starts = dtstart_lines(&ics);

            prop_assert_eq!(starts.len(), count);
            for index in 0..count {
                let minutes = index as i64 * SAME_DAY_SPACING_MINUTES;
                let expected = fixed_time("2024-01-15T09:00:00Z") + Duration::minutes(minutes);
                let line = format!("DTSTART:{}", expected.format("%Y%m%dT%H%M%SZ"));
                prop_assert!(starts.contains(&line), "missing {}", line);
            }
        }
    }

    #[test]
    fn ics_text_contains_one_vevent_per_entry() {
        let entries = vec![
            sample_entry(1, "A", "first", "2024-01-15"),
            sample_entry(2, "B", "second", "2024-01-16"),
        ];
        let ics = generate_ics_text(&entries).expect("ics text");

        assert!(ics.starts_with("BEGIN:VCALENDAR"));
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 2);
        assert!(ics.contains("UID:journal-entry-1@7"));
        assert!(ics.contains("UID:journal-entry-2@7"));
        assert!(ics.trim_end().ends_with("END:VCALENDAR"));
    }

    #[test]
    fn exporting_nothing_is_a_validation_error() {
        let result = generate_ics_text(&[]);
        assert!(matches!(result, Err(JournalError::Validation(_))));
    }
}
