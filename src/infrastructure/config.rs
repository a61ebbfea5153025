use crate::infrastructure::error::JournalError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const CALDAV_JSON: &str = "caldav.json";
const DEFAULT_CALENDAR_NAME: &str = "Journal";

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigBundle {
    pub app: serde_json::Value,
    pub caldav: serde_json::Value,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "Daybook",
                "timezone": "UTC"
            }),
        ),
        (
            CALDAV_JSON,
            serde_json::json!({
                "schema": 1,
                "serverUrl": null,
                "calendarName": DEFAULT_CALENDAR_NAME
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), JournalError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, JournalError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| {
            JournalError::InvalidConfig(format!("missing schema in {}", path.display()))
        })?;
    if schema != 1 {
        return Err(JournalError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_configs(config_dir: &Path) -> Result<ConfigBundle, JournalError> {
    Ok(ConfigBundle {
        app: read_config(&config_dir.join(APP_JSON))?,
        caldav: read_config(&config_dir.join(CALDAV_JSON))?,
    })
}

/// `None` means no CalDAV server is configured and outward sync stays on the
/// in-memory transport.
pub fn read_caldav_server_url(config_dir: &Path) -> Result<Option<String>, JournalError> {
    let caldav = read_config(&config_dir.join(CALDAV_JSON))?;
    Ok(caldav
        .get("serverUrl")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned))
}

pub fn read_calendar_name(config_dir: &Path) -> Result<String, JournalError> {
    let caldav = read_config(&config_dir.join(CALDAV_JSON))?;
    let name = caldav
        .get("calendarName")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_CALENDAR_NAME);
    Ok(name.to_string())
}

pub fn read_timezone(config_dir: &Path) -> Result<Option<String>, JournalError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned))
}

pub fn save_caldav_server_url(config_dir: &Path, server_url: &str) -> Result<(), JournalError> {
    let server_url = server_url.trim();
    if server_url.is_empty() {
        return Err(JournalError::InvalidConfig(
            "serverUrl must not be empty".to_string(),
        ));
    }

    let path = config_dir.join(CALDAV_JSON);
    let mut caldav = read_config(&path)?;
    let object = caldav.as_object_mut().ok_or_else(|| {
        JournalError::InvalidConfig(format!("invalid object structure in {}", path.display()))
    })?;
    object.insert(
        "serverUrl".to_string(),
        serde_json::Value::String(server_url.to_string()),
    );

    let formatted = serde_json::to_string_pretty(&caldav)?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_written_once_and_load_cleanly() {
        let dir = tempfile::tempdir().expect("temp dir");
        ensure_default_configs(dir.path()).expect("ensure defaults");

        let bundle = load_configs(dir.path()).expect("load configs");
        assert_eq!(
            bundle.app.get("appName").and_then(serde_json::Value::as_str),
            Some("Daybook")
        );
        assert_eq!(read_caldav_server_url(dir.path()).expect("server url"), None);
        assert_eq!(
            read_calendar_name(dir.path()).expect("calendar name"),
            DEFAULT_CALENDAR_NAME
        );
        assert_eq!(
            read_timezone(dir.path()).expect("timezone"),
            Some("UTC".to_string())
        );
    }

    #[test]
    fn saved_server_url_round_trips() {
        let dir = tempfile::tempdir().expect("temp dir");
        ensure_default_configs(dir.path()).expect("ensure defaults");

        save_caldav_server_url(dir.path(), " https://cal.example.net/dav/journal ")
            .expect("save url");
        assert_eq!(
            read_caldav_server_url(dir.path()).expect("server url"),
            Some("https://cal.example.net/dav/journal".to_string())
        );

        assert!(save_caldav_server_url(dir.path(), "   ").is_err());
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join(APP_JSON), r#"{"schema": 2}"#).expect("write config");
        fs::write(
            dir.path().join(CALDAV_JSON),
            r#"{"schema": 1, "serverUrl": null}"#,
        )
        .expect("write config");

        assert!(matches!(
            load_configs(dir.path()),
            Err(JournalError::InvalidConfig(_))
        ));
    }
}
