//! Legacy flat-file layout: one JSON document per content key plus a single
//! `messages.json` list, under a local data directory. Read-only - the store
//! only consults these files when the primary backend has no record, and an
//! unreadable file just means the fallback continues to the default.

use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::ContentKey;

/// A message as stored by the flat-file era. Ids are discarded on import -
/// the backend assigns fresh ones.
#[derive(Debug, Deserialize)]
pub struct LegacyMessage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read: bool,
}

pub fn read_document(data_dir: &Path, key: ContentKey) -> Option<Value> {
    read_json(&data_dir.join(format!("{}.json", key.as_str())))
}

pub fn read_messages(data_dir: &Path) -> Option<Vec<LegacyMessage>> {
    let path = data_dir.join("messages.json");
    let value = read_json(&path)?;
    match serde_json::from_value(value) {
        Ok(messages) => Some(messages),
        Err(e) => {
            tracing::warn!(path = %path.display(), "legacy message list has unexpected shape: {}", e);
            None
        }
    }
}

fn read_json(path: &Path) -> Option<Value> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to read legacy file: {}", e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), "legacy file is not valid JSON: {}", e);
            None
        }
    }
}
