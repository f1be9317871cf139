//! Append-only note sink behind the `note_saver` tool.
//!
//! Two on-disk formats are supported (`notes.format`):
//!
//! - `csv`: header `timestamp,title,content`, one record per note.
//! - `text`: one line per note, `<timestamp> <text>`.
//!
//! The backing file and its parent directory are created on first use.
//! Timestamps are RFC 3339 with millisecond precision and strictly
//! increasing within a file, even when two notes land in the same
//! millisecond or the clock steps backwards.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use serde_json::Value;

use crate::config::NotesConfig;
use crate::error::FolioError;

/// A note as handed to the sink: free text, or a titled record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteContent {
    Plain(String),
    Structured {
        title: Option<String>,
        content: String,
    },
}

impl NoteContent {
    /// Interpret a tool argument. Objects with a `content` field (or JSON
    /// text encoding one) become structured notes. `note` and `input`
    /// wrappers are unwrapped, as is any single-key object holding a
    /// string; anything else is plain.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) if map.contains_key("content") => {
                let content = match &map["content"] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let title = map
                    .get("title")
                    .and_then(|t| t.as_str())
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty());
                NoteContent::Structured { title, content }
            }
            Value::Object(map) if map.contains_key("note") => NoteContent::from_value(&map["note"]),
            Value::Object(map) if map.contains_key("input") => NoteContent::from_value(&map["input"]),
            Value::Object(map) if map.len() == 1 => match map.values().next() {
                Some(Value::String(s)) => NoteContent::Plain(s.clone()),
                _ => NoteContent::Plain(value.to_string()),
            },
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(parsed @ Value::Object(_)) => NoteContent::from_value(&parsed),
                _ => NoteContent::Plain(s.clone()),
            },
            other => NoteContent::Plain(other.to_string()),
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            NoteContent::Plain(_) => None,
            NoteContent::Structured { title, .. } => title.as_deref(),
        }
    }

    /// Text as stored: the content, prefixed by the title when present.
    pub fn stored_text(&self) -> String {
        match self {
            NoteContent::Plain(text) => text.clone(),
            NoteContent::Structured {
                title: Some(title),
                content,
            } => format!("{}: {}", title, content),
            NoteContent::Structured {
                title: None,
                content,
            } => content.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteFormat {
    Csv,
    Text,
}

impl NoteFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "csv" => Some(NoteFormat::Csv),
            "text" | "txt" => Some(NoteFormat::Text),
            _ => None,
        }
    }
}

/// Result of a successful save.
#[derive(Debug, Clone)]
pub struct NoteReceipt {
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub stored: String,
}

pub struct NoteSink {
    path: PathBuf,
    format: NoteFormat,
    // `None` until the file has been inspected.
    last: Mutex<Option<DateTime<Utc>>>,
}

impl NoteSink {
    pub fn new(path: impl Into<PathBuf>, format: NoteFormat) -> Self {
        Self {
            path: path.into(),
            format,
            last: Mutex::new(None),
        }
    }

    pub fn from_config(config: &NotesConfig) -> Self {
        let format = NoteFormat::parse(&config.format).unwrap_or(NoteFormat::Csv);
        Self::new(config.path.clone(), format)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, note: &NoteContent) -> Result<NoteReceipt, FolioError> {
        let mut last = self.last.lock().map_err(|_| self.error("note sink lock poisoned"))?;

        if last.is_none() {
            *last = Some(self.last_timestamp_on_disk()?.unwrap_or(DateTime::<Utc>::MIN_UTC));
        }
        let previous = last.unwrap_or(DateTime::<Utc>::MIN_UTC);
        let timestamp = next_timestamp(Utc::now(), previous);

        let stored = note.stored_text();
        self.append(timestamp, note.title().unwrap_or(""), &stored)?;
        *last = Some(timestamp);

        tracing::info!(path = %self.path.display(), "note saved");
        Ok(NoteReceipt {
            path: self.path.clone(),
            timestamp,
            stored,
        })
    }

    fn append(&self, timestamp: DateTime<Utc>, title: &str, text: &str) -> Result<(), FolioError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.error(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.error(e))?;
        let is_new = file.metadata().map_err(|e| self.error(e))?.len() == 0;
        let ts = format_timestamp(timestamp);

        match self.format {
            NoteFormat::Csv => {
                let mut writer = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(&mut file);
                if is_new {
                    writer
                        .write_record(["timestamp", "title", "content"])
                        .map_err(|e| self.error(e))?;
                }
                writer
                    .write_record([ts.as_str(), title, text])
                    .map_err(|e| self.error(e))?;
                writer.flush().map_err(|e| self.error(e))?;
            }
            NoteFormat::Text => {
                let line = text.replace(['\r', '\n'], " ");
                writeln!(file, "{} {}", ts, line).map_err(|e| self.error(e))?;
            }
        }
        Ok(())
    }

    fn last_timestamp_on_disk(&self) -> Result<Option<DateTime<Utc>>, FolioError> {
        if !self.path.exists() {
            return Ok(None);
        }
        match self.format {
            NoteFormat::Csv => {
                let mut reader = csv::Reader::from_path(&self.path).map_err(|e| self.error(e))?;
                let mut last = None;
                for record in reader.records() {
                    let record = record.map_err(|e| self.error(e))?;
                    if let Some(ts) = record.get(0).and_then(parse_timestamp) {
                        last = Some(ts);
                    }
                }
                Ok(last)
            }
            NoteFormat::Text => {
                let file = fs::File::open(&self.path).map_err(|e| self.error(e))?;
                let mut last = None;
                for line in BufReader::new(file).lines() {
                    let line = line.map_err(|e| self.error(e))?;
                    if let Some(ts) = line.split_whitespace().next().and_then(parse_timestamp) {
                        last = Some(ts);
                    }
                }
                Ok(last)
            }
        }
    }

    fn error(&self, detail: impl ToString) -> FolioError {
        FolioError::NoteSink {
            path: self.path.clone(),
            detail: detail.to_string(),
        }
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `now` truncated to milliseconds, bumped past `previous` when needed.
fn next_timestamp(now: DateTime<Utc>, previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now.trunc_subsecs(3);
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}
