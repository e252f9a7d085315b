//! User-visible notifications.
//!
//! Failures that reach the user (a rolled-back move, a failed search) become
//! transient [`Notification`]s carrying a human-readable cause. Notifications
//! can be written as JSON lines to stdout or a file for external consumers.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};

pub const NOTIFICATION_SCHEMA_VERSION: &str = "taskview.notification.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    MoveFailed,
    SearchFailed,
    RefreshFailed,
    FilterSaved,
    FilterDeleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub level: NotificationLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl Notification {
    pub fn error(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self::new(kind, NotificationLevel::Error, message)
    }

    pub fn success(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self::new(kind, NotificationLevel::Success, message)
    }

    fn new(kind: NotificationKind, level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            kind,
            level,
            message: message.into(),
            timestamp: Utc::now(),
            task_id: None,
        }
    }

    pub fn for_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }
}

#[derive(Debug, Clone)]
pub enum NotificationDestination {
    Stdout,
    File(PathBuf),
}

impl NotificationDestination {
    /// `-` means stdout; blank means no destination.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(NotificationDestination::Stdout);
            }
            Some(NotificationDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<NotificationSink> {
        match self {
            NotificationDestination::Stdout => Ok(NotificationSink::stdout()),
            NotificationDestination::File(path) => NotificationSink::file(path),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    schema_version: &'static str,
    #[serde(flatten)]
    notification: &'a Notification,
}

/// JSONL writer for notifications.
pub struct NotificationSink {
    writer: Box<dyn Write + Send>,
}

impl NotificationSink {
    pub fn stdout() -> Self {
        Self {
            writer: Box::new(std::io::stdout()),
        }
    }

    /// Append to a file, creating it if necessary.
    pub fn file(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Box::new(file),
        })
    }

    pub fn emit(&mut self, notification: &Notification) -> Result<()> {
        let envelope = Envelope {
            schema_version: NOTIFICATION_SCHEMA_VERSION,
            notification,
        };
        let serialized = serde_json::to_vec(&envelope)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_destination() {
        assert!(NotificationDestination::parse(None).is_none());
        assert!(NotificationDestination::parse(Some("  ")).is_none());
        assert!(matches!(
            NotificationDestination::parse(Some("-")),
            Some(NotificationDestination::Stdout)
        ));
        assert!(matches!(
            NotificationDestination::parse(Some("out.jsonl")),
            Some(NotificationDestination::File(_))
        ));
    }

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.jsonl");
        let mut sink = NotificationSink::file(&path).expect("sink");
        sink.emit(&Notification::error(NotificationKind::MoveFailed, "boom").for_task("t-1"))
            .expect("emit");
        sink.emit(&Notification::success(NotificationKind::FilterSaved, "saved"))
            .expect("emit");

        let content = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["schema_version"], NOTIFICATION_SCHEMA_VERSION);
        assert_eq!(lines[0]["kind"], "move_failed");
        assert_eq!(lines[0]["level"], "error");
        assert_eq!(lines[0]["task_id"], "t-1");
        assert!(lines[1].get("task_id").is_none());
    }
}
