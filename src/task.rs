//! Task records and the in-memory collection the views are computed from.
//!
//! `TaskCollection` is the only owner of task records. Everything else either
//! borrows tasks or refers to them by id.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Lifecycle status. Also the identity of a board column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Open,
        TaskStatus::InProgress,
        TaskStatus::Resolved,
        TaskStatus::Closed,
    ];

    /// Display label, as stored by the record store.
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Open => "Open",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Resolved => "Resolved",
            TaskStatus::Closed => "Closed",
        }
    }

    /// Lenient parse: accepts "In Progress", "in_progress", "InProgress".
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .trim()
            .chars()
            .filter(|ch| !matches!(ch, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "open" => Some(TaskStatus::Open),
            "inprogress" => Some(TaskStatus::InProgress),
            "resolved" => Some(TaskStatus::Resolved),
            "closed" => Some(TaskStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TaskStatus::parse(s)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown status '{s}'")))
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TaskStatus::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown status '{raw}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Severity::ALL
            .into_iter()
            .find(|severity| severity.label().eq_ignore_ascii_case(raw.trim()))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Severity::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown severity '{raw}'")))
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Severity::parse(s)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown severity '{s}'")))
    }
}

fn default_severity() -> Severity {
    Severity::Medium
}

fn dedup_tags<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error> {
    let raw: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(normalize_tags(raw.unwrap_or_default()))
}

/// Drops blank and repeated tags, keeping first-seen order.
pub fn normalize_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty() && seen.insert(tag.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default, deserialize_with = "dedup_tags")]
    pub tags: Vec<String>,
    #[serde(
        default,
        alias = "assigned_to",
        alias = "assignedTo",
        skip_serializing_if = "Option::is_none"
    )]
    pub assignee: Option<String>,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>, status: TaskStatus) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status,
            severity: default_severity(),
            tags: Vec::new(),
            assignee: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Assignee with blank values treated as unassigned.
    pub fn assignee(&self) -> Option<&str> {
        self.assignee
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Partial update sent to the record store. Only set fields are serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Distinct option values used to populate filter pickers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub tags: Vec<String>,
    pub assignees: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskCollection {
    tasks: Vec<Task>,
}

impl TaskCollection {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Full replace from a record store refresh.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    /// Replace one record with the authoritative copy from the store.
    pub fn upsert(&mut self, task: Task) {
        match self.position(&task.id) {
            Some(idx) => self.tasks[idx] = task,
            None => self.tasks.push(task),
        }
    }

    /// Status writes go through the board controller only.
    pub(crate) fn set_status(&mut self, id: &str, status: TaskStatus) -> Result<TaskStatus> {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        let previous = task.status;
        task.status = status;
        Ok(previous)
    }

    pub fn facets(&self) -> Facets {
        let mut tags = BTreeSet::new();
        let mut assignees = BTreeSet::new();
        for task in &self.tasks {
            tags.extend(task.tags.iter().cloned());
            if let Some(assignee) = task.assignee() {
                assignees.insert(assignee.to_string());
            }
        }
        Facets {
            tags: tags.into_iter().collect(),
            assignees: assignees.into_iter().collect(),
        }
    }

    /// Tasks in one board column, in collection order.
    pub fn column(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks.iter().filter(|task| task.status == status).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_accepts_label_variants() {
        assert_eq!(TaskStatus::parse("In Progress"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::parse("in_progress"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::parse("InProgress"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::parse(" open "), Some(TaskStatus::Open));
        assert_eq!(TaskStatus::parse("blocked"), None);
    }

    #[test]
    fn status_serializes_as_label() {
        let json = serde_json::to_string(&TaskStatus::InProgress).expect("serialize");
        assert_eq!(json, "\"In Progress\"");
    }

    #[test]
    fn task_accepts_legacy_field_names() {
        let raw = r#"{
            "_id": "t-1",
            "title": "Crash on save",
            "status": "In Progress",
            "severity": "High",
            "tags": ["ui", "ui", " ", "crash"],
            "assigned_to": "alice",
            "created_at": "2025-01-10T10:00:00Z",
            "updatedAt": "2025-01-11T10:00:00Z"
        }"#;
        let task: Task = serde_json::from_str(raw).expect("task");
        assert_eq!(task.id, "t-1");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.tags, vec!["ui".to_string(), "crash".to_string()]);
        assert_eq!(task.assignee(), Some("alice"));
        assert_eq!(task.description, "");
    }

    #[test]
    fn severity_decodes_in_any_case() {
        let raw = r#"{"id": "t-2", "title": "Slow page", "status": "open", "severity": "high",
            "created_at": "2025-01-10T10:00:00Z", "updated_at": "2025-01-10T10:00:00Z"}"#;
        let task: Task = serde_json::from_str(raw).expect("task");
        assert_eq!(task.severity, Severity::High);
        assert_eq!(serde_json::to_string(&task.severity).expect("serialize"), "\"High\"");

        let bad = r#"{"id": "t-3", "title": "X", "status": "Open", "severity": "urgent",
            "created_at": "2025-01-10T10:00:00Z", "updated_at": "2025-01-10T10:00:00Z"}"#;
        let err = serde_json::from_str::<Task>(bad).expect_err("unknown severity");
        assert!(err.to_string().contains("unknown severity 'urgent'"));
    }

    #[test]
    fn blank_assignee_counts_as_unassigned() {
        let mut task = Task::new("t-1", "One", TaskStatus::Open);
        task.assignee = Some("  ".to_string());
        assert_eq!(task.assignee(), None);
    }

    #[test]
    fn facets_are_sorted_and_distinct() {
        let mut a = Task::new("a", "A", TaskStatus::Open);
        a.tags = vec!["ui".to_string(), "api".to_string()];
        a.assignee = Some("zoe".to_string());
        let mut b = Task::new("b", "B", TaskStatus::Open);
        b.tags = vec!["api".to_string()];
        b.assignee = Some("bob".to_string());
        let c = Task::new("c", "C", TaskStatus::Closed);

        let facets = TaskCollection::new(vec![a, b, c]).facets();
        assert_eq!(facets.tags, vec!["api".to_string(), "ui".to_string()]);
        assert_eq!(facets.assignees, vec!["bob".to_string(), "zoe".to_string()]);
    }

    #[test]
    fn set_status_reports_previous_value() {
        let mut collection = TaskCollection::new(vec![Task::new("a", "A", TaskStatus::Open)]);
        let previous = collection
            .set_status("a", TaskStatus::Resolved)
            .expect("set status");
        assert_eq!(previous, TaskStatus::Open);
        assert_eq!(collection.get("a").map(|t| t.status), Some(TaskStatus::Resolved));
        assert!(matches!(
            collection.set_status("missing", TaskStatus::Open),
            Err(Error::TaskNotFound(_))
        ));
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let json = serde_json::to_value(TaskPatch::status(TaskStatus::Closed)).expect("json");
        assert_eq!(json, serde_json::json!({ "status": "Closed" }));
    }
}
