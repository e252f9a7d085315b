#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use taskview::error::{Error, Result};
use taskview::store::{RecordStore, ScoredTask, SearchQuery, SearchResponse};
use taskview::task::{Severity, Task, TaskPatch, TaskStatus};

pub fn day(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0)
        .single()
        .expect("valid date")
}

pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(id: &str, title: &str, status: TaskStatus) -> Self {
        let mut task = Task::new(id, title, status);
        task.created_at = day(1);
        task.updated_at = day(1);
        Self { task }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.task.description = description.to_string();
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.task.severity = severity;
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.task.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn assignee(mut self, assignee: &str) -> Self {
        self.task.assignee = Some(assignee.to_string());
        self
    }

    pub fn created(mut self, at: DateTime<Utc>) -> Self {
        self.task.created_at = at;
        self
    }

    pub fn updated(mut self, at: DateTime<Utc>) -> Self {
        self.task.updated_at = at;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Open/InProgress/Resolved trio used across suites.
pub fn three_tasks() -> Vec<Task> {
    vec![
        TaskBuilder::new("t-1", "Login fails on Safari", TaskStatus::Open)
            .severity(Severity::High)
            .tags(&["auth", "browser"])
            .assignee("alice")
            .build(),
        TaskBuilder::new("t-2", "Write onboarding docs", TaskStatus::InProgress)
            .severity(Severity::Low)
            .tags(&["docs"])
            .build(),
        TaskBuilder::new("t-3", "Crash when saving report", TaskStatus::Resolved)
            .severity(Severity::Critical)
            .description("<p>Null pointer in <b>report</b> export</p>")
            .tags(&["crash"])
            .assignee("bob")
            .created(day(10))
            .updated(day(12))
            .build(),
    ]
}

pub fn write_tasks(dir: &Path, tasks: &[Task]) -> PathBuf {
    let path = dir.join("tasks.json");
    fs::write(&path, serde_json::to_string_pretty(tasks).expect("encode tasks"))
        .expect("write tasks");
    path
}

pub fn read_tasks(path: &Path) -> Vec<Task> {
    let content = fs::read_to_string(path).expect("read tasks");
    serde_json::from_str(&content).expect("decode tasks")
}

#[derive(Clone)]
struct SearchScript {
    delay: Duration,
    outcome: std::result::Result<Vec<(String, f64)>, String>,
}

/// Record store whose answers and latencies are set by the test.
#[derive(Default)]
pub struct ScriptedStore {
    tasks: Mutex<Vec<Task>>,
    searches: Mutex<HashMap<String, SearchScript>>,
    update_failures: Mutex<HashMap<String, String>>,
    update_delays: Mutex<HashMap<TaskStatus, Duration>>,
    search_calls: Mutex<Vec<String>>,
    update_calls: Mutex<Vec<(String, TaskStatus)>>,
    list_failure: Mutex<Option<String>>,
    list_delay: Mutex<Option<Duration>>,
}

impl ScriptedStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Self::default()
        }
    }

    /// Answer `query` after `delay` with `(task id, score)` hits.
    pub fn respond(&self, query: &str, delay: Duration, hits: &[(&str, f64)]) {
        let hits = hits.iter().map(|(id, s)| (id.to_string(), *s)).collect();
        self.searches.lock().expect("lock").insert(
            query.to_string(),
            SearchScript {
                delay,
                outcome: Ok(hits),
            },
        );
    }

    pub fn fail_search(&self, query: &str, delay: Duration, message: &str) {
        self.searches.lock().expect("lock").insert(
            query.to_string(),
            SearchScript {
                delay,
                outcome: Err(message.to_string()),
            },
        );
    }

    pub fn fail_updates_for(&self, task_id: &str, message: &str) {
        self.update_failures
            .lock()
            .expect("lock")
            .insert(task_id.to_string(), message.to_string());
    }

    /// Delay updates that move a task to `status`.
    pub fn delay_updates_to(&self, status: TaskStatus, delay: Duration) {
        self.update_delays.lock().expect("lock").insert(status, delay);
    }

    pub fn fail_list(&self, message: &str) {
        *self.list_failure.lock().expect("lock") = Some(message.to_string());
    }

    /// Listings snapshot the records first, then answer after `delay`.
    pub fn delay_list(&self, delay: Duration) {
        *self.list_delay.lock().expect("lock") = Some(delay);
    }

    pub fn set_tasks(&self, tasks: Vec<Task>) {
        *self.tasks.lock().expect("lock") = tasks;
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.search_calls.lock().expect("lock").clone()
    }

    pub fn update_calls(&self) -> Vec<(String, TaskStatus)> {
        self.update_calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    async fn list_tasks(&self) -> Result<Vec<Task>> {
        if let Some(message) = self.list_failure.lock().expect("lock").clone() {
            return Err(Error::Transport(message));
        }
        let snapshot = self.tasks.lock().expect("lock").clone();
        let delay = *self.list_delay.lock().expect("lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        let status = patch.status.expect("status patch");
        self.update_calls
            .lock()
            .expect("lock")
            .push((id.to_string(), status));
        let delay = self.update_delays.lock().expect("lock").get(&status).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.update_failures.lock().expect("lock").get(id).cloned() {
            return Err(Error::Transport(message));
        }
        let mut tasks = self.tasks.lock().expect("lock");
        let task = tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        task.status = status;
        Ok(task.clone())
    }

    async fn delete_task(&self, id: &str) -> Result<()> {
        let mut tasks = self.tasks.lock().expect("lock");
        tasks.retain(|task| task.id != id);
        Ok(())
    }

    async fn search_tasks(&self, query: &SearchQuery) -> Result<SearchResponse> {
        self.search_calls
            .lock()
            .expect("lock")
            .push(query.query.clone());
        let script = self
            .searches
            .lock()
            .expect("lock")
            .get(&query.query)
            .cloned();
        let Some(script) = script else {
            return Ok(SearchResponse::default());
        };
        tokio::time::sleep(script.delay).await;
        let hits = script.outcome.map_err(Error::Transport)?;
        let tasks = self.tasks.lock().expect("lock").clone();
        let results: Vec<ScoredTask> = hits
            .iter()
            .filter_map(|(id, score)| {
                tasks.iter().find(|t| &t.id == id).map(|task| ScoredTask {
                    task: task.clone(),
                    similarity_score: *score,
                })
            })
            .collect();
        Ok(SearchResponse {
            total_results: results.len(),
            results,
            suggestions: Vec::new(),
            enhanced_query: query.query.clone(),
        })
    }
}
