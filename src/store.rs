//! Record store clients.
//!
//! The view components talk to the authoritative task store through
//! [`RecordStore`]. Two implementations ship with the crate:
//! - [`LocalRecordStore`]: tasks in memory, optionally backed by a JSON file,
//!   with keyword relevance ranking for search
//! - [`HttpRecordStore`]: the REST API (`/tasks`, `/tasks/{id}`, `/tasks/search`)

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};
use crate::task::{Task, TaskPatch};

const TITLE_WEIGHT: f64 = 3.0;
const TAG_WEIGHT: f64 = 2.0;
const DESCRIPTION_WEIGHT: f64 = 1.0;
const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Intelligent,
    Semantic,
    Keyword,
    Hybrid,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Intelligent => "intelligent",
            SearchMode::Semantic => "semantic",
            SearchMode::Keyword => "keyword",
            SearchMode::Hybrid => "hybrid",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "intelligent" => Some(SearchMode::Intelligent),
            "semantic" => Some(SearchMode::Semantic),
            "keyword" => Some(SearchMode::Keyword),
            "hybrid" => Some(SearchMode::Hybrid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub query: String,
    pub limit: usize,
    pub mode: SearchMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTask {
    pub task: Task,
    #[serde(alias = "score", default)]
    pub similarity_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<ScoredTask>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub enhanced_query: String,
    #[serde(default)]
    pub total_results: usize,
}

/// Authoritative task store. Every call may fail with a transport or
/// authorization error.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>>;
    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task>;
    async fn delete_task(&self, id: &str) -> Result<()>;
    async fn search_tasks(&self, query: &SearchQuery) -> Result<SearchResponse>;
}

/// In-process store. With a backing file, every mutation is written back
/// atomically under a file lock.
#[derive(Debug)]
pub struct LocalRecordStore {
    tasks: Mutex<Vec<Task>>,
    path: Option<PathBuf>,
}

impl LocalRecordStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            path: None,
        }
    }

    /// Load a JSON array of tasks. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let tasks = match lock::read_locked_str(path, DEFAULT_LOCK_TIMEOUT_MS)? {
            Some(content) if !content.trim().is_empty() => serde_json::from_str(&content)?,
            _ => Vec::new(),
        };
        Ok(Self {
            tasks: Mutex::new(tasks),
            path: Some(path.to_path_buf()),
        })
    }

    fn tasks(&self) -> Result<std::sync::MutexGuard<'_, Vec<Task>>> {
        self.tasks
            .lock()
            .map_err(|_| Error::OperationFailed("task store poisoned".to_string()))
    }

    fn persist(&self, tasks: &[Task]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let encoded = serde_json::to_string_pretty(tasks)?;
        lock::write_atomic_locked(path, encoded.as_bytes(), DEFAULT_LOCK_TIMEOUT_MS)
    }
}

/// Per-term relevance: title substring, exact tag, description substring.
/// Normalised into [0, 1] against the best possible score.
pub fn keyword_relevance(task: &Task, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let title = task.title.to_lowercase();
    let description = crate::filter::strip_markup(&task.description).to_lowercase();
    let tags: Vec<String> = task.tags.iter().map(|tag| tag.to_lowercase()).collect();

    let mut score = 0.0;
    for term in terms {
        if title.contains(term.as_str()) {
            score += TITLE_WEIGHT;
        }
        if tags.iter().any(|tag| tag == term) {
            score += TAG_WEIGHT;
        }
        if description.contains(term.as_str()) {
            score += DESCRIPTION_WEIGHT;
        }
    }
    let best = (TITLE_WEIGHT + TAG_WEIGHT + DESCRIPTION_WEIGHT) * terms.len() as f64;
    score / best
}

fn search_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl RecordStore for LocalRecordStore {
    async fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.tasks()?.clone())
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        let mut tasks = self.tasks()?;
        let task = tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(severity) = patch.severity {
            task.severity = severity;
        }
        task.updated_at = Utc::now();
        let updated = task.clone();
        self.persist(&tasks)?;
        Ok(updated)
    }

    async fn delete_task(&self, id: &str) -> Result<()> {
        let mut tasks = self.tasks()?;
        let before = tasks.len();
        tasks.retain(|task| task.id != id);
        if tasks.len() == before {
            return Err(Error::TaskNotFound(id.to_string()));
        }
        self.persist(&tasks)
    }

    async fn search_tasks(&self, query: &SearchQuery) -> Result<SearchResponse> {
        let terms = search_terms(&query.query);
        let tasks = self.tasks()?;
        let mut scored: Vec<ScoredTask> = tasks
            .iter()
            .map(|task| ScoredTask {
                similarity_score: keyword_relevance(task, &terms),
                task: task.clone(),
            })
            .filter(|scored| scored.similarity_score > 0.0)
            .collect();
        scored.sort_by(|left, right| right.similarity_score.total_cmp(&left.similarity_score));
        let total_results = scored.len();
        scored.truncate(query.limit);

        let query_terms: BTreeSet<&str> = terms.iter().map(String::as_str).collect();
        let mut suggestions = Vec::new();
        for tag in scored.iter().flat_map(|hit| hit.task.tags.iter()) {
            let lowered = tag.to_lowercase();
            if !query_terms.contains(lowered.as_str()) && !suggestions.contains(&lowered) {
                suggestions.push(lowered);
            }
            if suggestions.len() == MAX_SUGGESTIONS {
                break;
            }
        }

        Ok(SearchResponse {
            results: scored,
            suggestions,
            enhanced_query: query.query.trim().to_string(),
            total_results,
        })
    }
}

/// REST client for the remote task API.
#[derive(Debug, Clone)]
pub struct HttpRecordStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRecordStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = builder.send().await?;
        check_status(response.status(), what)?;
        Ok(response)
    }
}

/// Map a non-success status to the error taxonomy.
pub fn check_status(status: reqwest::StatusCode, what: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Authorization(format!("{what} returned {status}")));
    }
    Err(Error::Transport(format!("{what} returned {status}")))
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let response = self
            .send(self.request(reqwest::Method::GET, "tasks"), "list tasks")
            .await?;
        Ok(response.json().await?)
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        let builder = self
            .request(reqwest::Method::PUT, &format!("tasks/{id}"))
            .json(patch);
        let response = self.send(builder, &format!("update task {id}")).await?;
        Ok(response.json().await?)
    }

    async fn delete_task(&self, id: &str) -> Result<()> {
        let builder = self.request(reqwest::Method::DELETE, &format!("tasks/{id}"));
        self.send(builder, &format!("delete task {id}")).await?;
        Ok(())
    }

    async fn search_tasks(&self, query: &SearchQuery) -> Result<SearchResponse> {
        let limit = query.limit.to_string();
        let builder = self.request(reqwest::Method::GET, "tasks/search").query(&[
            ("query", query.query.as_str()),
            ("limit", limit.as_str()),
            ("search_type", query.mode.as_str()),
        ]);
        let response = self.send(builder, "search tasks").await?;
        Ok(response.json().await?)
    }
}
