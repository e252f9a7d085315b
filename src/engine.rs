//! Single-task view engine.
//!
//! [`ViewEngine`] owns the task collection together with the filter, search
//! and board components. Everything runs on one task: commands arrive over a
//! channel, remote calls are polled next to the debounce timer, and state is
//! only touched between suspension points.
//!
//! The view shows either the filtered collection or the latest search results,
//! never a mix of the two.

use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::board::{BoardTransitionController, DragEvent, MoveTicket, TransitionState};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::filter::{self, FilterCriteria, PresetContext, QuickFilter};
use crate::notify::{Notification, NotificationKind};
use crate::prefs::PreferenceStore;
use crate::search::{SearchOrchestrator, SearchOutcome, SearchRequest, SearchSettings};
use crate::store::{RecordStore, SearchResponse};
use crate::task::{Task, TaskCollection, TaskPatch, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Filtered,
    Search,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewEntry {
    pub task: Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub mode: DisplayMode,
    pub entries: Vec<ViewEntry>,
    pub loading: bool,
    pub active_filters: usize,
    pub total_tasks: usize,
}

impl ViewSnapshot {
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.task.id.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
pub enum ViewCommand {
    SetCriteria(FilterCriteria),
    ApplyPreset(QuickFilter),
    ClearCriteria,
    QueryChanged(String),
    SubmitSearch(String),
    ClearSearch,
    Move {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
    Drag(DragEvent),
    Refresh,
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum ViewUpdate {
    View(ViewSnapshot),
    Transition(TransitionState),
    Notification(Notification),
    /// Input refused before any request was made.
    Rejected(String),
}

enum Completion {
    Search {
        sequence: u64,
        result: Result<SearchResponse>,
    },
    Move {
        ticket: MoveTicket,
        result: Result<Task>,
    },
    Refresh {
        generation: u64,
        result: Result<Vec<Task>>,
    },
}

type Operations = FuturesUnordered<BoxFuture<'static, Completion>>;

pub struct ViewEngine {
    store: Arc<dyn RecordStore>,
    tasks: TaskCollection,
    criteria: FilterCriteria,
    search: SearchOrchestrator,
    board: BoardTransitionController,
    current_user: Option<String>,
    recent_days: i64,
    notifications: Vec<Notification>,
}

impl ViewEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        prefs: Arc<dyn PreferenceStore>,
        config: &Config,
    ) -> Self {
        let user = config.user.id.trim();
        Self {
            store,
            tasks: TaskCollection::default(),
            criteria: FilterCriteria::default(),
            search: SearchOrchestrator::new(SearchSettings::from(&config.search), prefs),
            board: BoardTransitionController::new(),
            current_user: (!user.is_empty()).then(|| user.to_string()),
            recent_days: config.filters.recent_days,
            notifications: Vec::new(),
        }
    }

    pub fn tasks(&self) -> &TaskCollection {
        &self.tasks
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn search(&self) -> &SearchOrchestrator {
        &self.search
    }

    pub fn board(&self) -> &BoardTransitionController {
        &self.board
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        tracing::debug!(active = criteria.active_count(), "criteria replaced");
        self.criteria = criteria;
    }

    pub fn apply_preset(&mut self, preset: QuickFilter) {
        let ctx = PresetContext {
            now: Utc::now(),
            current_user: self.current_user.clone(),
            recent_days: self.recent_days,
        };
        self.criteria = preset.apply_to(&self.criteria, &ctx);
    }

    pub fn clear_criteria(&mut self) {
        self.criteria = FilterCriteria::default();
    }

    pub fn filtered(&self) -> Vec<&Task> {
        filter::apply(&self.tasks, &self.criteria)
    }

    pub fn display_mode(&self) -> DisplayMode {
        if self.search.query().trim().is_empty() {
            DisplayMode::Filtered
        } else {
            DisplayMode::Search
        }
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let mode = self.display_mode();
        let entries = match mode {
            DisplayMode::Filtered => self
                .filtered()
                .into_iter()
                .map(|task| ViewEntry {
                    task: task.clone(),
                    score: None,
                })
                .collect(),
            DisplayMode::Search => self
                .search
                .current_results()
                .iter()
                .map(|result| ViewEntry {
                    task: result.task.clone(),
                    score: Some(result.score),
                })
                .collect(),
        };
        ViewSnapshot {
            mode,
            entries,
            loading: self.search.is_loading(),
            active_filters: self.criteria.active_count(),
            total_tasks: self.tasks.len(),
        }
    }

    /// Replace the collection with the store's listing.
    pub async fn refresh(&mut self) -> Result<usize> {
        let generation = self.board.begin_refresh();
        let result = self.store.list_tasks().await;
        self.finish_refresh(generation, result)
    }

    /// Search immediately. An empty query clears the search and returns `None`.
    pub async fn search_now(&mut self, query: &str) -> Option<SearchOutcome> {
        let Some(request) = self.search.submit_now(query) else {
            self.search.clear();
            return None;
        };
        let result = self.store.search_tasks(&request.query).await;
        let outcome = self.search.on_result(request.sequence, result);
        if let SearchOutcome::Failed { message, .. } = &outcome {
            self.record(Notification::error(NotificationKind::SearchFailed, message.clone()));
        }
        Some(outcome)
    }

    pub async fn move_task(
        &mut self,
        task_id: &str,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<TransitionState> {
        let state = self
            .board
            .request_move(&mut self.tasks, self.store.as_ref(), task_id, from, to)
            .await?;
        if let Some(notification) = state.notification() {
            self.record(notification.clone());
        }
        Ok(state)
    }

    /// Move from whatever column the task is in now.
    pub async fn move_to(&mut self, task_id: &str, to: TaskStatus) -> Result<TransitionState> {
        let from = self
            .tasks
            .get(task_id)
            .map(|task| task.status)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
        self.move_task(task_id, from, to).await
    }

    /// Process commands until `Shutdown` or the channel closes. Requests still
    /// in flight at that point are awaited and applied before returning.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<ViewCommand>,
        updates: mpsc::Sender<ViewUpdate>,
    ) -> Self {
        let mut ops = Operations::new();
        let mut outbox = Vec::new();

        loop {
            let deadline = self.search.deadline();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(ViewCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command, &mut ops, &mut outbox),
                },
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(request) = self.search.poll(Instant::now()) {
                        ops.push(self.search_op(request));
                        outbox.push(ViewUpdate::View(self.snapshot()));
                    }
                }
                Some(done) = ops.next(), if !ops.is_empty() => self.complete(done, &mut outbox),
            }
            flush(&updates, &mut outbox).await;
        }

        while let Some(done) = ops.next().await {
            self.complete(done, &mut outbox);
        }
        flush(&updates, &mut outbox).await;
        tracing::debug!("view engine stopped");
        self
    }

    fn handle(&mut self, command: ViewCommand, ops: &mut Operations, outbox: &mut Vec<ViewUpdate>) {
        match command {
            ViewCommand::SetCriteria(criteria) => self.set_criteria(criteria),
            ViewCommand::ApplyPreset(preset) => self.apply_preset(preset),
            ViewCommand::ClearCriteria => self.clear_criteria(),
            ViewCommand::QueryChanged(text) => {
                self.search.on_query_change(&text, Instant::now());
            }
            ViewCommand::SubmitSearch(text) => match self.search.submit_now(&text) {
                Some(request) => ops.push(self.search_op(request)),
                None => self.search.clear(),
            },
            ViewCommand::ClearSearch => self.search.clear(),
            ViewCommand::Move { task_id, from, to } => {
                let started = self.board.begin_move(&mut self.tasks, &task_id, from, to);
                self.start_move(started.map(Some), ops, outbox);
            }
            ViewCommand::Drag(event) => {
                let started = self.board.begin_drag(&mut self.tasks, &event);
                self.start_move(started, ops, outbox);
            }
            ViewCommand::Refresh => {
                let generation = self.board.begin_refresh();
                let store = Arc::clone(&self.store);
                ops.push(Box::pin(async move {
                    let result = store.list_tasks().await;
                    Completion::Refresh { generation, result }
                }));
            }
            ViewCommand::Shutdown => {}
        }
        outbox.push(ViewUpdate::View(self.snapshot()));
    }

    fn start_move(
        &mut self,
        started: Result<Option<MoveTicket>>,
        ops: &mut Operations,
        outbox: &mut Vec<ViewUpdate>,
    ) {
        let ticket = match started {
            Ok(Some(ticket)) => ticket,
            Ok(None) => return,
            Err(err) => {
                tracing::debug!(error = %err, "move refused");
                outbox.push(ViewUpdate::Rejected(err.to_string()));
                return;
            }
        };
        outbox.push(ViewUpdate::Transition(TransitionState::Applied {
            pending: ticket.clone(),
        }));
        let store = Arc::clone(&self.store);
        ops.push(Box::pin(async move {
            let result = store
                .update_task(&ticket.task_id, &TaskPatch::status(ticket.to))
                .await;
            Completion::Move { ticket, result }
        }));
    }

    fn search_op(&self, request: SearchRequest) -> BoxFuture<'static, Completion> {
        let store = Arc::clone(&self.store);
        Box::pin(async move {
            let result = store.search_tasks(&request.query).await;
            Completion::Search {
                sequence: request.sequence,
                result,
            }
        })
    }

    fn complete(&mut self, done: Completion, outbox: &mut Vec<ViewUpdate>) {
        match done {
            Completion::Search { sequence, result } => {
                match self.search.on_result(sequence, result) {
                    SearchOutcome::Stale { .. } => return,
                    SearchOutcome::Failed { message, .. } => {
                        let notification =
                            Notification::error(NotificationKind::SearchFailed, message);
                        self.record(notification.clone());
                        outbox.push(ViewUpdate::Notification(notification));
                    }
                    SearchOutcome::Applied { .. } => {}
                }
            }
            Completion::Move { ticket, result } => {
                let state = self.board.settle(&mut self.tasks, ticket, result);
                if let Some(notification) = state.notification() {
                    self.record(notification.clone());
                    outbox.push(ViewUpdate::Notification(notification.clone()));
                }
                outbox.push(ViewUpdate::Transition(state));
            }
            Completion::Refresh { generation, result } => {
                if self.finish_refresh(generation, result).is_err() {
                    if let Some(notification) = self.notifications.last() {
                        outbox.push(ViewUpdate::Notification(notification.clone()));
                    }
                }
            }
        }
        outbox.push(ViewUpdate::View(self.snapshot()));
    }

    fn finish_refresh(&mut self, generation: u64, result: Result<Vec<Task>>) -> Result<usize> {
        match result {
            Ok(_) if self.board.is_stale_refresh(generation) => {
                tracing::debug!(generation, "dropping listing older than the current one");
                Ok(self.tasks.len())
            }
            Ok(tasks) => {
                self.tasks.replace_all(tasks);
                self.board.reconcile_refresh(&mut self.tasks, generation);
                tracing::debug!(count = self.tasks.len(), "collection refreshed");
                Ok(self.tasks.len())
            }
            Err(err) => {
                tracing::warn!(error = %err, "refresh failed");
                self.record(Notification::error(
                    NotificationKind::RefreshFailed,
                    format!("Could not load tasks: {err}"),
                ));
                Err(err)
            }
        }
    }

    fn record(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }
}

async fn flush(updates: &mpsc::Sender<ViewUpdate>, outbox: &mut Vec<ViewUpdate>) {
    for update in outbox.drain(..) {
        if updates.send(update).await.is_err() {
            tracing::debug!("view update receiver gone");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryPreferences;
    use crate::store::LocalRecordStore;

    fn engine(tasks: Vec<Task>) -> ViewEngine {
        ViewEngine::new(
            Arc::new(LocalRecordStore::new(tasks)),
            Arc::new(MemoryPreferences::new()),
            &Config::default(),
        )
    }

    fn sample() -> Vec<Task> {
        let mut bug = Task::new("1", "Login bug", TaskStatus::Open);
        bug.tags = vec!["auth".to_string()];
        vec![
            bug,
            Task::new("2", "Write docs", TaskStatus::InProgress),
            Task::new("3", "Ship release", TaskStatus::Resolved),
        ]
    }

    #[tokio::test]
    async fn refresh_then_filter() {
        let mut engine = engine(sample());
        assert_eq!(engine.refresh().await.expect("refresh"), 3);
        engine.set_criteria(
            FilterCriteria::default()
                .with_status(TaskStatus::Open)
                .with_status(TaskStatus::InProgress),
        );
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.mode, DisplayMode::Filtered);
        assert_eq!(snapshot.ids(), vec!["1", "2"]);
        assert_eq!(snapshot.active_filters, 1);
    }

    #[tokio::test]
    async fn search_switches_display_mode() {
        let mut engine = engine(sample());
        engine.refresh().await.expect("refresh");
        let outcome = engine.search_now("login").await.expect("outcome");
        assert!(matches!(outcome, SearchOutcome::Applied { results: 1, .. }));
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.mode, DisplayMode::Search);
        assert_eq!(snapshot.ids(), vec!["1"]);
        assert!(snapshot.entries[0].score.is_some());

        assert!(engine.search_now("  ").await.is_none());
        assert_eq!(engine.display_mode(), DisplayMode::Filtered);
    }

    #[tokio::test]
    async fn move_to_uses_current_column() {
        let mut engine = engine(sample());
        engine.refresh().await.expect("refresh");
        let state = engine.move_to("1", TaskStatus::Closed).await.expect("move");
        assert!(matches!(state, TransitionState::Confirmed { .. }));
        assert_eq!(engine.tasks().get("1").expect("task").status, TaskStatus::Closed);
        assert!(engine.notifications().is_empty());
    }

    #[tokio::test]
    async fn unknown_task_move_is_not_found() {
        let mut engine = engine(sample());
        engine.refresh().await.expect("refresh");
        let err = engine
            .move_to("missing", TaskStatus::Closed)
            .await
            .expect_err("missing task");
        assert!(matches!(err, Error::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn presets_use_configured_user() {
        let mut engine = engine(sample());
        engine.apply_preset(QuickFilter::MyTasks);
        assert!(engine.criteria().assignee.contains("local"));
        assert_eq!(engine.criteria().active_preset.as_deref(), Some("my-tasks"));
        engine.clear_criteria();
        assert!(engine.criteria().is_empty());
    }
}
