//! Optimistic status transitions for the board view.
//!
//! A move is applied to the collection immediately, confirmed or rolled back
//! when the record store answers. At most one move per task is outstanding:
//! a newer move for the same task supersedes the older one, whose answer is
//! then ignored.
//!
//! Full listings carry a refresh generation. A listing requested before a
//! move settled may still show the old column, so confirmed statuses are
//! written back over it until a newer listing arrives.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::notify::{Notification, NotificationKind};
use crate::store::RecordStore;
use crate::task::{Task, TaskCollection, TaskPatch, TaskStatus};

/// A completed drag gesture. `target_column` is `None` when the card was
/// dropped outside every column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragEvent {
    pub task_id: String,
    pub source_column: TaskStatus,
    pub target_column: Option<TaskStatus>,
}

impl DragEvent {
    /// Target of a real move, or `None` for a drop that changes nothing.
    pub fn target(&self) -> Option<TaskStatus> {
        self.target_column
            .filter(|target| *target != self.source_column)
    }
}

/// One in-flight transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveTicket {
    pub task_id: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub attempt: u64,
}

#[derive(Debug, Clone)]
pub enum TransitionState {
    /// Optimistic status written; waiting for the record store.
    Applied { pending: MoveTicket },
    Confirmed { ticket: MoveTicket },
    /// The store refused or could not be reached; status restored.
    RolledBack {
        ticket: MoveTicket,
        restored: TaskStatus,
        notification: Notification,
    },
    /// A newer move for the same task was requested; this answer is ignored.
    Superseded { ticket: MoveTicket },
}

impl TransitionState {
    pub fn notification(&self) -> Option<&Notification> {
        match self {
            TransitionState::RolledBack { notification, .. } => Some(notification),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct BoardTransitionController {
    next_attempt: u64,
    pending: HashMap<String, MoveTicket>,
    refresh_generation: u64,
    applied_refresh: u64,
    /// Confirmed status per task, keyed with the refresh generation current
    /// when the move settled.
    confirmed: HashMap<String, (u64, TaskStatus)>,
}

impl BoardTransitionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self, task_id: &str) -> Option<&MoveTicket> {
        self.pending.get(task_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Validate and apply the optimistic status. No request is made here.
    pub fn begin_move(
        &mut self,
        collection: &mut TaskCollection,
        task_id: &str,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<MoveTicket> {
        if from == to {
            return Err(Error::NoOpMove {
                task_id: task_id.to_string(),
                status: to.to_string(),
            });
        }
        let current = collection
            .get(task_id)
            .map(|task| task.status)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
        if current != from {
            return Err(Error::InvalidArgument(format!(
                "task {task_id} is in {current}, not {from}"
            )));
        }

        collection.set_status(task_id, to)?;
        self.next_attempt += 1;
        let ticket = MoveTicket {
            task_id: task_id.to_string(),
            from,
            to,
            attempt: self.next_attempt,
        };
        if let Some(previous) = self.pending.insert(task_id.to_string(), ticket.clone()) {
            tracing::debug!(
                task_id,
                superseded = previous.attempt,
                attempt = ticket.attempt,
                "move superseded"
            );
        }
        tracing::debug!(task_id, %from, %to, attempt = ticket.attempt, "optimistic move applied");
        Ok(ticket)
    }

    /// Reconcile a ticket with the record store's answer.
    pub fn settle(
        &mut self,
        collection: &mut TaskCollection,
        ticket: MoveTicket,
        result: Result<Task>,
    ) -> TransitionState {
        let is_latest = self
            .pending
            .get(&ticket.task_id)
            .is_some_and(|latest| latest.attempt == ticket.attempt);
        if !is_latest {
            tracing::debug!(
                task_id = ticket.task_id.as_str(),
                attempt = ticket.attempt,
                "ignoring answer for superseded move"
            );
            return TransitionState::Superseded { ticket };
        }
        self.pending.remove(&ticket.task_id);

        match result {
            Ok(task) => {
                if task.id == ticket.task_id && task.status == ticket.to {
                    collection.upsert(task);
                }
                self.confirmed.insert(
                    ticket.task_id.clone(),
                    (self.refresh_generation, ticket.to),
                );
                tracing::info!(
                    task_id = ticket.task_id.as_str(),
                    status = %ticket.to,
                    "move confirmed"
                );
                TransitionState::Confirmed { ticket }
            }
            Err(err) => {
                if let Err(restore_err) = collection.set_status(&ticket.task_id, ticket.from) {
                    tracing::debug!(error = %restore_err, "task gone before rollback");
                }
                tracing::warn!(
                    task_id = ticket.task_id.as_str(),
                    restored = %ticket.from,
                    error = %err,
                    "move rolled back"
                );
                let notification = Notification::error(
                    NotificationKind::MoveFailed,
                    format!(
                        "Could not move task to {}: {err}. It was returned to {}.",
                        ticket.to, ticket.from
                    ),
                )
                .for_task(ticket.task_id.clone());
                TransitionState::RolledBack {
                    restored: ticket.from,
                    ticket,
                    notification,
                }
            }
        }
    }

    /// Apply, request and reconcile one move.
    pub async fn request_move(
        &mut self,
        collection: &mut TaskCollection,
        store: &dyn RecordStore,
        task_id: &str,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<TransitionState> {
        let ticket = self.begin_move(collection, task_id, from, to)?;
        let result = store.update_task(task_id, &TaskPatch::status(to)).await;
        Ok(self.settle(collection, ticket, result))
    }

    /// Start a full listing. Pass the returned generation to
    /// [`reconcile_refresh`](Self::reconcile_refresh) with its result.
    pub fn begin_refresh(&mut self) -> u64 {
        self.refresh_generation += 1;
        self.refresh_generation
    }

    /// A listing older than one already applied must be dropped.
    pub fn is_stale_refresh(&self, generation: u64) -> bool {
        generation < self.applied_refresh
    }

    /// Bring a freshly replaced collection back in line with local intent:
    /// moves confirmed after `generation` was requested keep their status,
    /// and outstanding moves keep their optimistic target.
    pub fn reconcile_refresh(&mut self, collection: &mut TaskCollection, generation: u64) {
        self.applied_refresh = self.applied_refresh.max(generation);
        self.confirmed
            .retain(|_, (settled_at, _)| *settled_at >= generation);
        for (task_id, (_, status)) in &self.confirmed {
            if collection.set_status(task_id, *status).is_ok() {
                tracing::debug!(
                    task_id = task_id.as_str(),
                    %status,
                    "confirmed move kept over older listing"
                );
            }
        }
        for ticket in self.pending.values() {
            if collection.set_status(&ticket.task_id, ticket.to).is_err() {
                tracing::debug!(
                    task_id = ticket.task_id.as_str(),
                    "task with pending move missing from refresh"
                );
            }
        }
    }

    /// Drag entry point. Drops outside a column or onto the source column
    /// return `Ok(None)` without touching anything.
    pub fn begin_drag(
        &mut self,
        collection: &mut TaskCollection,
        event: &DragEvent,
    ) -> Result<Option<MoveTicket>> {
        let Some(target) = event.target() else {
            return Ok(None);
        };
        self.begin_move(collection, &event.task_id, event.source_column, target)
            .map(Some)
    }
}

/// Tasks grouped into board columns, in status order.
pub fn columns(collection: &TaskCollection) -> Vec<(TaskStatus, Vec<&Task>)> {
    TaskStatus::ALL
        .into_iter()
        .map(|status| (status, collection.column(status)))
        .collect()
}
