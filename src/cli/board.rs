//! taskview move command implementation

use serde::Serialize;

use crate::board::{MoveTicket, TransitionState};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::task::{Task, TaskStatus};

use super::list::{load, task_line};
use super::Context;

/// Options for `taskview move`
pub struct MoveOptions {
    pub task_id: String,
    pub status: String,
    pub from: Option<String>,
}

#[derive(Serialize)]
struct MoveReport<'a> {
    #[serde(flatten)]
    ticket: &'a MoveTicket,
    task: Option<&'a Task>,
}

fn parse_status(raw: &str) -> Result<TaskStatus> {
    TaskStatus::parse(raw).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "unknown status '{raw}' (expected Open, In Progress, Resolved or Closed)"
        ))
    })
}

pub async fn run_move(ctx: &Context, options: MoveOptions) -> Result<()> {
    let to = parse_status(&options.status)?;
    let from = options.from.as_deref().map(parse_status).transpose()?;

    let mut engine = load(ctx).await?;
    let result = match from {
        Some(from) => engine.move_task(&options.task_id, from, to).await,
        None => engine.move_to(&options.task_id, to).await,
    };
    ctx.publish(&engine.take_notifications())?;

    let ticket = match result? {
        TransitionState::Confirmed { ticket } => ticket,
        TransitionState::RolledBack { notification, .. } => {
            return Err(Error::Transport(notification.message));
        }
        TransitionState::Applied { pending } | TransitionState::Superseded { ticket: pending } => {
            return Err(Error::OperationFailed(format!(
                "move of task {} did not settle",
                pending.task_id
            )));
        }
    };

    let task = engine.tasks().get(&ticket.task_id);
    let mut human = HumanOutput::new(format!(
        "taskview move: {} {} -> {}",
        ticket.task_id, ticket.from, ticket.to
    ));
    if let Some(task) = task {
        human.push_detail(task_line(task));
    }

    let report = MoveReport {
        ticket: &ticket,
        task,
    };
    emit_success(ctx.output, "move", &report, Some(&human))
}
