//! taskview list / facets command implementation

use serde::Serialize;

use crate::engine::ViewEngine;
use crate::error::Result;
use crate::filter::{FilterCriteria, QuickFilter};
use crate::output::{emit_success, HumanOutput};
use crate::task::{Facets, Severity, Task, TaskStatus};

use super::{Context, FilterArgs};

/// Options for `taskview list`
pub struct ListOptions {
    pub filters: FilterArgs,
    pub saved: Option<String>,
    pub all: bool,
    pub board: bool,
}

#[derive(Serialize)]
struct ListReport<'a> {
    criteria: &'a FilterCriteria,
    summary: Vec<String>,
    active_filters: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_filter: Option<String>,
    total: usize,
    matched: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    tasks: Option<Vec<&'a Task>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    columns: Option<Vec<Column<'a>>>,
}

#[derive(Serialize)]
struct Column<'a> {
    status: TaskStatus,
    tasks: Vec<&'a Task>,
}

#[derive(Serialize)]
struct FacetsReport {
    statuses: Vec<&'static str>,
    severities: Vec<&'static str>,
    presets: Vec<&'static str>,
    #[serde(flatten)]
    facets: Facets,
}

pub async fn run_list(ctx: &Context, options: ListOptions) -> Result<()> {
    let mut engine = load(ctx).await?;
    let saved = ctx.saved_filters()?;

    let base = match &options.saved {
        Some(target) => Some(saved.resolve(target)?.clone()),
        None if !options.all && options.filters.is_empty() => saved.default_filter().cloned(),
        None => None,
    };

    let mut criteria = options.filters.criteria()?;
    if let Some(base) = &base {
        criteria = base.criteria.conjoin(&criteria)?;
    }
    engine.set_criteria(criteria);
    if let Some(preset) = options.filters.quick_filter()? {
        engine.apply_preset(preset);
    }

    let mut human = render(&engine, base.as_ref().map(|f| f.name.as_str()), options.board);
    for warning in options.filters.unknown_labels() {
        human.push_warning(warning);
    }

    let matched = engine.filtered();
    let report = ListReport {
        criteria: engine.criteria(),
        summary: engine.criteria().summary(),
        active_filters: engine.criteria().active_count(),
        saved_filter: base.as_ref().map(|f| f.name.clone()),
        total: engine.tasks().len(),
        matched: matched.len(),
        tasks: (!options.board).then(|| matched.clone()),
        columns: options.board.then(|| group(&matched)),
    };

    emit_success(ctx.output, "list", &report, Some(&human))
}

pub async fn run_facets(ctx: &Context) -> Result<()> {
    let engine = load(ctx).await?;
    let facets = engine.tasks().facets();

    let mut human = HumanOutput::new(format!(
        "taskview facets: {} tags, {} assignees",
        facets.tags.len(),
        facets.assignees.len()
    ));
    human.push_summary("tags", facets.tags.join(", "));
    human.push_summary("assignees", facets.assignees.join(", "));

    let report = FacetsReport {
        statuses: TaskStatus::ALL.iter().map(|s| s.label()).collect(),
        severities: Severity::ALL.iter().map(|s| s.label()).collect(),
        presets: QuickFilter::ALL.iter().map(|p| p.id()).collect(),
        facets,
    };
    emit_success(ctx.output, "facets", &report, Some(&human))
}

/// Engine with the collection loaded. Refresh failures are published
/// before the error is returned.
pub(super) async fn load(ctx: &Context) -> Result<ViewEngine> {
    let mut engine = ctx.engine();
    if let Err(err) = engine.refresh().await {
        ctx.publish(&engine.take_notifications())?;
        return Err(err);
    }
    Ok(engine)
}

pub(super) fn task_line(task: &Task) -> String {
    let mut line = format!("{} [{}] {} ({})", task.id, task.status, task.title, task.severity);
    if let Some(assignee) = task.assignee() {
        line.push_str(&format!(" @{assignee}"));
    }
    if !task.tags.is_empty() {
        line.push_str(&format!(" #{}", task.tags.join(" #")));
    }
    line
}

fn group<'a>(tasks: &[&'a Task]) -> Vec<Column<'a>> {
    TaskStatus::ALL
        .into_iter()
        .map(|status| Column {
            status,
            tasks: tasks.iter().copied().filter(|t| t.status == status).collect(),
        })
        .collect()
}

fn render(engine: &ViewEngine, saved: Option<&str>, board: bool) -> HumanOutput {
    let matched = engine.filtered();
    let mut human = HumanOutput::new(format!(
        "taskview list: {} of {} tasks",
        matched.len(),
        engine.tasks().len()
    ));
    if let Some(name) = saved {
        human.push_summary("saved filter", name);
    }
    for line in engine.criteria().summary() {
        human.push_summary(line, "");
    }

    if board {
        for column in group(&matched) {
            human.push_detail(format!("{} ({})", column.status, column.tasks.len()));
            for task in column.tasks {
                human.push_detail(format!("  {}", task_line(task)));
            }
        }
    } else {
        for task in &matched {
            human.push_detail(task_line(task));
        }
    }

    if matched.is_empty() && !engine.criteria().is_empty() {
        human.push_next_step("taskview list --all");
    }
    human
}
