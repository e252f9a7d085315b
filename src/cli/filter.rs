//! taskview filter command implementation
//!
//! Save, list, apply and delete named filters.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::notify::{Notification, NotificationKind};
use crate::output::{emit_success, HumanOutput};
use crate::saved::{self, SavedFilter};
use crate::task::Task;

use super::list::{load, task_line};
use super::{Context, FilterArgs};

/// Options for `taskview filter save`
pub struct SaveOptions {
    pub name: String,
    pub filters: FilterArgs,
    pub default: bool,
    pub overwrite: bool,
}

#[derive(Serialize)]
struct FilterListReport<'a> {
    user: &'a str,
    filters: &'a [SavedFilter],
}

#[derive(Serialize)]
struct ApplyReport<'a> {
    filter: &'a SavedFilter,
    matched: usize,
    tasks: Vec<&'a Task>,
}

pub fn run_save(ctx: &Context, options: SaveOptions) -> Result<()> {
    let mut criteria = options.filters.criteria()?;
    if let Some(preset) = options.filters.quick_filter()? {
        // Store the concrete dimensions the preset implies, as `list` would.
        let mut engine = ctx.engine();
        engine.set_criteria(criteria);
        engine.apply_preset(preset);
        criteria = engine.criteria().clone();
    }

    let mut store = ctx.saved_filters()?;
    let replaced = options.overwrite && store.find_by_name(&options.name).is_some();
    let filter = store.save(
        &options.name,
        &criteria,
        saved::SaveOptions {
            make_default: options.default,
            overwrite_existing: options.overwrite,
        },
    )?;

    let verb = if replaced { "updated" } else { "saved" };
    ctx.publish(&[Notification::success(
        NotificationKind::FilterSaved,
        format!("Filter \"{}\" {verb}", filter.name),
    )])?;

    let mut human = HumanOutput::new(format!("taskview filter save: {} {verb}", filter.name));
    human.push_summary("id", filter.id.clone());
    if filter.is_default {
        human.push_summary("default", "yes");
    }
    for line in filter.criteria.summary() {
        human.push_summary(line, "");
    }
    for warning in options.filters.unknown_labels() {
        human.push_warning(warning);
    }
    human.push_next_step(format!("taskview filter apply \"{}\"", filter.name));

    emit_success(ctx.output, "filter save", &filter, Some(&human))
}

pub fn run_list(ctx: &Context) -> Result<()> {
    let store = ctx.saved_filters()?;
    let mut human = HumanOutput::new(format!(
        "taskview filter list: {} saved",
        store.list().len()
    ));
    for filter in store.list() {
        let marker = if filter.is_default { " (default)" } else { "" };
        human.push_detail(format!(
            "{} {}{marker}: {} active",
            filter.id,
            filter.name,
            filter.criteria.active_count()
        ));
    }
    if store.list().is_empty() {
        human.push_next_step("taskview filter save <name> --status Open");
    }

    let report = FilterListReport {
        user: &ctx.config.user.id,
        filters: store.list(),
    };
    emit_success(ctx.output, "filter list", &report, Some(&human))
}

pub async fn run_apply(ctx: &Context, target: &str) -> Result<()> {
    let store = ctx.saved_filters()?;
    let filter = store.resolve(target)?;
    let mut engine = load(ctx).await?;
    engine.set_criteria(store.apply(&filter.id)?);

    let matched = engine.filtered();
    let mut human = HumanOutput::new(format!(
        "taskview filter apply: {} ({} of {} tasks)",
        filter.name,
        matched.len(),
        engine.tasks().len()
    ));
    for line in engine.criteria().summary() {
        human.push_summary(line, "");
    }
    for task in &matched {
        human.push_detail(task_line(task));
    }

    let report = ApplyReport {
        filter,
        matched: matched.len(),
        tasks: matched.clone(),
    };
    emit_success(ctx.output, "filter apply", &report, Some(&human))
}

pub fn run_delete(ctx: &Context, target: &str, confirmed: bool) -> Result<()> {
    let mut store = ctx.saved_filters()?;
    let id = store.resolve(target)?.id.clone();
    if !confirmed {
        return Err(Error::InvalidArgument(format!(
            "deleting filter {target} cannot be undone; pass --yes to confirm"
        )));
    }
    let removed = store.delete(&id)?;
    ctx.publish(&[Notification::success(
        NotificationKind::FilterDeleted,
        format!("Filter \"{}\" deleted", removed.name),
    )])?;

    let mut human = HumanOutput::new(format!("taskview filter delete: {}", removed.name));
    human.push_summary("id", removed.id.clone());
    emit_success(ctx.output, "filter delete", &removed, Some(&human))
}
