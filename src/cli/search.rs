//! taskview search / history command implementation

use std::sync::Arc;

use serde::Serialize;

use crate::engine::ViewEngine;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::search::{SearchHistory, SearchOutcome, SearchResult};
use crate::store::SearchMode;

use super::list::task_line;
use super::Context;

/// Options for `taskview search`
pub struct SearchOptions {
    pub query: String,
    pub limit: Option<usize>,
    pub mode: Option<String>,
}

#[derive(Serialize)]
struct SearchReport<'a> {
    query: &'a str,
    enhanced_query: &'a str,
    mode: SearchMode,
    total_results: usize,
    results: &'a [SearchResult],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    suggestions: &'a [String],
}

#[derive(Serialize)]
struct HistoryReport<'a> {
    key: &'a str,
    cleared: bool,
    entries: &'a [String],
}

pub async fn run_search(ctx: &Context, options: SearchOptions) -> Result<()> {
    let mut config = ctx.config.clone();
    if let Some(limit) = options.limit {
        if limit == 0 {
            return Err(Error::InvalidArgument("--limit must be > 0".to_string()));
        }
        config.search.limit = limit;
    }
    if let Some(mode) = &options.mode {
        let parsed = SearchMode::parse(mode).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "invalid mode '{mode}' (expected intelligent|semantic|keyword|hybrid)"
            ))
        })?;
        config.search.mode = parsed.as_str().to_string();
    }

    let mut engine = ViewEngine::new(
        Arc::clone(&ctx.store),
        Arc::clone(&ctx.prefs),
        &config,
    );
    let Some(outcome) = engine.search_now(&options.query).await else {
        return Err(Error::InvalidArgument("search query is empty".to_string()));
    };
    ctx.publish(&engine.take_notifications())?;
    if let SearchOutcome::Failed { message, .. } = outcome {
        return Err(Error::Transport(message));
    }

    let search = engine.search();
    let mut human = HumanOutput::new(format!(
        "taskview search: {} results for \"{}\"",
        search.current_results().len(),
        options.query.trim()
    ));
    if search.enhanced_query() != options.query.trim() {
        human.push_summary("interpreted as", search.enhanced_query());
    }
    if search.total_results() > search.current_results().len() {
        human.push_summary("total", search.total_results().to_string());
    }
    for result in search.current_results() {
        human.push_detail(format!("{:>3.0}% {}", result.score * 100.0, task_line(&result.task)));
    }
    for suggestion in search.suggestions() {
        human.push_next_step(format!("taskview search \"{suggestion}\""));
    }

    let report = SearchReport {
        query: &options.query,
        enhanced_query: search.enhanced_query(),
        mode: search.settings().mode,
        total_results: search.total_results(),
        results: search.current_results(),
        suggestions: search.suggestions(),
    };
    emit_success(ctx.output, "search", &report, Some(&human))
}

pub fn run_history(ctx: &Context, clear: bool) -> Result<()> {
    let settings = &ctx.config.search;
    let mut history = SearchHistory::load(
        Arc::clone(&ctx.prefs),
        settings.history_key.clone(),
        settings.history_len,
    );
    if clear {
        history.clear()?;
    }

    let header = if clear {
        "taskview history: cleared".to_string()
    } else {
        format!("taskview history: {} queries", history.entries().len())
    };
    let mut human = HumanOutput::new(header);
    for entry in history.entries() {
        human.push_detail(entry.clone());
    }

    let report = HistoryReport {
        key: &settings.history_key,
        cleared: clear,
        entries: history.entries(),
    };
    emit_success(ctx.output, "history", &report, Some(&human))
}
