//! Command-line interface for taskview
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};

use crate::config::{Config, CONFIG_FILE};
use crate::engine::ViewEngine;
use crate::error::{Error, Result};
use crate::filter::{DateRange, FilterCriteria, QuickFilter};
use crate::notify::{Notification, NotificationDestination};
use crate::output::OutputOptions;
use crate::prefs::{FilePreferences, MemoryPreferences, PreferenceStore};
use crate::saved::FilterPersistenceStore;
use crate::store::{HttpRecordStore, LocalRecordStore, RecordStore};
use crate::task::{Severity, TaskStatus};

mod board;
mod filter;
mod list;
mod search;

/// taskview - filter, search and move tasks
///
/// Works against a local JSON task file or a remote task API.
#[derive(Parser, Debug)]
#[command(name = "taskview")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to ./.taskview.toml)
    #[arg(long, global = true, env = "TASKVIEW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Local task file (JSON array)
    #[arg(long, global = true, env = "TASKVIEW_TASKS")]
    pub tasks: Option<PathBuf>,

    /// Remote task API base URL
    #[arg(long, global = true, env = "TASKVIEW_URL")]
    pub url: Option<String>,

    /// Preference file holding search history and saved filters
    #[arg(long, global = true, env = "TASKVIEW_PREFS")]
    pub prefs: Option<PathBuf>,

    /// Current user id
    #[arg(long, global = true, env = "TASKVIEW_USER")]
    pub user: Option<String>,

    /// Write notifications as JSONL to a file, or "-" for stdout
    #[arg(long, global = true)]
    pub notify: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List tasks matching the given criteria
    List {
        #[command(flatten)]
        filters: FilterArgs,

        /// Start from a saved filter (id or name)
        #[arg(long)]
        saved: Option<String>,

        /// Ignore the default saved filter
        #[arg(long)]
        all: bool,

        /// Group the result into board columns
        #[arg(long)]
        board: bool,
    },

    /// Show the tag and assignee values present in the collection
    Facets,

    /// Search tasks by relevance
    Search {
        /// Query text
        #[arg(required = true)]
        query: String,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,

        /// Search mode: intelligent, semantic, keyword, hybrid
        #[arg(long)]
        mode: Option<String>,
    },

    /// Move a task to another board column
    Move {
        /// Task id
        task_id: String,

        /// Target status
        status: String,

        /// Expected current status (defaults to the task's status)
        #[arg(long)]
        from: Option<String>,
    },

    /// Saved filter management
    #[command(subcommand)]
    Filter(FilterCommands),

    /// Show or clear the recent search history
    History {
        /// Clear the stored history
        #[arg(long)]
        clear: bool,
    },
}

/// Saved filter subcommands
#[derive(Subcommand, Debug)]
pub enum FilterCommands {
    /// Save the given criteria under a name
    Save {
        /// Filter name
        name: String,

        #[command(flatten)]
        filters: FilterArgs,

        /// Make this the default filter
        #[arg(long)]
        default: bool,

        /// Replace an existing filter with the same name
        #[arg(long)]
        overwrite: bool,
    },

    /// List saved filters
    List,

    /// Apply a saved filter and list the matching tasks
    Apply {
        /// Saved filter id or name
        target: String,
    },

    /// Delete a saved filter
    Delete {
        /// Saved filter id or name
        target: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

/// Criteria flags shared by `list` and `filter save`.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Case-insensitive text match on title and description
    #[arg(long)]
    pub search: Option<String>,

    /// Allowed statuses (repeat or comma separate)
    #[arg(long, value_delimiter = ',')]
    pub status: Vec<String>,

    /// Allowed severities
    #[arg(long, value_delimiter = ',')]
    pub severity: Vec<String>,

    /// Tags; a task matches if it has any of them
    #[arg(long = "tag", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Assignees; "unassigned" selects tasks without one
    #[arg(long, value_delimiter = ',')]
    pub assignee: Vec<String>,

    /// Created on or after (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub created_from: Option<String>,

    /// Created on or before
    #[arg(long)]
    pub created_to: Option<String>,

    /// Updated on or after
    #[arg(long)]
    pub updated_from: Option<String>,

    /// Updated on or before
    #[arg(long)]
    pub updated_to: Option<String>,

    /// Quick filter: my-tasks, high-priority, overdue, recent, unassigned
    #[arg(long)]
    pub preset: Option<String>,
}

impl FilterArgs {
    pub fn is_empty(&self) -> bool {
        self.preset.is_none() && self.criteria().map(|c| c.is_empty()).unwrap_or(false)
    }

    /// Build criteria from the flags. Labels are normalised where they are
    /// known; unknown ones are kept and simply match nothing.
    pub fn criteria(&self) -> Result<FilterCriteria> {
        let mut criteria = FilterCriteria::default();
        if let Some(term) = &self.search {
            criteria = criteria.with_search(term.clone());
        }
        criteria.status = self
            .status
            .iter()
            .map(|raw| TaskStatus::parse(raw).map_or_else(|| raw.trim().to_string(), |s| s.label().to_string()))
            .collect();
        criteria.severity = self
            .severity
            .iter()
            .map(|raw| Severity::parse(raw).map_or_else(|| raw.trim().to_string(), |s| s.label().to_string()))
            .collect();
        criteria.tags = self.tags.iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect();
        criteria.assignee = self.assignee.iter().map(|a| a.trim().to_string()).filter(|a| !a.is_empty()).collect();
        criteria.created_range = DateRange::new(
            parse_bound(self.created_from.as_deref(), false)?,
            parse_bound(self.created_to.as_deref(), true)?,
        );
        criteria.updated_range = DateRange::new(
            parse_bound(self.updated_from.as_deref(), false)?,
            parse_bound(self.updated_to.as_deref(), true)?,
        );
        Ok(criteria)
    }

    pub fn quick_filter(&self) -> Result<Option<QuickFilter>> {
        self.preset
            .as_deref()
            .map(|raw| {
                QuickFilter::parse(raw)
                    .ok_or_else(|| Error::InvalidArgument(format!("unknown preset '{raw}'")))
            })
            .transpose()
    }

    /// Labels that did not parse and will match nothing.
    pub fn unknown_labels(&self) -> Vec<String> {
        let statuses = self
            .status
            .iter()
            .filter(|raw| TaskStatus::parse(raw).is_none())
            .map(|raw| format!("unknown status '{}'", raw.trim()));
        let severities = self
            .severity
            .iter()
            .filter(|raw| Severity::parse(raw).is_none())
            .map(|raw| format!("unknown severity '{}'", raw.trim()));
        statuses.chain(severities).collect()
    }
}

/// Parse a date bound. Plain dates cover the whole day.
fn parse_bound(raw: Option<&str>, end_of_day: bool) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| Error::InvalidArgument(format!("invalid date '{raw}'")))?;
    let naive = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| Error::InvalidArgument(format!("invalid date '{raw}'")))?;
    Ok(Some(Utc.from_utc_datetime(&naive)))
}

/// Resolved collaborators for one command invocation.
pub(crate) struct Context {
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
    pub prefs: Arc<dyn PreferenceStore>,
    pub output: OutputOptions,
    pub notify: Option<NotificationDestination>,
}

impl Context {
    fn build(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Config::load(path)?,
            None => {
                let cwd = std::env::current_dir()?;
                tracing::debug!(path = %cwd.join(CONFIG_FILE).display(), "loading config");
                Config::load_from_dir(&cwd)
            }
        };
        if let Some(user) = cli.user.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            config.user.id = user.to_string();
        }
        if let Some(url) = &cli.url {
            config.store.base_url = Some(url.clone());
        }
        if let Some(tasks) = &cli.tasks {
            config.store.tasks_file = tasks.clone();
        }

        let store: Arc<dyn RecordStore> = match &config.store.base_url {
            Some(url) => {
                let token = std::env::var(&config.store.token_env)
                    .ok()
                    .filter(|token| !token.trim().is_empty());
                tracing::debug!(url = url.as_str(), token = token.is_some(), "using remote store");
                Arc::new(HttpRecordStore::new(url.clone(), token))
            }
            None => Arc::new(LocalRecordStore::open(&config.store.tasks_file)?),
        };

        let prefs_path = cli
            .prefs
            .clone()
            .or_else(|| config.preferences.path.clone())
            .or_else(FilePreferences::default_path);
        let prefs: Arc<dyn PreferenceStore> = match prefs_path {
            Some(path) => Arc::new(FilePreferences::new(path)),
            None => {
                tracing::warn!("no preference location available; using memory");
                Arc::new(MemoryPreferences::new())
            }
        };

        Ok(Self {
            config,
            store,
            prefs,
            output: OutputOptions {
                json: cli.json,
                quiet: cli.quiet,
            },
            notify: NotificationDestination::parse(cli.notify.as_deref()),
        })
    }

    pub fn engine(&self) -> ViewEngine {
        ViewEngine::new(Arc::clone(&self.store), Arc::clone(&self.prefs), &self.config)
    }

    pub fn saved_filters(&self) -> Result<FilterPersistenceStore> {
        FilterPersistenceStore::load(
            Arc::clone(&self.prefs),
            &self.config.user.id,
            &self.config.filters,
        )
    }

    /// Forward notifications to the configured sink.
    pub fn publish(&self, notifications: &[Notification]) -> Result<()> {
        let Some(destination) = &self.notify else {
            return Ok(());
        };
        if notifications.is_empty() {
            return Ok(());
        }
        let mut sink = destination.open()?;
        for notification in notifications {
            sink.emit(notification)?;
        }
        Ok(())
    }
}

impl Cli {
    /// Execute the CLI command on a single-threaded runtime
    pub fn run(self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.dispatch())
    }

    async fn dispatch(self) -> Result<()> {
        let ctx = Context::build(&self)?;
        match self.command {
            Commands::List {
                filters,
                saved,
                all,
                board,
            } => {
                list::run_list(
                    &ctx,
                    list::ListOptions {
                        filters,
                        saved,
                        all,
                        board,
                    },
                )
                .await
            }
            Commands::Facets => list::run_facets(&ctx).await,
            Commands::Search { query, limit, mode } => {
                search::run_search(&ctx, search::SearchOptions { query, limit, mode }).await
            }
            Commands::History { clear } => search::run_history(&ctx, clear),
            Commands::Move {
                task_id,
                status,
                from,
            } => {
                board::run_move(
                    &ctx,
                    board::MoveOptions {
                        task_id,
                        status,
                        from,
                    },
                )
                .await
            }
            Commands::Filter(cmd) => match cmd {
                FilterCommands::Save {
                    name,
                    filters,
                    default,
                    overwrite,
                } => filter::run_save(
                    &ctx,
                    filter::SaveOptions {
                        name,
                        filters,
                        default,
                        overwrite,
                    },
                ),
                FilterCommands::List => filter::run_list(&ctx),
                FilterCommands::Apply { target } => filter::run_apply(&ctx, &target).await,
                FilterCommands::Delete { target, yes } => filter::run_delete(&ctx, &target, yes),
            },
        }
    }
}
