//! Filter criteria and the predicate engine.
//!
//! Every dimension of [`FilterCriteria`] is optional. An empty dimension places
//! no constraint; non-empty dimensions are AND-ed together. Evaluation is pure
//! and keeps the collection's order.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::{Severity, Task, TaskCollection, TaskStatus};

/// Assignee value that selects tasks without an assignee.
pub const UNASSIGNED: &str = "unassigned";

/// Inclusive timestamp bounds. A missing end is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }

    /// Range accepted by both sides.
    pub fn intersect(&self, other: &DateRange) -> DateRange {
        let from = match (self.from, other.from) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let to = match (self.to, other.to) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        DateRange { from, to }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub search_term: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub status: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub severity: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, alias = "assignedTo", skip_serializing_if = "BTreeSet::is_empty")]
    pub assignee: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "DateRange::is_unbounded")]
    pub created_range: DateRange,
    #[serde(default, skip_serializing_if = "DateRange::is_unbounded")]
    pub updated_range: DateRange,
    #[serde(default, alias = "quickFilter", skip_serializing_if = "Option::is_none")]
    pub active_preset: Option<String>,
}

impl FilterCriteria {
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search_term = term.into();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status.insert(status.label().to_string());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity.insert(severity.label().to_string());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee.insert(assignee.into());
        self
    }

    pub fn created_between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_range = DateRange::new(from, to);
        self
    }

    pub fn updated_between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.updated_range = DateRange::new(from, to);
        self
    }

    fn search_key(&self) -> Option<String> {
        let trimmed = self.search_term.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
    }

    /// True when no dimension constrains anything. The preset is advisory and
    /// does not count here.
    pub fn is_empty(&self) -> bool {
        self.search_key().is_none()
            && self.status.is_empty()
            && self.severity.is_empty()
            && self.tags.is_empty()
            && self.assignee.is_empty()
            && self.created_range.is_unbounded()
            && self.updated_range.is_unbounded()
    }

    /// Number of active dimensions, preset included.
    pub fn active_count(&self) -> usize {
        [
            self.search_key().is_some(),
            !self.status.is_empty(),
            !self.severity.is_empty(),
            !self.tags.is_empty(),
            !self.assignee.is_empty(),
            !self.created_range.is_unbounded(),
            !self.updated_range.is_unbounded(),
            self.active_preset.is_some(),
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }

    pub fn summary(&self) -> Vec<String> {
        let mut summary = Vec::new();
        if let Some(term) = self.search_key().map(|_| self.search_term.trim()) {
            summary.push(format!("Search: \"{term}\""));
        }
        push_set(&mut summary, "Status", &self.status);
        push_set(&mut summary, "Priority", &self.severity);
        push_set(&mut summary, "Tags", &self.tags);
        push_set(&mut summary, "Assignee", &self.assignee);
        summary
    }

    /// AND of two criteria over independent dimensions.
    ///
    /// Date ranges intersect. Two different constraints on the same text or
    /// set dimension cannot be expressed as one criteria value and are
    /// rejected.
    pub fn conjoin(&self, other: &FilterCriteria) -> Result<FilterCriteria> {
        let search_term = match (self.search_key(), other.search_key()) {
            (Some(a), Some(b)) if a != b => {
                return Err(Error::ConflictingCriteria("searchTerm".to_string()))
            }
            (Some(_), _) => self.search_term.clone(),
            (None, _) => other.search_term.clone(),
        };
        Ok(FilterCriteria {
            search_term,
            status: conjoin_set("status", &self.status, &other.status)?,
            severity: conjoin_set("severity", &self.severity, &other.severity)?,
            tags: conjoin_set("tags", &self.tags, &other.tags)?,
            assignee: conjoin_set("assignee", &self.assignee, &other.assignee)?,
            created_range: self.created_range.intersect(&other.created_range),
            updated_range: self.updated_range.intersect(&other.updated_range),
            active_preset: self
                .active_preset
                .clone()
                .or_else(|| other.active_preset.clone()),
        })
    }

    /// Compile into a predicate. Parsing and lowercasing happen once here.
    pub fn predicate(&self) -> Predicate {
        Predicate {
            text: self.search_key(),
            status: enum_dimension(&self.status, TaskStatus::parse),
            severity: enum_dimension(&self.severity, Severity::parse),
            tags: (!self.tags.is_empty()).then(|| self.tags.clone()),
            assignee: (!self.assignee.is_empty()).then(|| AssigneeRule {
                allow_unassigned: self.assignee.contains(UNASSIGNED),
                names: self.assignee.clone(),
            }),
            created: self.created_range,
            updated: self.updated_range,
        }
    }
}

fn push_set(summary: &mut Vec<String>, label: &str, values: &BTreeSet<String>) {
    if values.is_empty() {
        return;
    }
    let joined = values.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
    summary.push(format!("{label}: {joined}"));
}

fn conjoin_set(
    dimension: &str,
    left: &BTreeSet<String>,
    right: &BTreeSet<String>,
) -> Result<BTreeSet<String>> {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => Ok(right.clone()),
        (_, true) => Ok(left.clone()),
        _ if left == right => Ok(left.clone()),
        _ => Err(Error::ConflictingCriteria(dimension.to_string())),
    }
}

/// `None` = unconstrained. `Some(empty)` = only unknown labels were given, so
/// nothing matches.
fn enum_dimension<T: Ord>(
    raw: &BTreeSet<String>,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<BTreeSet<T>> {
    if raw.is_empty() {
        return None;
    }
    Some(raw.iter().filter_map(|value| parse(value)).collect())
}

#[derive(Debug, Clone)]
struct AssigneeRule {
    allow_unassigned: bool,
    names: BTreeSet<String>,
}

/// Compiled form of [`FilterCriteria`].
#[derive(Debug, Clone)]
pub struct Predicate {
    text: Option<String>,
    status: Option<BTreeSet<TaskStatus>>,
    severity: Option<BTreeSet<Severity>>,
    tags: Option<BTreeSet<String>>,
    assignee: Option<AssigneeRule>,
    created: DateRange,
    updated: DateRange,
}

impl Predicate {
    pub fn test(&self, task: &Task) -> bool {
        if let Some(text) = self.text.as_deref() {
            let in_title = task.title.to_lowercase().contains(text);
            if !in_title && !strip_markup(&task.description).to_lowercase().contains(text) {
                return false;
            }
        }
        if let Some(allowed) = &self.status {
            if !allowed.contains(&task.status) {
                return false;
            }
        }
        if let Some(allowed) = &self.severity {
            if !allowed.contains(&task.severity) {
                return false;
            }
        }
        if let Some(wanted) = &self.tags {
            if !task.tags.iter().any(|tag| wanted.contains(tag)) {
                return false;
            }
        }
        if let Some(rule) = &self.assignee {
            let matched = match task.assignee() {
                None => rule.allow_unassigned,
                Some(name) => rule.names.contains(name),
            };
            if !matched {
                return false;
            }
        }
        self.created.contains(task.created_at) && self.updated.contains(task.updated_at)
    }
}

pub fn matches(task: &Task, criteria: &FilterCriteria) -> bool {
    criteria.predicate().test(task)
}

/// Stable filter: matching tasks in collection order.
pub fn apply<'a>(collection: &'a TaskCollection, criteria: &FilterCriteria) -> Vec<&'a Task> {
    apply_slice(collection.tasks(), criteria)
}

pub fn apply_slice<'a>(tasks: &'a [Task], criteria: &FilterCriteria) -> Vec<&'a Task> {
    if criteria.is_empty() {
        return tasks.iter().collect();
    }
    let predicate = criteria.predicate();
    tasks.iter().filter(|task| predicate.test(task)).collect()
}

/// Positions of matching tasks, for views that keep their own selection.
pub fn apply_indices(tasks: &[Task], criteria: &FilterCriteria) -> Vec<usize> {
    let predicate = criteria.predicate();
    tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| predicate.test(task))
        .map(|(idx, _)| idx)
        .collect()
}

/// Plain text of a description: tags removed, common entities decoded.
pub fn strip_markup(value: &str) -> String {
    if !value.contains('<') && !value.contains('&') {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut in_tag = false;
    for ch in value.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Named quick filters offered next to the criteria editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickFilter {
    MyTasks,
    HighPriority,
    Overdue,
    Recent,
    Unassigned,
}

/// Inputs a preset may need besides the criteria itself.
#[derive(Debug, Clone)]
pub struct PresetContext {
    pub now: DateTime<Utc>,
    pub current_user: Option<String>,
    pub recent_days: i64,
}

impl QuickFilter {
    pub const ALL: [QuickFilter; 5] = [
        QuickFilter::MyTasks,
        QuickFilter::HighPriority,
        QuickFilter::Overdue,
        QuickFilter::Recent,
        QuickFilter::Unassigned,
    ];

    pub fn id(self) -> &'static str {
        match self {
            QuickFilter::MyTasks => "my-tasks",
            QuickFilter::HighPriority => "high-priority",
            QuickFilter::Overdue => "overdue",
            QuickFilter::Recent => "recent",
            QuickFilter::Unassigned => "unassigned",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        QuickFilter::ALL
            .into_iter()
            .find(|preset| preset.id() == raw.trim())
    }

    /// Rewrite concrete dimensions for this preset and record it as active.
    /// `Overdue` has no due date to work with and only sets the marker.
    pub fn apply_to(self, criteria: &FilterCriteria, ctx: &PresetContext) -> FilterCriteria {
        let mut next = criteria.clone();
        match self {
            QuickFilter::MyTasks => {
                if let Some(user) = ctx.current_user.as_deref() {
                    next.assignee = BTreeSet::from([user.to_string()]);
                }
            }
            QuickFilter::HighPriority => {
                next.severity = [Severity::High, Severity::Critical]
                    .iter()
                    .map(|s| s.label().to_string())
                    .collect();
            }
            QuickFilter::Overdue => {}
            QuickFilter::Recent => {
                next.created_range.from = Some(ctx.now - Duration::days(ctx.recent_days));
            }
            QuickFilter::Unassigned => {
                next.assignee = BTreeSet::from([UNASSIGNED.to_string()]);
            }
        }
        next.active_preset = Some(self.id().to_string());
        next
    }
}
