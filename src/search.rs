//! Debounced, sequence-tagged search.
//!
//! [`SearchOrchestrator`] is a clock-driven state machine. The caller feeds it
//! keystrokes and the current time, asks it for the request to dispatch once
//! the debounce deadline passes, and hands back responses tagged with the
//! request's sequence. Only the response for the most recently dispatched
//! request is ever applied; anything older is dropped.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::prefs::{self, PreferenceStore};
use crate::store::{SearchMode, SearchQuery, SearchResponse};
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub debounce: Duration,
    /// Trimmed queries shorter than this never trigger a request.
    pub min_query_len: usize,
    pub limit: usize,
    pub mode: SearchMode,
    pub history_len: usize,
    pub history_key: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for SearchSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            min_query_len: config.min_query_len,
            limit: config.limit,
            mode: SearchMode::parse(&config.mode).unwrap_or_default(),
            history_len: config.history_len,
            history_key: config.history_key.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub task: Task,
    /// Relevance in [0, 1].
    pub score: f64,
}

/// Request handed to the record store.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub sequence: u64,
    pub query: SearchQuery,
}

/// A dispatched request whose response is still wanted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    pub sequence: u64,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    /// Timer armed for `query`. A request dispatched earlier may still be
    /// awaited; its response is applied if it arrives before the timer fires.
    Debouncing {
        query: String,
        deadline: Instant,
        awaiting: Option<InFlight>,
    },
    Pending(InFlight),
    Settled {
        sequence: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEffect {
    /// Empty query: results cleared, any awaited response abandoned.
    Cleared,
    /// Debounce timer (re)armed.
    Armed { deadline: Instant },
    /// Too short to search; the timer, if any, was cancelled.
    TooShort,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Applied { sequence: u64, results: usize },
    /// The awaited request failed. Results were cleared.
    Failed { sequence: u64, message: String },
    /// Superseded or abandoned request. Not an error.
    Stale { sequence: u64 },
}

/// Recent queries, most recent first, de-duplicated and bounded.
pub struct SearchHistory {
    store: Arc<dyn PreferenceStore>,
    key: String,
    capacity: usize,
    entries: Vec<String>,
}

impl SearchHistory {
    /// Load from the preference store. Corrupt or missing values start empty.
    pub fn load(store: Arc<dyn PreferenceStore>, key: impl Into<String>, capacity: usize) -> Self {
        let key = key.into();
        let mut entries: Vec<String> = match prefs::read_json(store.as_ref(), &key) {
            Ok(value) => value.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "search history unavailable");
                Vec::new()
            }
        };
        entries.truncate(capacity);
        Self {
            store,
            key,
            capacity,
            entries,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn record(&mut self, query: &str) -> Result<()> {
        self.entries.retain(|entry| entry != query);
        self.entries.insert(0, query.to_string());
        self.entries.truncate(self.capacity);
        prefs::write_json(self.store.as_ref(), &self.key, &self.entries)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.store.remove(&self.key)
    }
}

pub struct SearchOrchestrator {
    settings: SearchSettings,
    state: SearchState,
    /// Raw text as last typed.
    query: String,
    /// Sequence of the most recently dispatched request.
    sequence: u64,
    /// Sequence whose response produced the displayed results.
    applied_sequence: Option<u64>,
    results: Vec<SearchResult>,
    suggestions: Vec<String>,
    enhanced_query: String,
    total_results: usize,
    history: SearchHistory,
}

impl SearchOrchestrator {
    pub fn new(settings: SearchSettings, store: Arc<dyn PreferenceStore>) -> Self {
        let history = SearchHistory::load(store, settings.history_key.clone(), settings.history_len);
        Self {
            settings,
            state: SearchState::Idle,
            query: String::new(),
            sequence: 0,
            applied_sequence: None,
            results: Vec::new(),
            suggestions: Vec::new(),
            enhanced_query: String::new(),
            total_results: 0,
            history,
        }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn current_sequence(&self) -> u64 {
        self.sequence
    }

    pub fn applied_sequence(&self) -> Option<u64> {
        self.applied_sequence
    }

    pub fn current_results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn enhanced_query(&self) -> &str {
        &self.enhanced_query
    }

    pub fn total_results(&self) -> usize {
        self.total_results
    }

    pub fn history(&self) -> &[String] {
        self.history.entries()
    }

    /// True while a dispatched request is unanswered, including while the
    /// next query is still debouncing.
    pub fn is_loading(&self) -> bool {
        self.awaiting().is_some()
    }

    /// When the armed debounce timer fires, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            SearchState::Debouncing { deadline, .. } => Some(*deadline),
            _ => None,
        }
    }

    fn awaiting(&self) -> Option<&InFlight> {
        match &self.state {
            SearchState::Debouncing { awaiting, .. } => awaiting.as_ref(),
            SearchState::Pending(in_flight) => Some(in_flight),
            SearchState::Idle | SearchState::Settled { .. } => None,
        }
    }

    /// State to fall back to once no timer is armed.
    fn resting_state(&self) -> SearchState {
        if let Some(in_flight) = self.awaiting() {
            return SearchState::Pending(in_flight.clone());
        }
        match self.applied_sequence {
            Some(sequence) if !self.results.is_empty() => SearchState::Settled { sequence },
            _ => SearchState::Idle,
        }
    }

    pub fn on_query_change(&mut self, text: &str, now: Instant) -> QueryEffect {
        self.query = text.to_string();
        let trimmed = text.trim();

        if trimmed.is_empty() {
            self.clear();
            return QueryEffect::Cleared;
        }

        if trimmed.chars().count() < self.settings.min_query_len {
            self.state = self.resting_state();
            return QueryEffect::TooShort;
        }

        let deadline = now + self.settings.debounce;
        let awaiting = self.awaiting().cloned();
        tracing::debug!(query = trimmed, "search debounce armed");
        self.state = SearchState::Debouncing {
            query: text.to_string(),
            deadline,
            awaiting,
        };
        QueryEffect::Armed { deadline }
    }

    /// Dispatch the debounced query once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<SearchRequest> {
        let query = match &self.state {
            SearchState::Debouncing {
                query, deadline, ..
            } if now >= *deadline => query.clone(),
            _ => return None,
        };
        Some(self.dispatch(query))
    }

    /// Search immediately, bypassing the debounce (Enter key, history or
    /// suggestion pick).
    pub fn submit_now(&mut self, text: &str) -> Option<SearchRequest> {
        self.query = text.to_string();
        if text.trim().is_empty() {
            return None;
        }
        Some(self.dispatch(text.to_string()))
    }

    fn dispatch(&mut self, query: String) -> SearchRequest {
        self.sequence += 1;
        let sequence = self.sequence;
        tracing::debug!(sequence, query = query.as_str(), "search dispatched");
        self.state = SearchState::Pending(InFlight {
            sequence,
            query: query.clone(),
        });
        SearchRequest {
            sequence,
            query: SearchQuery {
                query,
                limit: self.settings.limit,
                mode: self.settings.mode,
            },
        }
    }

    /// Apply a response if it belongs to the awaited request.
    pub fn on_result(&mut self, sequence: u64, result: Result<SearchResponse>) -> SearchOutcome {
        let Some(in_flight) = self.awaiting().filter(|f| f.sequence == sequence).cloned() else {
            tracing::debug!(
                sequence,
                current = self.sequence,
                "dropping stale search response"
            );
            return SearchOutcome::Stale { sequence };
        };

        let next_state = match &self.state {
            SearchState::Debouncing {
                query, deadline, ..
            } => SearchState::Debouncing {
                query: query.clone(),
                deadline: *deadline,
                awaiting: None,
            },
            _ => SearchState::Settled { sequence },
        };

        match result {
            Ok(response) => {
                self.results = rank(response.results.into_iter().map(|hit| SearchResult {
                    task: hit.task,
                    score: hit.similarity_score,
                }));
                self.suggestions = response.suggestions;
                self.enhanced_query = if response.enhanced_query.is_empty() {
                    in_flight.query.clone()
                } else {
                    response.enhanced_query
                };
                self.total_results = response.total_results;
                self.applied_sequence = Some(sequence);
                self.state = next_state;
                if let Err(err) = self.history.record(&in_flight.query) {
                    tracing::warn!(error = %err, "failed to persist search history");
                }
                tracing::debug!(sequence, results = self.results.len(), "search settled");
                SearchOutcome::Applied {
                    sequence,
                    results: self.results.len(),
                }
            }
            Err(err) => {
                tracing::warn!(sequence, error = %err, "search failed");
                self.reset_results();
                self.state = next_state;
                SearchOutcome::Failed {
                    sequence,
                    message: failure_message(&err),
                }
            }
        }
    }

    /// Drop results, disarm the timer and abandon any awaited response.
    pub fn clear(&mut self) {
        self.query.clear();
        self.reset_results();
        self.state = SearchState::Idle;
    }

    fn reset_results(&mut self) {
        self.results.clear();
        self.suggestions.clear();
        self.enhanced_query.clear();
        self.total_results = 0;
        self.applied_sequence = None;
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.history.clear()
    }
}

fn failure_message(err: &Error) -> String {
    match err {
        Error::Authorization(_) => format!("Search failed: {err}. Please sign in again."),
        _ => format!("Search failed: {err}. Please try again."),
    }
}

/// Clamp scores into [0, 1] and order best first. Ties keep response order.
fn rank(results: impl Iterator<Item = SearchResult>) -> Vec<SearchResult> {
    let mut ranked: Vec<SearchResult> = results
        .map(|mut result| {
            result.score = if result.score.is_nan() {
                0.0
            } else {
                result.score.clamp(0.0, 1.0)
            };
            result
        })
        .collect();
    ranked.sort_by(|left, right| right.score.total_cmp(&left.score));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryPreferences;
    use crate::store::ScoredTask;
    use crate::task::TaskStatus;

    fn orchestrator() -> (SearchOrchestrator, Arc<MemoryPreferences>) {
        let prefs = Arc::new(MemoryPreferences::new());
        let search = SearchOrchestrator::new(SearchSettings::default(), prefs.clone());
        (search, prefs)
    }

    fn response(ids: &[(&str, f64)]) -> SearchResponse {
        SearchResponse {
            results: ids
                .iter()
                .map(|(id, score)| ScoredTask {
                    task: Task::new(*id, *id, TaskStatus::Open),
                    similarity_score: *score,
                })
                .collect(),
            total_results: ids.len(),
            ..SearchResponse::default()
        }
    }

    #[test]
    fn short_query_does_not_arm_timer() {
        let (mut search, _) = orchestrator();
        let now = Instant::now();
        assert_eq!(search.on_query_change("ab", now), QueryEffect::TooShort);
        assert_eq!(search.state(), &SearchState::Idle);
        assert!(search.poll(now + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn timer_fires_only_after_deadline() {
        let (mut search, _) = orchestrator();
        let now = Instant::now();
        search.on_query_change("crash", now);
        assert!(search.poll(now + Duration::from_millis(499)).is_none());
        let request = search.poll(now + Duration::from_millis(500)).expect("dispatch");
        assert_eq!(request.sequence, 1);
        assert_eq!(request.query.query, "crash");
        assert_eq!(request.query.limit, 50);
        assert!(search.is_loading());
        assert!(search.poll(now + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn results_are_ranked_and_clamped() {
        let (mut search, _) = orchestrator();
        let request = search.submit_now("crash").expect("request");
        let outcome = search.on_result(
            request.sequence,
            Ok(response(&[("low", 0.2), ("high", 3.0), ("nan", f64::NAN)])),
        );
        assert_eq!(outcome, SearchOutcome::Applied { sequence: 1, results: 3 });
        let ids: Vec<&str> = search
            .current_results()
            .iter()
            .map(|r| r.task.id.as_str())
            .collect();
        assert_eq!(ids, vec!["high", "low", "nan"]);
        assert_eq!(search.current_results()[0].score, 1.0);
        assert_eq!(search.enhanced_query(), "crash");
    }

    #[test]
    fn stale_response_is_dropped() {
        let (mut search, _) = orchestrator();
        let first = search.submit_now("first").expect("first");
        let second = search.submit_now("second").expect("second");

        search.on_result(second.sequence, Ok(response(&[("b", 0.9)])));
        let outcome = search.on_result(first.sequence, Ok(response(&[("a", 0.9)])));
        assert_eq!(outcome, SearchOutcome::Stale { sequence: 1 });
        assert_eq!(search.current_results()[0].task.id, "b");
        assert_eq!(search.applied_sequence(), Some(2));
    }

    #[test]
    fn clearing_abandons_in_flight_request() {
        let (mut search, _) = orchestrator();
        let request = search.submit_now("crash").expect("request");
        assert_eq!(search.on_query_change("  ", Instant::now()), QueryEffect::Cleared);
        let outcome = search.on_result(request.sequence, Ok(response(&[("a", 0.5)])));
        assert_eq!(outcome, SearchOutcome::Stale { sequence: 1 });
        assert!(search.current_results().is_empty());
        assert_eq!(search.state(), &SearchState::Idle);
    }

    #[test]
    fn failure_clears_results_but_keeps_sequence() {
        let (mut search, _) = orchestrator();
        let first = search.submit_now("crash").expect("first");
        search.on_result(first.sequence, Ok(response(&[("a", 0.5)])));

        let second = search.submit_now("crash again").expect("second");
        let outcome = search.on_result(
            second.sequence,
            Err(Error::Transport("connection reset".to_string())),
        );
        assert!(matches!(outcome, SearchOutcome::Failed { sequence: 2, .. }));
        assert!(search.current_results().is_empty());
        assert_eq!(search.current_sequence(), 2);

        let third = search.submit_now("crash").expect("third");
        assert_eq!(third.sequence, 3);
    }

    #[test]
    fn typing_during_pending_keeps_awaiting_latest_dispatch() {
        let (mut search, _) = orchestrator();
        let now = Instant::now();
        let request = search.submit_now("crash").expect("request");
        search.on_query_change("crash on", now);
        assert!(matches!(search.state(), SearchState::Debouncing { awaiting: Some(_), .. }));
        assert!(search.is_loading());

        search.on_result(request.sequence, Ok(response(&[("a", 0.5)])));
        assert_eq!(search.current_results().len(), 1);
        assert!(matches!(search.state(), SearchState::Debouncing { awaiting: None, .. }));
        assert!(!search.is_loading());
        assert!(search.poll(now + Duration::from_millis(500)).is_some());
    }
}
