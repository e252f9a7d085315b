//! Configuration loading and management
//!
//! Handles parsing of `.taskview.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::store::SearchMode;

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE: &str = ".taskview.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Search behaviour
    #[serde(default)]
    pub search: SearchConfig,

    /// Saved filter rules
    #[serde(default)]
    pub filters: FiltersConfig,

    /// Record store location
    #[serde(default)]
    pub store: StoreConfig,

    /// Preference storage
    #[serde(default)]
    pub preferences: PreferencesConfig,

    /// Current user
    #[serde(default)]
    pub user: UserConfig,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Quiet period after the last keystroke before a request is sent
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Minimum trimmed query length that triggers a search
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,

    /// Maximum results requested
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Search mode: intelligent, semantic, keyword, hybrid
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Number of recent queries kept
    #[serde(default = "default_history_len")]
    pub history_len: usize,

    /// Preference key holding the history
    #[serde(default = "default_history_key")]
    pub history_key: String,
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_min_query_len() -> usize {
    3
}

fn default_limit() -> usize {
    50
}

fn default_mode() -> String {
    "intelligent".to_string()
}

fn default_history_len() -> usize {
    5
}

fn default_history_key() -> String {
    "taskSearchHistory".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            min_query_len: default_min_query_len(),
            limit: default_limit(),
            mode: default_mode(),
            history_len: default_history_len(),
            history_key: default_history_key(),
        }
    }
}

/// Saved filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    #[serde(default = "default_name_min_len")]
    pub name_min_len: usize,

    #[serde(default = "default_name_max_len")]
    pub name_max_len: usize,

    /// Preference key prefix; the user id is appended
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Window used by the "recent" quick filter
    #[serde(default = "default_recent_days")]
    pub recent_days: i64,
}

fn default_name_min_len() -> usize {
    2
}

fn default_name_max_len() -> usize {
    50
}

fn default_key_prefix() -> String {
    "savedFilters".to_string()
}

fn default_recent_days() -> i64 {
    7
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            name_min_len: default_name_min_len(),
            name_max_len: default_name_max_len(),
            key_prefix: default_key_prefix(),
            recent_days: default_recent_days(),
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Remote API base URL; when unset the local task file is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Local task file (JSON array)
    #[serde(default = "default_tasks_file")]
    pub tasks_file: PathBuf,
}

fn default_token_env() -> String {
    "TASKVIEW_TOKEN".to_string()
}

fn default_tasks_file() -> PathBuf {
    PathBuf::from("tasks.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token_env: default_token_env(),
            tasks_file: default_tasks_file(),
        }
    }
}

/// Preference storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferencesConfig {
    /// Preference file; defaults to the platform data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Current user configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// User id used by "my-tasks" and as the saved-filter scope
    #[serde(default = "default_user")]
    pub id: String,
}

fn default_user() -> String {
    "local".to_string()
}

impl Default for UserConfig {
    fn default() -> Self {
        Self { id: default_user() }
    }
}

impl Config {
    /// Load configuration from a `.taskview.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a directory, or return defaults
    pub fn load_from_dir(dir: &Path) -> Self {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.filters.validate()?;
        if self.user.id.trim().is_empty() {
            return Err(Error::InvalidConfig("user.id cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl SearchConfig {
    fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 {
            return Err(Error::InvalidConfig(
                "search.debounce_ms must be > 0".to_string(),
            ));
        }
        if self.min_query_len == 0 {
            return Err(Error::InvalidConfig(
                "search.min_query_len must be > 0".to_string(),
            ));
        }
        if self.limit == 0 {
            return Err(Error::InvalidConfig("search.limit must be > 0".to_string()));
        }
        if self.history_len == 0 {
            return Err(Error::InvalidConfig(
                "search.history_len must be >= 1".to_string(),
            ));
        }
        if self.history_key.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "search.history_key cannot be empty".to_string(),
            ));
        }
        if SearchMode::parse(&self.mode).is_none() {
            return Err(Error::InvalidConfig(format!(
                "search.mode: invalid mode '{}' (expected intelligent|semantic|keyword|hybrid)",
                self.mode
            )));
        }
        Ok(())
    }
}

impl FiltersConfig {
    fn validate(&self) -> Result<()> {
        if self.name_min_len == 0 {
            return Err(Error::InvalidConfig(
                "filters.name_min_len must be >= 1".to_string(),
            ));
        }
        if self.name_max_len < self.name_min_len {
            return Err(Error::InvalidConfig(format!(
                "filters.name_max_len ({}) must be >= filters.name_min_len ({})",
                self.name_max_len, self.name_min_len
            )));
        }
        if self.key_prefix.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "filters.key_prefix cannot be empty".to_string(),
            ));
        }
        if self.recent_days <= 0 {
            return Err(Error::InvalidConfig(
                "filters.recent_days must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.search.debounce_ms, 500);
        assert_eq!(cfg.search.min_query_len, 3);
        assert_eq!(cfg.search.limit, 50);
        assert_eq!(cfg.search.mode, "intelligent");
        assert_eq!(cfg.search.history_len, 5);
        assert_eq!(cfg.search.history_key, "taskSearchHistory");
        assert_eq!(cfg.filters.name_min_len, 2);
        assert_eq!(cfg.filters.name_max_len, 50);
        assert_eq!(cfg.filters.key_prefix, "savedFilters");
        assert_eq!(cfg.filters.recent_days, 7);
        assert!(cfg.store.base_url.is_none());
        assert_eq!(cfg.store.token_env, "TASKVIEW_TOKEN");
        assert_eq!(cfg.store.tasks_file, PathBuf::from("tasks.json"));
        assert!(cfg.preferences.path.is_none());
        assert_eq!(cfg.user.id, "local");
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[search]
debounce_ms = 250
limit = 20
mode = "keyword"
history_len = 3

[filters]
name_max_len = 30
recent_days = 14

[store]
base_url = "http://localhost:8000/api"
tasks_file = "data/tasks.json"

[preferences]
path = "prefs.json"

[user]
id = "alice"
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.search.debounce_ms, 250);
        assert_eq!(cfg.search.limit, 20);
        assert_eq!(cfg.search.mode, "keyword");
        assert_eq!(cfg.search.history_len, 3);
        assert_eq!(cfg.search.min_query_len, 3);
        assert_eq!(cfg.filters.name_max_len, 30);
        assert_eq!(cfg.filters.recent_days, 14);
        assert_eq!(cfg.store.base_url.as_deref(), Some("http://localhost:8000/api"));
        assert_eq!(cfg.store.tasks_file, PathBuf::from("data/tasks.json"));
        assert_eq!(cfg.preferences.path, Some(PathBuf::from("prefs.json")));
        assert_eq!(cfg.user.id, "alice");
    }

    #[test]
    fn invalid_search_mode_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[search]\nmode = \"psychic\"").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn inverted_name_bounds_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[filters]\nname_min_len = 10\nname_max_len = 5").expect("write");

        assert!(matches!(Config::load(&path), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn load_from_dir_defaults_when_missing_or_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(Config::load_from_dir(dir.path()).search.debounce_ms, 500);

        fs::write(dir.path().join(CONFIG_FILE), "[search]\ndebounce_ms = 0").expect("write");
        assert_eq!(Config::load_from_dir(dir.path()).search.debounce_ms, 500);
    }
}
