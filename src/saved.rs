//! Named, per-user filter snapshots.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::FiltersConfig;
use crate::error::{Error, Result};
use crate::filter::FilterCriteria;
use crate::prefs::{self, PreferenceStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedFilter {
    pub id: String,
    pub name: String,
    #[serde(alias = "filters")]
    pub criteria: FilterCriteria,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    pub make_default: bool,
    pub overwrite_existing: bool,
}

pub struct FilterPersistenceStore {
    prefs: Arc<dyn PreferenceStore>,
    key: String,
    name_min_len: usize,
    name_max_len: usize,
    filters: Vec<SavedFilter>,
}

impl FilterPersistenceStore {
    /// Load the saved filters of `user`. A corrupt stored list loads as empty.
    pub fn load(prefs: Arc<dyn PreferenceStore>, user: &str, config: &FiltersConfig) -> Result<Self> {
        let key = format!("{}.{}", config.key_prefix, user);
        let filters: Vec<SavedFilter> = prefs::read_json(prefs.as_ref(), &key)?.unwrap_or_default();
        tracing::debug!(key = key.as_str(), count = filters.len(), "saved filters loaded");
        Ok(Self {
            prefs,
            key,
            name_min_len: config.name_min_len,
            name_max_len: config.name_max_len,
            filters,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn list(&self) -> &[SavedFilter] {
        &self.filters
    }

    pub fn get(&self, id: &str) -> Option<&SavedFilter> {
        self.filters.iter().find(|filter| filter.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&SavedFilter> {
        let name = name.trim();
        self.filters.iter().find(|filter| filter.name == name)
    }

    pub fn default_filter(&self) -> Option<&SavedFilter> {
        self.filters.iter().find(|filter| filter.is_default)
    }

    /// Check a candidate name without saving.
    pub fn validate_name(&self, name: &str, overwrite_existing: bool) -> Result<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidFilterName("Filter name is required".to_string()));
        }
        let len = trimmed.chars().count();
        if len < self.name_min_len {
            return Err(Error::InvalidFilterName(format!(
                "Filter name must be at least {} characters",
                self.name_min_len
            )));
        }
        if len > self.name_max_len {
            return Err(Error::InvalidFilterName(format!(
                "Filter name must be at most {} characters",
                self.name_max_len
            )));
        }
        if !overwrite_existing && self.find_by_name(trimmed).is_some() {
            return Err(Error::FilterNameExists(trimmed.to_string()));
        }
        Ok(())
    }

    pub fn save(
        &mut self,
        name: &str,
        criteria: &FilterCriteria,
        options: SaveOptions,
    ) -> Result<SavedFilter> {
        self.validate_name(name, options.overwrite_existing)?;
        let name = name.trim().to_string();

        let mut next = self.filters.clone();
        if options.make_default {
            for filter in &mut next {
                filter.is_default = false;
            }
        }

        let saved = match next.iter_mut().find(|filter| filter.name == name) {
            Some(existing) => {
                existing.criteria = criteria.clone();
                existing.is_default = existing.is_default || options.make_default;
                existing.clone()
            }
            None => {
                let created = SavedFilter {
                    id: ulid::Ulid::new().to_string(),
                    name,
                    criteria: criteria.clone(),
                    is_default: options.make_default,
                };
                next.push(created.clone());
                created
            }
        };

        self.commit(next)?;
        tracing::info!(id = saved.id.as_str(), name = saved.name.as_str(), default = saved.is_default, "filter saved");
        Ok(saved)
    }

    /// Remove a saved filter. Confirmation happens before this is called.
    pub fn delete(&mut self, id: &str) -> Result<SavedFilter> {
        let index = self
            .filters
            .iter()
            .position(|filter| filter.id == id)
            .ok_or_else(|| Error::SavedFilterNotFound(id.to_string()))?;
        let mut next = self.filters.clone();
        let removed = next.remove(index);
        self.commit(next)?;
        tracing::info!(id, name = removed.name.as_str(), "filter deleted");
        Ok(removed)
    }

    pub fn apply(&self, id: &str) -> Result<FilterCriteria> {
        self.get(id)
            .map(|filter| filter.criteria.clone())
            .ok_or_else(|| Error::SavedFilterNotFound(id.to_string()))
    }

    /// Resolve an id or, failing that, an exact name.
    pub fn resolve(&self, id_or_name: &str) -> Result<&SavedFilter> {
        self.get(id_or_name)
            .or_else(|| self.find_by_name(id_or_name))
            .ok_or_else(|| Error::SavedFilterNotFound(id_or_name.to_string()))
    }

    // Persist first so a storage failure leaves the in-memory list untouched.
    fn commit(&mut self, next: Vec<SavedFilter>) -> Result<()> {
        prefs::write_json(self.prefs.as_ref(), &self.key, &next)?;
        self.filters = next;
        Ok(())
    }
}
